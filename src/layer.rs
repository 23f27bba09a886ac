use std::{
    borrow::Cow,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use http::{Request, Response};
use tower_cookies::CookieManager;
use tower_layer::Layer;
use tower_service::Service;
use tower_sessions_core::{Session, session::Expiry};

use crate::{
    config::CookieSessionConfig,
    controller::{CookieController, PlaintextCookie, ResponseCookies},
    handler::{CookieSessionHandler, RequestType, SessionRequest},
    store::{self, HandlerStore},
};

/// Request extension marking a forwarded or included sub-request. Such requests pass through
/// without touching the session cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubRequest;

/// What the handler sees of an incoming request: its session cookie and a save trigger that the
/// layer honours once the inner service returns.
#[derive(Debug)]
struct RequestContext {
    cookie_name: Cow<'static, str>,
    cookie: Option<String>,
    save_requested: AtomicBool,
}

impl RequestContext {
    fn new(cookie_name: Cow<'static, str>, cookie: Option<String>) -> Self {
        Self {
            cookie_name,
            cookie,
            save_requested: AtomicBool::new(false),
        }
    }

    fn save_requested(&self) -> bool {
        self.save_requested.load(Ordering::Acquire)
    }
}

impl SessionRequest for RequestContext {
    fn save_session(&self) {
        self.save_requested.store(true, Ordering::Release);
    }

    fn cookie(&self, name: &str) -> Option<String> {
        if name == self.cookie_name {
            self.cookie.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CookieSessionManagerLayer<C: CookieController = PlaintextCookie> {
    config: CookieSessionConfig,
    controller: C,
}

impl CookieSessionManagerLayer<PlaintextCookie> {
    /// Layer emitting the session cookie in plaintext, readable by existing clients.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CookieSessionConfig::default(),
            controller: PlaintextCookie,
        }
    }
}

#[cfg(feature = "signed")]
impl CookieSessionManagerLayer<crate::SignedCookie> {
    /// Layer signing the session cookie. Signed values are not readable as plain legacy cookies.
    #[must_use]
    pub fn signed(key: crate::Key) -> Self {
        Self {
            config: CookieSessionConfig::default(),
            controller: crate::SignedCookie::new(key),
        }
    }
}

#[cfg(feature = "private")]
impl CookieSessionManagerLayer<crate::PrivateCookie> {
    #[must_use]
    pub fn private(key: crate::Key) -> Self {
        Self {
            config: CookieSessionConfig::default(),
            controller: crate::PrivateCookie::new(key),
        }
    }
}

impl<C: CookieController> CookieSessionManagerLayer<C> {
    #[must_use]
    pub fn with_config(mut self, config: CookieSessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_controller<C2: CookieController>(
        self,
        controller: C2,
    ) -> CookieSessionManagerLayer<C2> {
        CookieSessionManagerLayer {
            config: self.config,
            controller,
        }
    }
}

impl Default for CookieSessionManagerLayer<PlaintextCookie> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CookieSessionManager<S, C: CookieController> {
    inner: S,
    config: CookieSessionConfig,
    controller: C,
}

impl<S, C: CookieController> Layer<S> for CookieSessionManagerLayer<C> {
    type Service = CookieManager<CookieSessionManager<S, C>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(CookieSessionManager {
            inner,
            config: self.config.clone(),
            controller: self.controller.clone(),
        })
    }
}

fn internal_error<B: Default>() -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    res
}

/// Expire a session that ended up empty. Returns `false` if the handler lock is poisoned.
fn destroy_session(handler: &Mutex<CookieSessionHandler<RequestContext>>) -> bool {
    let Ok(mut handler) = handler.lock() else {
        tracing::error!("cookie session handler lock is poisoned");
        return false;
    };
    if !handler.is_destroyed() {
        handler.destroy("");
    }
    true
}

fn flush_session<C: CookieController>(
    handler: &Mutex<CookieSessionHandler<RequestContext>>,
    context: &Arc<RequestContext>,
    writer: &mut ResponseCookies<'_, C>,
) -> bool {
    let Ok(mut handler) = handler.lock() else {
        tracing::error!("cookie session handler lock is poisoned");
        return false;
    };
    handler.on_response_ready(RequestType::Main, context, writer);
    true
}

impl<ReqBody, ResBody, S, C> Service<Request<ReqBody>> for CookieSessionManager<S, C>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    C: CookieController,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let controller = self.controller.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if req.extensions().get::<SubRequest>().is_some() {
                return inner.call(req).await;
            }

            let cookies = match req.extensions().get::<tower_cookies::Cookies>().cloned() {
                Some(cookies) => cookies,
                None => {
                    tracing::error!("cookie session layer is missing the cookie manager");
                    return Ok(internal_error());
                }
            };

            let incoming = controller
                .get(&cookies, &config.name)
                .map(|cookie| cookie.value().to_string());
            let had_cookie = incoming.is_some();
            let session_id = incoming
                .as_deref()
                .and_then(store::record_from_cookie)
                .map(|record| record.id);

            let context = Arc::new(RequestContext::new(config.name.clone(), incoming));
            let expiry = config.lifetime.map(Expiry::OnInactivity);

            let mut handler = CookieSessionHandler::new(config);
            handler.on_request_received(RequestType::Main, Arc::clone(&context));
            let handler = Arc::new(Mutex::new(handler));

            let session_store = Arc::new(HandlerStore::new(Arc::clone(&handler)));
            let session = Session::new(session_id, session_store, expiry);
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            if !res.status().is_server_error() {
                let modified = session.is_modified();

                if session.is_empty().await {
                    if had_cookie && !destroy_session(&handler) {
                        return Ok(internal_error());
                    }
                } else if (modified || context.save_requested())
                    && let Err(err) = session.save().await
                {
                    tracing::error!(err = %err, "cookie session save failed");
                    return Ok(internal_error());
                }
            }

            let mut writer = ResponseCookies::new(&cookies, &controller);
            if !flush_session(&handler, &context, &mut writer) {
                return Ok(internal_error());
            }

            Ok(res)
        })
    }
}
