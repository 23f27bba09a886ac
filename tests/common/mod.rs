#![allow(dead_code)]

// Shared helpers for integration tests.
//
// `Set-Cookie` headers are parsed with `tower_cookies::Cookie` so assertions see the same decoded
// value a browser would send back.
use std::{
    convert::Infallible,
    sync::atomic::{AtomicUsize, Ordering},
};

use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use tower_cookie_session_handler::{CookieWriter, Session, SessionRequest};
use tower_cookies::Cookie;

pub const LEGACY_MYDATA: &str = r#"a:2:{s:6:"expire";i:0;s:4:"data";s:6:"mydata";}"#;

pub async fn body_string(body: Body) -> String {
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Write a single key into the session.
    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .expect("request includes Session extension");

    session
        .insert("foo", 42)
        .await
        .expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::new(Body::empty()))
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

/// The `name=value` pair of the first `Set-Cookie` header, exactly as a browser stores it.
pub fn raw_cookie_pair(headers: &HeaderMap) -> String {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header")
        .to_str()
        .expect("set-cookie header is valid utf-8");
    set_cookie
        .split(';')
        .next()
        .expect("split yields at least one item")
        .to_string()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    cookie.encoded().to_string()
}

/// Request double: counts session saves and serves a fixed cookie jar.
#[derive(Debug, Default)]
pub struct MockRequest {
    cookies: Vec<(String, String)>,
    saves: AtomicUsize,
}

impl MockRequest {
    pub fn with_cookie(name: &str, value: &str) -> Self {
        Self {
            cookies: vec![(name.to_string(), value.to_string())],
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SessionRequest for MockRequest {
    fn save_session(&self) {
        self.saves.fetch_add(1, Ordering::SeqCst);
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieCall {
    Set { name: String, value: String },
    Clear { name: String },
}

/// Response double recording every cookie mutation in order.
#[derive(Debug, Default)]
pub struct MockResponse {
    pub calls: Vec<CookieCall>,
}

impl CookieWriter for MockResponse {
    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.calls.push(CookieCall::Set {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
        });
    }

    fn clear_cookie(&mut self, cookie: Cookie<'static>) {
        self.calls.push(CookieCall::Clear {
            name: cookie.name().to_string(),
        });
    }
}

pub fn user_routes() -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route(
            "/set-user",
            get(|session: Session| async move {
                session
                    .insert("user", "alice")
                    .await
                    .expect("session insert succeeds");
            }),
        )
        .route(
            "/get-user",
            get(|session: Session| async move {
                session
                    .get::<String>("user")
                    .await
                    .expect("session get succeeds")
                    .unwrap_or_else(|| "none".to_string())
            }),
        )
}

pub fn tamper_cookie_value(cookie: &mut Cookie<'static>) {
    // Flip the final character so any signature or ciphertext check fails.
    let mut value = cookie.value().to_string();
    let last = value.pop().unwrap_or('A');
    value.push(if last == 'A' { 'B' } else { 'A' });
    cookie.set_value(value);
}
