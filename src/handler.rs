//! The cookie session handler.
//!
//! [`CookieSessionHandler`] implements the open/read/write/destroy session-handler contract on top
//! of a single response cookie, plus two lifecycle hooks a dispatcher calls around each main
//! request. State for one cycle moves `Untouched -> Opened -> Written | Destroyed`, and
//! [`CookieSessionHandler::on_response_ready`] flushes it into the response exactly once before
//! resetting it.
//!
//! A handler has single-request affinity. Sharing one across concurrently running requests is
//! not supported; either build one per request (as [`crate::CookieSessionManagerLayer`] does) or
//! drive one handler through strictly sequential cycles.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::{
    config::CookieSessionConfig,
    controller::{self, CookieWriter},
    error::{Error, Result},
    format::{self, Payload},
};

/// Capabilities the handler needs from the current request.
pub trait SessionRequest {
    /// Ask the request's session object to persist itself.
    ///
    /// Called while the handler is borrowed, so implementations must not call back into it.
    fn save_session(&self);

    /// Raw value of the request cookie called `name`.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Whether a request is the primary one of its cycle or a forwarded/included sub-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Main,
    Sub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CookieState {
    Untouched,
    Opened,
    Written(Payload),
    Destroyed,
}

/// Session handler that keeps all session data in one cookie on request `R`.
#[derive(Debug)]
pub struct CookieSessionHandler<R> {
    config: CookieSessionConfig,
    request: Option<Arc<R>>,
    loaded: Option<Payload>,
    state: CookieState,
}

impl<R: SessionRequest> CookieSessionHandler<R> {
    /// A handler with no current request. Call `on_request_received` before `open`.
    pub fn new(config: CookieSessionConfig) -> Self {
        Self {
            config,
            request: None,
            loaded: None,
            state: CookieState::Untouched,
        }
    }

    /// Cookie settings used for reading and writing.
    pub fn config(&self) -> &CookieSessionConfig {
        &self.config
    }

    /// Whether `open`, `write` or `destroy` touched the cookie since the last flush.
    pub fn is_opened(&self) -> bool {
        self.state != CookieState::Untouched
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == CookieState::Destroyed
    }

    /// Data queued by the last `write`, if it has not been flushed or destroyed since.
    pub fn pending_data(&self) -> Option<&str> {
        match &self.state {
            CookieState::Written(payload) => Some(&payload.data),
            _ => None,
        }
    }

    fn current_request(&self) -> Result<&Arc<R>> {
        self.request.as_ref().ok_or(Error::NoActiveRequest)
    }

    fn load_request_cookie(&self, request: &R) -> Option<Payload> {
        let value = request.cookie(&self.config.name)?;
        match format::decode_payload(&value) {
            Ok(payload) => Some(payload),
            Err(err) => {
                tracing::debug!(err = %err, cookie = %self.config.name, "ignoring session cookie");
                None
            }
        }
    }

    /// Load the request cookie and mark the cookie as in use for this cycle.
    ///
    /// The request's session is saved on the first `open` of a cycle only.
    pub fn open(&mut self, save_path: &str, session_name: &str) -> Result<bool> {
        let request = Arc::clone(self.current_request()?);
        tracing::trace!(save_path, session_name, "opening cookie session");

        if self.state == CookieState::Untouched {
            request.save_session();
            self.state = CookieState::Opened;
        }
        self.loaded = self.load_request_cookie(&request);

        Ok(true)
    }

    /// Returns the session data for this cycle, or an empty string if there is none.
    pub fn read(&self, _session_id: &str) -> Result<String> {
        let request = self.current_request()?;

        match &self.state {
            CookieState::Written(payload) => return Ok(payload.data.clone()),
            CookieState::Destroyed => return Ok(String::new()),
            CookieState::Untouched | CookieState::Opened => {}
        }

        let payload = match &self.loaded {
            Some(payload) => Some(payload.clone()),
            None => self.load_request_cookie(request),
        };

        let now = OffsetDateTime::now_utc().unix_timestamp();
        Ok(payload
            .filter(|payload| !payload.is_expired_at(now))
            .map(|payload| payload.data)
            .unwrap_or_default())
    }

    /// Queue `data` for the next flush. A later `write` or `destroy` in the same cycle replaces it.
    ///
    /// `max_cookie_bytes` applies to the value as sent, after percent-encoding.
    pub fn write(&mut self, _session_id: &str, data: &str) -> Result<bool> {
        let payload = Payload::new(self.config.expire_at(OffsetDateTime::now_utc()), data);

        let encoded_len = controller::escape_value(&format::encode_payload(&payload)).len();
        if encoded_len > self.config.max_cookie_bytes {
            tracing::warn!(
                encoded_len,
                max = self.config.max_cookie_bytes,
                "refusing oversized session cookie"
            );
            return Err(Error::Encode(format!(
                "Cookie value exceeds max_cookie_bytes ({encoded_len} > {})",
                self.config.max_cookie_bytes
            )));
        }

        self.state = CookieState::Written(payload);
        Ok(true)
    }

    /// Expire the session cookie on the next flush and save the request's session.
    pub fn destroy(&mut self, _session_id: &str) -> bool {
        self.state = CookieState::Destroyed;
        if let Some(request) = &self.request {
            request.save_session();
        }
        true
    }

    /// Nothing to release; always `true`.
    pub fn close(&mut self) -> bool {
        true
    }

    /// Cookies expire on the client, there is nothing to collect.
    pub fn gc(&mut self, _max_lifetime: i64) -> bool {
        true
    }

    /// Start a new cycle for `request`. Sub-requests are ignored.
    pub fn on_request_received(&mut self, kind: RequestType, request: Arc<R>) {
        if kind != RequestType::Main {
            return;
        }

        self.request = Some(request);
        self.loaded = None;
        self.state = CookieState::Untouched;
    }

    /// Flush this cycle's state into `response` and reset it.
    ///
    /// Nothing happens for sub-requests, for requests other than the current one, or when the
    /// cookie was never touched.
    pub fn on_response_ready<W>(&mut self, kind: RequestType, request: &Arc<R>, response: &mut W)
    where
        W: CookieWriter + ?Sized,
    {
        if kind != RequestType::Main {
            return;
        }

        match &self.request {
            Some(current) if Arc::ptr_eq(current, request) => {}
            _ => {
                tracing::debug!("response does not belong to the current session request");
                return;
            }
        }

        match std::mem::replace(&mut self.state, CookieState::Untouched) {
            CookieState::Untouched => {}
            CookieState::Opened => {
                tracing::trace!("session opened but not written, leaving cookie untouched");
            }
            CookieState::Destroyed => {
                tracing::trace!(cookie = %self.config.name, "clearing session cookie");
                response.clear_cookie(self.config.removal_cookie());
            }
            CookieState::Written(payload) => {
                tracing::trace!(cookie = %self.config.name, "writing session cookie");
                let value = format::encode_payload(&payload);
                response.set_cookie(self.config.build_cookie(value, payload.expire));
            }
        }
    }
}
