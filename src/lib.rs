//! Cookie-backed session handler.
//!
//! Session data lives in a single response cookie instead of server-side storage. The core is
//! [`CookieSessionHandler`], which implements the open/read/write/destroy session-handler contract
//! and flushes the session into the outgoing response once per request/response cycle. The cookie
//! value uses a legacy length-prefixed encoding (see [`format`]) so cookies already held by clients
//! keep working.
//!
//! [`CookieSessionManagerLayer`] drives the handler from a `tower` stack and exposes the session to
//! handlers as a `tower_sessions_core::Session`.
//!
//! # Security
//! The default transport is plaintext: the cookie can be read and edited by the client. Enable the
//! `signed` or `private` feature to sign or encrypt it, at the cost of compatibility with plain
//! legacy cookies.

mod config;
mod controller;
mod error;
pub mod format;
pub mod handler;
pub mod layer;
mod store;

pub use tower_cookies::cookie::SameSite;
pub use tower_sessions_core::Session;

#[cfg(any(feature = "signed", feature = "private"))]
pub use tower_cookies::Key;

pub use crate::config::{CookieSessionConfig, DEFAULT_COOKIE_NAME};
pub use crate::controller::{CookieController, CookieWriter, PlaintextCookie, ResponseCookies};
pub use crate::error::{Error, Result};
pub use crate::handler::{CookieSessionHandler, RequestType, SessionRequest};
pub use crate::layer::{CookieSessionManagerLayer, SubRequest};
pub use crate::store::{HandlerStore, record_from_cookie};

#[cfg(feature = "signed")]
pub use crate::controller::SignedCookie;

#[cfg(feature = "private")]
pub use crate::controller::PrivateCookie;
