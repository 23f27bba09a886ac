use std::fmt::Debug;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tower_cookies::{Cookie, Cookies, cookie::CookieJar};

/// Bytes left as is in a cookie value. Everything else is percent-encoded, the same way the
/// legacy `rawurlencode` transport did. Request cookies are percent-decoded on the way in.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `value` as it appears in the `Set-Cookie` header.
pub(crate) fn escape_value(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_VALUE).to_string()
}

fn escaped(mut cookie: Cookie<'static>) -> Cookie<'static> {
    let value = escape_value(cookie.value());
    cookie.set_value(value);
    cookie
}

/// How the session cookie travels between server and client.
pub trait CookieController: Debug + Clone + Send + Sync + 'static {
    fn get(&self, cookies: &Cookies, name: &str) -> Option<Cookie<'static>>;
    fn add(&self, cookies: &Cookies, cookie: Cookie<'static>);

    /// Emits `cookie` as given. Removal cookies carry no data, so they bypass signing and
    /// encryption.
    fn remove(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        cookies.add(cookie);
    }
}

/// Cookie value sent unsigned and unencrypted. This is the transport older clients hold cookies for.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCookie;

impl CookieController for PlaintextCookie {
    fn get(&self, cookies: &Cookies, name: &str) -> Option<Cookie<'static>> {
        cookies.get(name).map(Cookie::into_owned)
    }

    fn add(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        cookies.add(escaped(cookie));
    }
}

#[cfg(feature = "signed")]
#[derive(Debug, Clone)]
pub struct SignedCookie {
    key: crate::Key,
}

#[cfg(feature = "signed")]
impl SignedCookie {
    pub fn new(key: crate::Key) -> Self {
        Self { key }
    }
}

#[cfg(feature = "signed")]
impl CookieController for SignedCookie {
    fn get(&self, cookies: &Cookies, name: &str) -> Option<Cookie<'static>> {
        cookies.signed(&self.key).get(name).map(Cookie::into_owned)
    }

    fn add(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(cookie);
        if let Some(signed) = jar.delta().next().cloned() {
            cookies.add(escaped(signed));
        }
    }
}

#[cfg(feature = "private")]
#[derive(Debug, Clone)]
pub struct PrivateCookie {
    key: crate::Key,
}

#[cfg(feature = "private")]
impl PrivateCookie {
    pub fn new(key: crate::Key) -> Self {
        Self { key }
    }
}

#[cfg(feature = "private")]
impl CookieController for PrivateCookie {
    fn get(&self, cookies: &Cookies, name: &str) -> Option<Cookie<'static>> {
        cookies.private(&self.key).get(name).map(Cookie::into_owned)
    }

    fn add(&self, cookies: &Cookies, cookie: Cookie<'static>) {
        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(cookie);
        if let Some(encrypted) = jar.delta().next().cloned() {
            cookies.add(escaped(encrypted));
        }
    }
}

/// Response side of a request/response cycle, as seen by the session handler.
pub trait CookieWriter {
    fn set_cookie(&mut self, cookie: Cookie<'static>);

    /// `cookie` is a removal cookie: empty value, already expired.
    fn clear_cookie(&mut self, cookie: Cookie<'static>);
}

/// Writes through a [`CookieController`] into the response's [`Cookies`].
#[derive(Debug)]
pub struct ResponseCookies<'a, C: CookieController> {
    cookies: &'a Cookies,
    controller: &'a C,
}

impl<'a, C: CookieController> ResponseCookies<'a, C> {
    pub fn new(cookies: &'a Cookies, controller: &'a C) -> Self {
        Self {
            cookies,
            controller,
        }
    }
}

impl<C: CookieController> CookieWriter for ResponseCookies<'_, C> {
    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.controller.add(self.cookies, cookie);
    }

    fn clear_cookie(&mut self, cookie: Cookie<'static>) {
        self.controller.remove(self.cookies, cookie);
    }
}

impl CookieWriter for CookieJar {
    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.add(cookie);
    }

    fn clear_cookie(&mut self, cookie: Cookie<'static>) {
        self.add(cookie);
    }
}
