use std::borrow::Cow;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::SameSite;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "s";

#[derive(Debug, Clone)]
pub struct CookieSessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) lifetime: Option<Duration>,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) secure: bool,
    pub(crate) http_only: bool,
    pub(crate) same_site: Option<SameSite>,
    pub(crate) max_cookie_bytes: usize,
}

impl Default for CookieSessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            lifetime: None,
            path: "/".into(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: None,
            max_cookie_bytes: 4096,
        }
    }
}

impl CookieSessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Give written payloads a fixed lifetime. Without one, `expire` is `0` and the cookie is
    /// dropped when the browser session ends.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    #[must_use]
    pub fn without_lifetime(mut self) -> Self {
        self.lifetime = None;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `expire` value for a payload written at `now`.
    pub(crate) fn expire_at(&self, now: OffsetDateTime) -> i64 {
        self.lifetime
            .map_or(0, |lifetime| (now + lifetime).unix_timestamp())
    }

    pub(crate) fn build_cookie(&self, value: String, expire: i64) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .secure(self.secure)
            .path(self.path.clone());

        if expire != 0 {
            match OffsetDateTime::from_unix_timestamp(expire) {
                Ok(expires) => cookie_builder = cookie_builder.expires(expires),
                Err(err) => {
                    tracing::warn!(err = %err, expire, "session cookie expiry out of range");
                }
            }
        }

        if let Some(same_site) = self.same_site {
            cookie_builder = cookie_builder.same_site(same_site);
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    /// An empty, already expired cookie scoped like the ones [`Self::build_cookie`] emits.
    pub(crate) fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
        cookie.make_removal();
        cookie
    }
}
