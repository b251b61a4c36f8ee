use std::borrow::Cow;

use cookie::Cookie as HttpCookie;
use time::{Duration, OffsetDateTime};

use crate::SameSite;

/// Attributes of a named cookie together with the secrets used to sign it.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) path: Cow<'static, str>,
    pub(crate) expires: Option<OffsetDateTime>,
    pub(crate) max_age: Option<Duration>,
    pub(crate) http_only: bool,
    pub(crate) secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secrets: Vec<String>,
}

impl CookieConfig {
    pub fn new<N: Into<Cow<'static, str>>>(name: N) -> Self {
        Self {
            name: name.into(),
            domain: None,
            path: "/".into(),
            expires: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: SameSite::Lax,
            secrets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
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
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    /// Absolute expiry. Ignored when a max-age is also configured.
    #[must_use]
    pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Relative expiry. Takes precedence over [`with_expires`](Self::with_expires).
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Signing secrets, newest first. The first secret signs new cookies; all of them are
    /// tried when verifying.
    #[must_use]
    pub fn with_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets = secrets.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn with_overrides(&self, options: Option<&CookieOptions>) -> Self {
        let mut config = self.clone();
        let Some(options) = options else {
            return config;
        };

        if let Some(domain) = &options.domain {
            config.domain = Some(domain.clone());
        }
        if let Some(path) = &options.path {
            config.path = path.clone();
        }
        if let Some(expires) = options.expires {
            config.expires = Some(expires);
        }
        if let Some(max_age) = options.max_age {
            config.max_age = Some(max_age);
        }
        if let Some(http_only) = options.http_only {
            config.http_only = http_only;
        }
        if let Some(secure) = options.secure {
            config.secure = secure;
        }
        if let Some(same_site) = options.same_site {
            config.same_site = same_site;
        }

        config
    }

    /// The expiry a cookie serialized right now would carry.
    pub(crate) fn effective_expires(&self) -> Option<OffsetDateTime> {
        match self.max_age {
            Some(max_age) => Some(OffsetDateTime::now_utc() + max_age),
            None => self.expires,
        }
    }

    pub(crate) fn build_cookie(&self, value: String) -> HttpCookie<'static> {
        self.build_cookie_expiring(value, self.effective_expires())
    }

    /// Like [`build_cookie`](Self::build_cookie) with `expires` fixed by the caller, so the
    /// cookie and server-side data can share one expiry instant.
    pub(crate) fn build_cookie_expiring(
        &self,
        value: String,
        expires: Option<OffsetDateTime>,
    ) -> HttpCookie<'static> {
        let mut cookie_builder = HttpCookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        if let Some(max_age) = self.max_age {
            cookie_builder = cookie_builder.max_age(max_age);
        }

        if let Some(expires) = expires {
            cookie_builder = cookie_builder.expires(expires);
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        let mut cookie = cookie_builder.build();
        // `cookie` only renders these flags when they are set to true.
        if !self.http_only {
            cookie.set_http_only(None);
        }
        if !self.secure {
            cookie.set_secure(None);
        }
        cookie
    }

    pub(crate) fn build_removal_cookie(&self) -> HttpCookie<'static> {
        let mut cookie = self.build_cookie(String::new());
        cookie.set_max_age(None);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    }
}

/// Per-call overrides applied on top of a [`CookieConfig`]. Set fields win.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<Cow<'static, str>>,
    pub path: Option<Cow<'static, str>>,
    pub expires: Option<OffsetDateTime>,
    pub max_age: Option<Duration>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}
