use async_trait::async_trait;

use crate::{
    config::{CookieConfig, CookieOptions},
    container::Cookie,
    error::{Error, Result},
    session::{Session, SessionData},
    storage::{DEFAULT_COOKIE_NAME, SessionStorage, warn_if_unsigned},
};

/// Browsers reject cookies larger than this.
pub const DEFAULT_MAX_COOKIE_BYTES: usize = 4096;

/// Session storage that keeps the entire session in the cookie.
///
/// There is no server-side state, so every change must be committed for the client to see
/// it, and the session must fit in a single cookie.
#[derive(Debug, Clone)]
pub struct CookieSessionStorage {
    cookie: Cookie,
    max_cookie_bytes: usize,
}

impl CookieSessionStorage {
    pub fn new(cookie: Cookie) -> Self {
        warn_if_unsigned(&cookie);
        Self {
            cookie,
            max_cookie_bytes: DEFAULT_MAX_COOKIE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    pub fn cookie(&self) -> &Cookie {
        &self.cookie
    }
}

impl Default for CookieSessionStorage {
    fn default() -> Self {
        Self::new(Cookie::new(CookieConfig::new(DEFAULT_COOKIE_NAME)))
    }
}

#[async_trait]
impl SessionStorage for CookieSessionStorage {
    async fn get_session(&self, cookie_header: Option<&str>) -> Result<Session> {
        let data = self
            .cookie
            .parse::<SessionData>(cookie_header)
            .unwrap_or_default();

        Ok(Session::from_parts(None, data))
    }

    async fn commit_session(
        &self,
        session: &mut Session,
        options: Option<&CookieOptions>,
    ) -> Result<String> {
        let header = self.cookie.serialize(&session.data_to_commit(), options)?;
        if header.len() > self.max_cookie_bytes {
            return Err(Error::CookieTooLarge {
                size: header.len(),
                max: self.max_cookie_bytes,
            });
        }

        session.committed(None);
        Ok(header)
    }

    async fn destroy_session(
        &self,
        session: &mut Session,
        options: Option<&CookieOptions>,
    ) -> Result<String> {
        session.clear();
        Ok(self.cookie.expired(options))
    }
}
