//! Session storage: the facade applications call and the backends it delegates to.
//!
//! [`SessionStorage`] is the request-facing facade (`get_session`, `commit_session`,
//! `destroy_session`). Backends that keep session data on the server implement
//! [`SessionDataStore`] and are wrapped in an [`IdSessionStorage`], which puts only an opaque
//! identifier in the cookie. [`CookieSessionStorage`] keeps the whole session in the cookie.

mod cookie;
mod file;
mod kv;
mod memory;
mod table;

use std::fmt::Debug;

use async_trait::async_trait;
use time::OffsetDateTime;

pub use self::cookie::CookieSessionStorage;
pub use self::file::FileStore;
pub use self::kv::{KvNamespace, KvSessionStore};
pub use self::memory::MemoryStore;
pub use self::table::{SessionTable, TableItem, TableSessionStore};
use crate::{
    config::{CookieConfig, CookieOptions},
    container::Cookie,
    error::Result,
    session::{Session, SessionData},
};

/// Cookie name used when a storage is built without an explicit cookie.
pub const DEFAULT_COOKIE_NAME: &str = "__session";

/// Request-facing session operations.
#[async_trait]
pub trait SessionStorage: Send + Sync + 'static {
    /// Load the session referenced by a `Cookie` header.
    ///
    /// A missing, unverifiable, unknown, or expired cookie yields a fresh empty session.
    async fn get_session(&self, cookie_header: Option<&str>) -> Result<Session>;

    /// Persist `session` and return the `Set-Cookie` header value for the response.
    async fn commit_session(
        &self,
        session: &mut Session,
        options: Option<&CookieOptions>,
    ) -> Result<String>;

    /// Delete `session` and return a `Set-Cookie` header value that clears the cookie.
    async fn destroy_session(
        &self,
        session: &mut Session,
        options: Option<&CookieOptions>,
    ) -> Result<String>;
}

/// Server-side storage of session data keyed by an opaque identifier.
///
/// `expires` is the expiry written to the client's cookie. Backends may use it to prune
/// stale data; the cookie itself still governs the client-side lifetime.
#[async_trait]
pub trait SessionDataStore: Debug + Send + Sync + 'static {
    async fn create_data(
        &self,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<String>;

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>>;

    async fn update_data(
        &self,
        id: &str,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<()>;

    async fn delete_data(&self, id: &str) -> Result<()>;
}

/// Session storage that keeps data in a [`SessionDataStore`] and only the id in the cookie.
#[derive(Debug, Clone)]
pub struct IdSessionStorage<S: SessionDataStore> {
    cookie: Cookie,
    store: S,
}

pub type MemorySessionStorage = IdSessionStorage<MemoryStore>;
pub type FileSessionStorage = IdSessionStorage<FileStore>;

impl<S: SessionDataStore> IdSessionStorage<S> {
    pub fn new(cookie: Cookie, store: S) -> Self {
        warn_if_unsigned(&cookie);
        Self { cookie, store }
    }

    /// Uses a default `__session` cookie.
    pub fn with_store(store: S) -> Self {
        Self::new(Cookie::new(CookieConfig::new(DEFAULT_COOKIE_NAME)), store)
    }

    pub fn cookie(&self) -> &Cookie {
        &self.cookie
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: SessionDataStore> SessionStorage for IdSessionStorage<S> {
    async fn get_session(&self, cookie_header: Option<&str>) -> Result<Session> {
        let Some(id) = self.cookie.parse::<String>(cookie_header) else {
            return Ok(Session::new());
        };

        match self.store.read_data(&id).await? {
            Some(data) => Ok(Session::from_parts(Some(id), data)),
            None => {
                tracing::debug!(session.id = %id, "session not found in store");
                Ok(Session::new())
            }
        }
    }

    async fn commit_session(
        &self,
        session: &mut Session,
        options: Option<&CookieOptions>,
    ) -> Result<String> {
        let data = session.data_to_commit();
        let expires = self.cookie.expires_with(options);

        let id = match session.id() {
            Some(id) => {
                self.store.update_data(id, &data, expires).await?;
                tracing::debug!(session.id = %id, "session updated");
                id.to_string()
            }
            None => {
                let id = self.store.create_data(&data, expires).await?;
                tracing::debug!(session.id = %id, "session created");
                id
            }
        };

        let header = self.cookie.serialize_expiring(&id, options, expires)?;
        session.committed(Some(id));
        Ok(header)
    }

    async fn destroy_session(
        &self,
        session: &mut Session,
        options: Option<&CookieOptions>,
    ) -> Result<String> {
        if let Some(id) = session.id() {
            self.store.delete_data(id).await?;
            tracing::debug!(session.id = %id, "session deleted");
        }

        session.clear();
        Ok(self.cookie.expired(options))
    }
}

pub(crate) fn warn_if_unsigned(cookie: &Cookie) {
    if !cookie.is_signed() {
        tracing::warn!(
            cookie = %cookie.name(),
            "session cookie is not signed; configure secrets to detect tampering"
        );
    }
}

/// 8 random bytes, hex encoded.
pub(crate) fn random_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}
