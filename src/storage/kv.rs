use std::fmt::Debug;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    error::{Error, Result},
    session::SessionData,
    storage::{SessionDataStore, random_id},
};

/// A remote key-value namespace holding string values.
///
/// Implement this over the client of your KV service. Errors should be mapped into
/// [`Error::Backend`]; they are passed to the caller unchanged.
#[async_trait]
pub trait KvNamespace: Debug + Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, letting the service evict it after `expiration` when given.
    async fn put(&self, key: &str, value: String, expiration: Option<OffsetDateTime>)
    -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Session store backed by a [`KvNamespace`]. Expiry is delegated to the namespace.
#[derive(Debug, Clone)]
pub struct KvSessionStore<N> {
    namespace: N,
}

impl<N: KvNamespace> KvSessionStore<N> {
    pub fn new(namespace: N) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &N {
        &self.namespace
    }

    fn encode(data: &SessionData) -> Result<String> {
        serde_json::to_string(data).map_err(|err| Error::Encode(err.to_string()))
    }
}

#[async_trait]
impl<N: KvNamespace> SessionDataStore for KvSessionStore<N> {
    async fn create_data(
        &self,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<String> {
        let value = Self::encode(data)?;

        loop {
            let id = random_id();
            if self.namespace.get(&id).await?.is_some() {
                continue;
            }

            self.namespace.put(&id, value, expires).await?;
            return Ok(id);
        }
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>> {
        let Some(value) = self.namespace.get(id).await? else {
            return Ok(None);
        };

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|err| Error::Decode(err.to_string()))
    }

    async fn update_data(
        &self,
        id: &str,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<()> {
        self.namespace.put(id, Self::encode(data)?, expires).await
    }

    async fn delete_data(&self, id: &str) -> Result<()> {
        self.namespace.delete(id).await
    }
}
