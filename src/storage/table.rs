use std::{borrow::Cow, fmt::Debug};

use async_trait::async_trait;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{
    error::Result,
    session::SessionData,
    storage::{SessionDataStore, random_id},
};

/// An item in a [`SessionTable`].
pub type TableItem = Map<String, Value>;

/// A remote table (e.g. DynamoDB) holding one item per session.
///
/// Items are keyed by a single attribute whose name is passed to `get` and `delete`.
#[async_trait]
pub trait SessionTable: Debug + Send + Sync + 'static {
    async fn get(&self, key_attribute: &str, key: &str) -> Result<Option<TableItem>>;

    async fn put(&self, item: TableItem) -> Result<()>;

    async fn delete(&self, key_attribute: &str, key: &str) -> Result<()>;
}

/// Session store that flattens session data into table items.
///
/// Each item holds the session's keys plus the index attribute (default `_idx`) and, when
/// configured, a TTL attribute with the expiry in Unix seconds.
#[derive(Debug, Clone)]
pub struct TableSessionStore<T> {
    table: T,
    index: Cow<'static, str>,
    ttl: Option<Cow<'static, str>>,
}

impl<T: SessionTable> TableSessionStore<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            index: "_idx".into(),
            ttl: None,
        }
    }

    #[must_use]
    pub fn with_index<I: Into<Cow<'static, str>>>(mut self, index: I) -> Self {
        self.index = index.into();
        self
    }

    /// Attribute the table uses for time-to-live eviction.
    #[must_use]
    pub fn with_ttl<A: Into<Cow<'static, str>>>(mut self, ttl: A) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    fn item(&self, id: &str, data: &SessionData, expires: Option<OffsetDateTime>) -> TableItem {
        let mut item = data.clone();
        item.insert(self.index.to_string(), Value::String(id.to_string()));
        if let (Some(ttl), Some(expires)) = (&self.ttl, expires) {
            item.insert(ttl.to_string(), Value::from(expires.unix_timestamp()));
        }
        item
    }
}

#[async_trait]
impl<T: SessionTable> SessionDataStore for TableSessionStore<T> {
    async fn create_data(
        &self,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<String> {
        loop {
            let id = random_id();
            if self.table.get(&self.index, &id).await?.is_some() {
                continue;
            }

            self.table.put(self.item(&id, data, expires)).await?;
            return Ok(id);
        }
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>> {
        let Some(mut item) = self.table.get(&self.index, id).await? else {
            return Ok(None);
        };

        item.remove(&*self.index);
        if let Some(ttl) = &self.ttl {
            let expires_at = item.remove(&**ttl).and_then(|ttl| ttl.as_i64());
            // Tables evict expired items lazily.
            if expires_at.is_some_and(|ts| ts <= OffsetDateTime::now_utc().unix_timestamp()) {
                return Ok(None);
            }
        }

        Ok(Some(item))
    }

    async fn update_data(
        &self,
        id: &str,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<()> {
        self.table.put(self.item(id, data, expires)).await
    }

    async fn delete_data(&self, id: &str) -> Result<()> {
        self.table.delete(&self.index, id).await
    }
}
