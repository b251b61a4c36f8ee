use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    error::Result,
    session::SessionData,
    storage::{SessionDataStore, random_id},
};

#[derive(Debug, Clone)]
struct Entry {
    data: SessionData,
    expires: Option<OffsetDateTime>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires
            .is_none_or(|expires| expires > OffsetDateTime::now_utc())
    }
}

/// In-process session store. Data is lost when the process exits.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions. Expired ones are pruned on the next write.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl SessionDataStore for MemoryStore {
    async fn create_data(
        &self,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<String> {
        let mut lock = self.inner.write().await;
        lock.retain(|_, entry| entry.is_live());
        let id = loop {
            let id = random_id();
            if !lock.contains_key(&id) {
                break id;
            }
        };

        lock.insert(
            id.clone(),
            Entry {
                data: data.clone(),
                expires,
            },
        );
        Ok(id)
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>> {
        {
            let lock = self.inner.read().await;
            match lock.get(id) {
                None => return Ok(None),
                Some(entry) if entry.is_live() => return Ok(Some(entry.data.clone())),
                Some(_) => {}
            }
        }

        let mut lock = self.inner.write().await;
        if lock.get(id).is_some_and(|entry| !entry.is_live()) {
            lock.remove(id);
        }
        Ok(None)
    }

    async fn update_data(
        &self,
        id: &str,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<()> {
        let mut lock = self.inner.write().await;
        lock.retain(|_, entry| entry.is_live());
        lock.insert(
            id.to_string(),
            Entry {
                data: data.clone(),
                expires,
            },
        );
        Ok(())
    }

    async fn delete_data(&self, id: &str) -> Result<()> {
        let mut lock = self.inner.write().await;
        lock.remove(id);
        Ok(())
    }
}
