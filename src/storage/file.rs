use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt as _};

use crate::{
    error::{Error, Result},
    session::SessionData,
    storage::{SessionDataStore, random_id},
};

#[derive(Debug, Serialize, Deserialize)]
struct FileContents {
    data: SessionData,
    #[serde(with = "time::serde::rfc3339::option")]
    expires: Option<OffsetDateTime>,
}

/// Session store that writes one JSON file per session under a directory.
///
/// A session with id `0123456789abcdef` lives at `<dir>/0123/456789abcdef`.
///
/// Expired files are deleted when their id is read. Clients drop expired cookies and never
/// send those ids again, so long-running services should call
/// [`prune_expired`](Self::prune_expired) periodically.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for `id`, or `None` if `id` could not have been issued by this store.
    fn path(&self, id: &str) -> Option<PathBuf> {
        if id.len() != 16 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let (prefix, rest) = id.split_at(4);
        Some(self.dir.join(prefix).join(rest))
    }

    /// Delete every session file whose expiry has passed. Returns how many were removed.
    ///
    /// Files that can't be read or decoded are left alone.
    pub async fn prune_expired(&self) -> Result<usize> {
        let mut removed = 0;
        let mut prefixes = match fs::read_dir(&self.dir).await {
            Ok(prefixes) => prefixes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let now = OffsetDateTime::now_utc();
        while let Some(prefix) = prefixes.next_entry().await? {
            if !prefix.file_type().await?.is_dir() {
                continue;
            }

            let mut files = fs::read_dir(prefix.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                let Ok(bytes) = fs::read(&path).await else {
                    continue;
                };
                let contents = match serde_json::from_slice::<FileContents>(&bytes) {
                    Ok(contents) => contents,
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            err = %err,
                            "skipping unreadable session file"
                        );
                        continue;
                    }
                };

                if contents.expires.is_some_and(|expires| expires <= now) {
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        tracing::debug!(removed, "pruned expired session files");
        Ok(removed)
    }

    fn encode(data: &SessionData, expires: Option<OffsetDateTime>) -> Result<Vec<u8>> {
        let contents = FileContents {
            data: data.clone(),
            expires,
        };
        serde_json::to_vec(&contents).map_err(|err| Error::Encode(err.to_string()))
    }

    async fn ensure_parent(path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) => fs::create_dir_all(parent).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionDataStore for FileStore {
    async fn create_data(
        &self,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<String> {
        let contents = Self::encode(data, expires)?;

        loop {
            let id = random_id();
            let Some(path) = self.path(&id) else {
                continue;
            };
            Self::ensure_parent(&path).await?;

            let file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };

            file.write_all(&contents).await?;
            file.flush().await?;
            return Ok(id);
        }
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>> {
        let Some(path) = self.path(id) else {
            return Ok(None);
        };

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let contents: FileContents =
            serde_json::from_slice(&bytes).map_err(|err| Error::Decode(err.to_string()))?;

        match contents.expires {
            Some(expires) if expires <= OffsetDateTime::now_utc() => {
                self.delete_data(id).await?;
                Ok(None)
            }
            _ => Ok(Some(contents.data)),
        }
    }

    async fn update_data(
        &self,
        id: &str,
        data: &SessionData,
        expires: Option<OffsetDateTime>,
    ) -> Result<()> {
        let path = self
            .path(id)
            .ok_or_else(|| Error::Backend(format!("invalid session id: {id:?}")))?;
        let contents = Self::encode(data, expires)?;

        Self::ensure_parent(&path).await?;
        fs::write(&path, contents).await?;
        Ok(())
    }

    async fn delete_data(&self, id: &str) -> Result<()> {
        let Some(path) = self.path(id) else {
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
