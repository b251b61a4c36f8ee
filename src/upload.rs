//! Upload handlers for multipart form parts.
//!
//! A multipart parser hands each part to an [`UploadHandler`], which decides whether to take
//! it and turns its byte stream into a [`FormValue`]. Handlers enforce a maximum part size and
//! fail with [`UploadError::MaxPartSizeExceeded`] instead of truncating.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt as _, stream::BoxStream};
use tokio::{fs, io::AsyncWriteExt as _};

use crate::error::UploadError;

/// Default maximum size of a single part, in bytes.
pub const DEFAULT_MAX_PART_SIZE: u64 = 3_000_000;

/// Metadata of a multipart part, available before its body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: String,
}

/// A multipart part with its body as a stream of chunks.
pub struct UploadPart {
    pub info: PartInfo,
    pub data: BoxStream<'static, io::Result<Bytes>>,
}

impl fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPart")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl UploadPart {
    pub fn new(info: PartInfo, data: BoxStream<'static, io::Result<Bytes>>) -> Self {
        Self { info, data }
    }
}

/// Value produced by an upload handler for one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(UploadedFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadedFile {
    Memory {
        filename: String,
        content_type: String,
        bytes: Bytes,
    },
    Disk {
        filename: String,
        content_type: String,
        path: PathBuf,
        size: u64,
    },
}

impl UploadedFile {
    pub fn filename(&self) -> &str {
        match self {
            Self::Memory { filename, .. } | Self::Disk { filename, .. } => filename,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Memory { content_type, .. } | Self::Disk { content_type, .. } => content_type,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Memory { bytes, .. } => bytes.len() as u64,
            Self::Disk { size, .. } => *size,
        }
    }
}

pub type PartFilter = Arc<dyn Fn(&PartInfo) -> bool + Send + Sync>;

#[async_trait]
pub trait UploadHandler: Send + Sync {
    /// Whether this handler wants the part. Checked before the body is read.
    fn accepts(&self, _info: &PartInfo) -> bool {
        true
    }

    async fn handle(&self, part: UploadPart) -> Result<Option<FormValue>, UploadError>;
}

/// Buffers parts in memory: text for plain fields, [`UploadedFile::Memory`] for files.
#[derive(Clone)]
pub struct MemoryUploadHandler {
    max_part_size: u64,
    filter: Option<PartFilter>,
}

impl fmt::Debug for MemoryUploadHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUploadHandler")
            .field("max_part_size", &self.max_part_size)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl Default for MemoryUploadHandler {
    fn default() -> Self {
        Self {
            max_part_size: DEFAULT_MAX_PART_SIZE,
            filter: None,
        }
    }
}

impl MemoryUploadHandler {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_part_size(mut self, max_part_size: u64) -> Self {
        self.max_part_size = max_part_size;
        self
    }

    #[must_use]
    pub fn with_filter(
        mut self,
        filter: impl Fn(&PartInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

#[async_trait]
impl UploadHandler for MemoryUploadHandler {
    fn accepts(&self, info: &PartInfo) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(info))
    }

    async fn handle(&self, mut part: UploadPart) -> Result<Option<FormValue>, UploadError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = part.data.next().await {
            let chunk = chunk.map_err(UploadError::Stream)?;
            if (buf.len() + chunk.len()) as u64 > self.max_part_size {
                return Err(UploadError::MaxPartSizeExceeded {
                    field: part.info.name,
                    max: self.max_part_size,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        let value = match part.info.filename {
            Some(filename) => FormValue::File(UploadedFile::Memory {
                filename,
                content_type: part.info.content_type,
                bytes: buf.freeze(),
            }),
            None => match String::from_utf8(buf.to_vec()) {
                Ok(text) => FormValue::Text(text),
                Err(_) => {
                    return Err(UploadError::InvalidText {
                        field: part.info.name,
                    });
                }
            },
        };
        Ok(Some(value))
    }
}

/// Streams file parts to a directory. Parts without a filename are not accepted.
#[derive(Clone)]
pub struct FileUploadHandler {
    directory: PathBuf,
    max_part_size: u64,
    avoid_file_conflicts: bool,
    filter: Option<PartFilter>,
}

impl fmt::Debug for FileUploadHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUploadHandler")
            .field("directory", &self.directory)
            .field("max_part_size", &self.max_part_size)
            .field("avoid_file_conflicts", &self.avoid_file_conflicts)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl FileUploadHandler {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_part_size: DEFAULT_MAX_PART_SIZE,
            avoid_file_conflicts: true,
            filter: None,
        }
    }

    #[must_use]
    pub fn with_max_part_size(mut self, max_part_size: u64) -> Self {
        self.max_part_size = max_part_size;
        self
    }

    /// When disabled, an existing file at the target path is overwritten.
    #[must_use]
    pub fn with_avoid_file_conflicts(mut self, avoid_file_conflicts: bool) -> Self {
        self.avoid_file_conflicts = avoid_file_conflicts;
        self
    }

    #[must_use]
    pub fn with_filter(
        mut self,
        filter: impl Fn(&PartInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// A random file name that keeps the upload's extension.
    fn target_path(&self, filename: &str) -> PathBuf {
        let stem = hex::encode(rand::random::<[u8; 8]>());
        let name = match Path::new(filename).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        };
        self.directory.join(name)
    }

    async fn open(&self, filename: &str) -> io::Result<(PathBuf, fs::File)> {
        fs::create_dir_all(&self.directory).await?;
        loop {
            let path = self.target_path(filename);
            let mut options = fs::OpenOptions::new();
            options.write(true);
            if self.avoid_file_conflicts {
                options.create_new(true);
            } else {
                options.create(true).truncate(true);
            }

            match options.open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }

    async fn write_part(
        &self,
        part: &mut UploadPart,
        file: &mut fs::File,
    ) -> Result<u64, UploadError> {
        let mut size = 0u64;
        while let Some(chunk) = part.data.next().await {
            let chunk = chunk.map_err(UploadError::Stream)?;
            size += chunk.len() as u64;
            if size > self.max_part_size {
                return Err(UploadError::MaxPartSizeExceeded {
                    field: part.info.name.clone(),
                    max: self.max_part_size,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(size)
    }
}

#[async_trait]
impl UploadHandler for FileUploadHandler {
    fn accepts(&self, info: &PartInfo) -> bool {
        info.filename.is_some() && self.filter.as_ref().is_none_or(|filter| filter(info))
    }

    async fn handle(&self, mut part: UploadPart) -> Result<Option<FormValue>, UploadError> {
        let Some(filename) = part.info.filename.clone() else {
            return Ok(None);
        };

        let (path, mut file) = self.open(&filename).await?;
        let size = match self.write_part(&mut part, &mut file).await {
            Ok(size) => size,
            Err(err) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        err = %remove_err,
                        "failed to remove partial upload"
                    );
                }
                return Err(err);
            }
        };

        Ok(Some(FormValue::File(UploadedFile::Disk {
            filename,
            content_type: part.info.content_type,
            path,
            size,
        })))
    }
}

/// Tries handlers in order and gives the part to the first one that accepts it.
pub struct ComposedUploadHandler {
    handlers: Vec<Box<dyn UploadHandler>>,
}

impl fmt::Debug for ComposedUploadHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedUploadHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

pub fn compose_upload_handlers(handlers: Vec<Box<dyn UploadHandler>>) -> ComposedUploadHandler {
    ComposedUploadHandler { handlers }
}

#[async_trait]
impl UploadHandler for ComposedUploadHandler {
    fn accepts(&self, info: &PartInfo) -> bool {
        self.handlers.iter().any(|handler| handler.accepts(info))
    }

    async fn handle(&self, part: UploadPart) -> Result<Option<FormValue>, UploadError> {
        match self
            .handlers
            .iter()
            .find(|handler| handler.accepts(&part.info))
        {
            Some(handler) => handler.handle(part).await,
            None => {
                tracing::debug!(field = %part.info.name, "no upload handler accepted part");
                Ok(None)
            }
        }
    }
}
