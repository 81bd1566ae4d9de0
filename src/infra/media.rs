//! Read access to rendered artifacts in the media cache folder.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid cache file name")]
    InvalidPath,
    #[error("cache file not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A cached file ready to be served.
#[derive(Debug, Clone)]
pub struct CachedMedia {
    pub body: Bytes,
    pub content_type: String,
}

/// Filesystem-backed, flat media cache.
#[derive(Debug, Clone)]
pub struct MediaCache {
    root: PathBuf,
}

impl MediaCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn read(&self, filename: &str) -> Result<CachedMedia, MediaError> {
        let absolute = self.resolve(filename)?;
        let body = match fs::read(&absolute).await {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound);
            }
            Err(err) => return Err(MediaError::Io(err)),
        };

        let content_type = mime_guess::from_path(&absolute)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(CachedMedia {
            body: Bytes::from(body),
            content_type,
        })
    }

    /// The cache is flat: exactly one normal path component is accepted.
    fn resolve(&self, filename: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(filename);
        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !filename.contains('\\') => {
                Ok(self.root.join(relative))
            }
            _ => Err(MediaError::InvalidPath),
        }
    }
}
