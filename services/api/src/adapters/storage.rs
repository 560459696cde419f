//! services/api/src/adapters/storage.rs
//!
//! Filesystem implementation of the `ObjectStorage` port. Objects live under
//! `root_dir` and are served back by the static file route under `public_base`.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use homework_core::ports::{ObjectStorage, PortError, PortResult};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

/// Relative, slash-separated paths of safe segments. No `..`, no leading `/`.
static OBJECT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9._-]*(/[A-Za-z0-9_-][A-Za-z0-9._-]*)*$")
        .unwrap_or_else(|e| panic!("invalid object path pattern: {e}"))
});

#[derive(Clone)]
pub struct LocalObjectStorage {
    root_dir: PathBuf,
    public_base: String,
}

impl LocalObjectStorage {
    pub fn new(root_dir: PathBuf, public_base: String) -> Self {
        Self {
            root_dir,
            public_base,
        }
    }

    fn resolve(&self, path: &str) -> PortResult<PathBuf> {
        if !OBJECT_PATH.is_match(path) {
            return Err(PortError::Remote(format!("Invalid object path '{}'", path)));
        }
        Ok(self.root_dir.join(path))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!(?parent, "Failed to create storage directory: {:?}", e);
                PortError::Remote(e.to_string())
            })?;
        }

        let write = async {
            let mut file = tokio::fs::File::create(&full).await?;
            file.write_all(&data).await?;
            file.flush().await
        };
        if let Err(e) = write.await {
            error!(path, "Failed to write object: {:?}", e);
            let _ = tokio::fs::remove_file(&full).await;
            return Err(PortError::Remote(e.to_string()));
        }
        debug!(path, content_type, size = data.len(), "Stored object");
        Ok(())
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PortError::NotFound(format!("Object '{}' not found", path)))
            }
            Err(e) => Err(PortError::Remote(e.to_string())),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), path)
    }
}
