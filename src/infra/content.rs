//! Filesystem-backed storage for pattern bodies.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::fs;

use crate::application::content::{ContentStore, ContentStoreError, validate_relative_path};

#[derive(Debug, Clone)]
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, ContentStoreError> {
        let relative = validate_relative_path(stored_path)?;
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn read(&self, path: &str) -> Result<Option<String>, ContentStoreError> {
        let absolute = self.resolve(path)?;
        match fs::read_to_string(&absolute).await {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ContentStoreError::Io(err)),
        }
    }

    async fn write(&self, path: &str, body: &str) -> Result<(), ContentStoreError> {
        let absolute = self.resolve(path)?;
        let parent = absolute
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).await?;

        let body = body.to_owned();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = NamedTempFile::new_in(&parent)?;
            temp.write_all(body.as_bytes())?;
            temp.as_file().sync_all()?;
            temp.persist(&absolute).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), ContentStoreError> {
        let absolute = self.resolve(path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ContentStoreError::Io(err)),
        }
    }
}
