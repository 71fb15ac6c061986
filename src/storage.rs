//! Flat-file storage for generated images.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::constants::{IMAGE_EXTENSION, PUBLIC_IMAGE_PATH};
use crate::error::RelayError;

/// A generated image that has been written to disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredArtifact {
    /// `<uuid>.png`
    pub file_name: String,
    /// Where the file lives on disk
    pub path: PathBuf,
    /// Where the file can be fetched from
    pub public_url: String,
}

/// The content directory plus the domain it is published under.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    image_dir: PathBuf,
    public_domain: String,
}

impl ArtifactStore {
    /// Creates a store; the directory is only created on first write.
    pub fn new(image_dir: impl Into<PathBuf>, public_domain: &str) -> Self {
        Self {
            image_dir: image_dir.into(),
            public_domain: public_domain.trim_end_matches('/').to_string(),
        }
    }

    /// The content directory.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Public URL for an artifact file name.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.public_domain, PUBLIC_IMAGE_PATH, file_name)
    }

    /// Writes `bytes` under a fresh unique name.
    pub async fn persist(&self, bytes: &[u8]) -> Result<StoredArtifact, RelayError> {
        let file_name = format!("{}.{}", Uuid::new_v4(), IMAGE_EXTENSION);

        // create_dir_all is a no-op when the directory already exists
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(|err| {
                RelayError::Persistence(format!(
                    "could not create {}: {err}",
                    self.image_dir.display()
                ))
            })?;

        let path = self.image_dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|err| {
            RelayError::Persistence(format!("could not write {}: {err}", path.display()))
        })?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());

        Ok(StoredArtifact {
            public_url: self.public_url(&file_name),
            file_name,
            path,
        })
    }

    /// Maps a requested file name to a path inside the content directory.
    ///
    /// Returns `None` for anything that is not a single plain file name.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.contains(['/', '\\']) {
            return None;
        }
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == OsStr::new(file_name) => {
                Some(self.image_dir.join(name))
            }
            _ => None,
        }
    }
}
