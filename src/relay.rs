//! The generation pipeline: fetch, compose, generate, persist.

use tracing::{debug, info, instrument};

use crate::error::RelayError;
use crate::fetch::ImageFetcher;
use crate::storage::{ArtifactStore, StoredArtifact};
use crate::upstream::GenerationClient;

/// Everything a request needs, built once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct Relay {
    fetcher: ImageFetcher,
    generator: GenerationClient,
    store: ArtifactStore,
}

impl Relay {
    /// Wires the pipeline stages together.
    pub fn new(fetcher: ImageFetcher, generator: GenerationClient, store: ArtifactStore) -> Self {
        Self {
            fetcher,
            generator,
            store,
        }
    }

    /// Where artifacts are written and served from.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Runs every stage in order; the first failure is returned and nothing
    /// already written is cleaned up.
    #[instrument(skip_all, fields(image_url = %image_url))]
    pub async fn generate(
        &self,
        image_url: &str,
        prompt: Option<&str>,
    ) -> Result<StoredArtifact, RelayError> {
        info!("Processing source image");
        let source = self.fetcher.fetch_normalized(image_url).await?;
        info!("Source image normalized, {} bytes", source.len());

        debug!("User prompt: {:?}", prompt);
        let config = self.generator.defaults().compose(prompt);

        let generated = self.generator.generate(source, &config).await?;
        let artifact = self.store.persist(&generated).await?;
        info!("Generated image available at {}", artifact.public_url);
        Ok(artifact)
    }
}
