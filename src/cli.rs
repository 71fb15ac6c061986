//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;

use anyhow::Context;

use crate::constants::{DEFAULT_API_URL, DEFAULT_IMAGE_DIR};
use crate::fetch::ImageFetcher;
use crate::prompt::GenerationConfig;
use crate::relay::Relay;
use crate::storage::ArtifactStore;
use crate::upstream::GenerationClient;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "IMAGERELAY_DEBUG")]
    /// Enable debug logging. Env: IMAGERELAY_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "IMAGERELAY_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: IMAGERELAY_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "IMAGERELAY_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: IMAGERELAY_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(
        long,
        default_value = "http://localhost:9000",
        env = "IMAGERELAY_PUBLIC_DOMAIN"
    )]
    /// Scheme and host that generated image URLs start with.
    /// Env: IMAGERELAY_PUBLIC_DOMAIN
    pub public_domain: String,
    #[clap(long, default_value = DEFAULT_IMAGE_DIR, env = "IMAGERELAY_IMAGE_DIR")]
    /// Where generated images are written, eg `/data/images`.
    /// Env: IMAGERELAY_IMAGE_DIR
    pub image_dir: PathBuf,

    #[clap(long, default_value = "", env = "SD_API_KEY", hide_env_values = true)]
    /// Bearer token for the generation API. Env: SD_API_KEY
    pub api_key: String,
    #[clap(long, default_value = DEFAULT_API_URL, env = "SD_API_URL")]
    /// Generation API endpoint. Env: SD_API_URL
    pub api_url: String,
    #[clap(long, env = "IMAGERELAY_GENERATION_CONFIG")]
    /// JSON file overriding the default generation settings.
    /// Env: IMAGERELAY_GENERATION_CONFIG
    pub generation_config: Option<PathBuf>,
}

impl CliOptions {
    /// Loads the generation settings, falling back to the built-in defaults.
    pub fn generation_defaults(&self) -> Result<GenerationConfig, anyhow::Error> {
        match &self.generation_config {
            Some(path) => GenerationConfig::from_file(path),
            None => Ok(GenerationConfig::default()),
        }
    }

    /// Builds the pipeline these options describe.
    pub fn build_relay(&self) -> Result<Relay, anyhow::Error> {
        let fetcher = ImageFetcher::new().context("Failed to build image download client")?;
        let generator =
            GenerationClient::new(&self.api_key, &self.api_url, self.generation_defaults()?)?;
        let store = ArtifactStore::new(&self.image_dir, &self.public_domain);
        Ok(Relay::new(fetcher, generator, store))
    }
}
