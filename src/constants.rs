//! Shared constants/setters for things
//!

use std::sync::LazyLock;
use std::time::Duration;

/// The default place we put generated images
pub const DEFAULT_IMAGE_DIR: &str = "./public/images";

/// URL path prefix that generated images are published under.
pub const PUBLIC_IMAGE_PATH: &str = "/images";

/// Extension (and format) of every stored artifact.
pub const IMAGE_EXTENSION: &str = "png";

/// Default upstream generation endpoint.
pub const DEFAULT_API_URL: &str = "https://draw.openai-next.com/sd/v2beta/stable-image/generate/sd3";

/// Timeout for downloading the source image.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum redirects followed when downloading the source image.
pub const FETCH_MAX_REDIRECTS: usize = 5;

/// Timeout for the upstream generation call.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Source images are shrunk to fit inside this square before upload.
pub const MAX_IMAGE_DIMENSION: u32 = 1024;

/// How much of an upstream body ends up in the logs.
pub const LOG_BODY_PREVIEW_CHARS: usize = 200;

/// Max age (in seconds) for generated image cache entries, one year.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 365;

/// Cache-Control value for image responses. Artifacts never change once written.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> =
    LazyLock::new(|| format!("public, max-age={IMAGE_CACHE_MAX_AGE_SECONDS}, immutable"));

#[cfg(test)]
/// Public domain used in tests
pub const TEST_PUBLIC_DOMAIN: &str = "https://relay.example.org";
