//! Downloads the source image and normalizes it for upload.

use std::io::Cursor;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use crate::constants::{FETCH_MAX_REDIRECTS, FETCH_TIMEOUT, MAX_IMAGE_DIMENSION};
use crate::error::RelayError;

/// HTTP client for source images.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    /// Builds a client with the download timeout and redirect limit applied.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_limits(FETCH_TIMEOUT, FETCH_MAX_REDIRECTS)
    }

    /// Builds a client with an explicit timeout and redirect limit.
    pub fn with_limits(timeout: Duration, max_redirects: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(max_redirects))
            .build()?;
        Ok(Self { client })
    }

    /// Downloads `image_url` and returns it as a PNG that fits the size limit.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_normalized(&self, image_url: &str) -> Result<Vec<u8>, RelayError> {
        let url = Url::parse(image_url)
            .map_err(|err| RelayError::Fetch(format!("invalid image URL {image_url:?}: {err}")))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RelayError::Fetch(err.to_string()))?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(RelayError::Fetch(format!(
                "source image returned status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| RelayError::Fetch(err.to_string()))?;
        debug!("Downloaded {} bytes", bytes.len());

        // decoding and resizing are CPU bound
        tokio::task::spawn_blocking(move || normalize_image(&bytes))
            .await
            .map_err(|err| RelayError::Decode(format!("image worker failed: {err}")))?
    }
}

/// Decodes any supported image and re-encodes it as PNG.
///
/// Images larger than [`MAX_IMAGE_DIMENSION`] on either side are shrunk to fit
/// with their aspect ratio kept; smaller images keep their size.
pub fn normalize_image(bytes: &[u8]) -> Result<Vec<u8>, RelayError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| RelayError::Decode(format!("could not read image: {err}")))?;
    let image = reader.decode().map_err(|err| {
        debug!("Failed to decode image: {}", err);
        RelayError::Decode(format!("could not decode image: {err}"))
    })?;

    let image = fit_inside(image, MAX_IMAGE_DIMENSION);

    let mut output = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|err| RelayError::Decode(format!("could not encode PNG: {err}")))?;
    Ok(output)
}

fn fit_inside(image: DynamicImage, max: u32) -> DynamicImage {
    if image.width() <= max && image.height() <= max {
        return image;
    }
    image.resize(max, max, FilterType::Lanczos3)
}
