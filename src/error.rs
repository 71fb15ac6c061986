//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::models::ImageResponse;

/// Everything that can go wrong while relaying or serving an image.
#[derive(Debug)]
pub enum RelayError {
    /// The request is missing something we need
    Validation(String),
    /// The source image could not be downloaded
    Fetch(String),
    /// The source image could not be decoded or re-encoded
    Decode(String),
    /// The generation service could not be reached
    UpstreamRequest(String),
    /// The generation service answered with something other than 200
    UpstreamStatus(u16),
    /// The generation service answered 200 but the body was unusable
    ResponseFormat(String),
    /// The generated image could not be written to disk
    Persistence(String),
    /// A requested artifact does not exist
    NotFound(String),
    /// An artifact exists but could not be served
    Serve(String),
}

impl RelayError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Fetch(_)
            | Self::Decode(_)
            | Self::UpstreamRequest(_)
            | Self::UpstreamStatus(_)
            | Self::ResponseFormat(_)
            | Self::Persistence(_)
            | Self::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) | Self::ResponseFormat(message) => write!(f, "{message}"),
            Self::Fetch(message) | Self::Decode(message) => {
                write!(f, "Failed to download and process image: {message}")
            }
            Self::UpstreamRequest(message) => write!(f, "Generation request failed: {message}"),
            Self::UpstreamStatus(status) => write!(f, "API returned status {status}"),
            Self::Persistence(message) => write!(f, "Failed to save image: {message}"),
            Self::NotFound(_) => write!(f, "Image not found"),
            Self::Serve(_) => write!(f, "Error serving image"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<axum::http::Error> for RelayError {
    fn from(err: axum::http::Error) -> Self {
        RelayError::Serve(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            RelayError::NotFound(name) => {
                info!("Image not found: {name}");
                (status, self.to_string()).into_response()
            }
            RelayError::Serve(message) => {
                error!("Error serving image: {message}");
                (status, self.to_string()).into_response()
            }
            RelayError::Validation(_) => {
                info!("Bad request: {self}");
                (status, Json(ImageResponse::failure(status, self.to_string()))).into_response()
            }
            RelayError::Fetch(_)
            | RelayError::Decode(_)
            | RelayError::UpstreamRequest(_)
            | RelayError::UpstreamStatus(_)
            | RelayError::ResponseFormat(_)
            | RelayError::Persistence(_) => {
                error!("Image generation failed: {self}");
                (status, Json(ImageResponse::failure(status, self.to_string()))).into_response()
            }
        }
    }
}
