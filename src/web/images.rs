use std::fs::Metadata;
use std::io::ErrorKind;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};

use super::AppState;
use crate::constants::IMAGE_CACHE_CONTROL;
use crate::error::RelayError;

/// Validators of a stored artifact, as sent in `ETag` and `Last-Modified`.
#[derive(Clone, Debug)]
struct Freshness {
    etag: String,
    modified_at: Option<SystemTime>,
}

fn unix_nanos(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH)
        .map(|since| since.as_nanos())
        .unwrap_or_default()
}

impl Freshness {
    fn of(metadata: &Metadata) -> Self {
        let modified_at = metadata.modified().ok();
        let stamp = modified_at.map(unix_nanos).unwrap_or_default();
        Self {
            etag: format!("W/\"{}-{stamp}\"", metadata.len()),
            modified_at,
        }
    }

    /// True when the client's cached copy is still current.
    ///
    /// `If-None-Match` decides on its own when present; otherwise
    /// `If-Modified-Since` is compared at whole-second precision.
    fn is_current_for(&self, headers: &HeaderMap) -> bool {
        if let Some(candidates) = headers.get(IF_NONE_MATCH) {
            return candidates.to_str().is_ok_and(|candidates| {
                candidates.trim() == "*"
                    || candidates.split(',').any(|tag| tag.trim() == self.etag)
            });
        }

        let since = headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_http_date(value).ok());
        match (self.modified_at, since) {
            (Some(modified), Some(since)) => {
                unix_nanos(modified) / 1_000_000_000 <= unix_nanos(since) / 1_000_000_000
            }
            _ => false,
        }
    }

    /// Starts a response carrying the cache policy and validators.
    fn response(&self, status: StatusCode) -> axum::http::response::Builder {
        let builder = Response::builder()
            .status(status)
            .header(CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str())
            .header(ETAG, self.etag.as_str());
        match self.modified_at {
            Some(modified) => builder.header(LAST_MODIFIED, fmt_http_date(modified)),
            None => builder,
        }
    }
}

/// Serves a stored artifact by file name.
pub(crate) async fn image_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Response, RelayError> {
    let Some(image_path) = state.relay.store().resolve(&filename) else {
        return Err(RelayError::NotFound(filename));
    };

    let metadata = match tokio::fs::metadata(&image_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(RelayError::NotFound(filename)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(RelayError::NotFound(filename));
        }
        Err(err) => return Err(RelayError::Serve(err.to_string())),
    };
    let freshness = Freshness::of(&metadata);
    if freshness.is_current_for(&headers) {
        return Ok(freshness
            .response(StatusCode::NOT_MODIFIED)
            .body(Body::empty())?);
    }

    let bytes = match tokio::fs::read(&image_path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(RelayError::NotFound(filename));
        }
        Err(err) => return Err(RelayError::Serve(err.to_string())),
    };
    Ok(freshness
        .response(StatusCode::OK)
        .header(CONTENT_TYPE, "image/png")
        .body(Body::from(bytes))?)
}
