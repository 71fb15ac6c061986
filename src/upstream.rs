//! Client for the upstream image-to-image generation service.

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::constants::{GENERATION_TIMEOUT, LOG_BODY_PREVIEW_CHARS};
use crate::error::RelayError;
use crate::prompt::GenerationConfig;

/// Submits source images to the generation service.
///
/// Built once at startup; holds no per-request state, so a single instance is
/// shared by every request.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    api_key: String,
    api_url: Url,
    defaults: GenerationConfig,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("GenerationClient")
            .field("api_key", &api_key)
            .field("api_url", &self.api_url.as_str())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Creates the client. An empty `api_key` is allowed, but upstream will
    /// reject the requests.
    pub fn new(
        api_key: &str,
        api_url: &str,
        defaults: GenerationConfig,
    ) -> Result<Self, anyhow::Error> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid generation API URL {api_url}"))?;
        if api_key.is_empty() {
            warn!("No generation API key configured, upstream calls will not be authenticated");
        }
        let http = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .context("Failed to build generation HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_url,
            defaults,
        })
    }

    /// The settings used when a request brings no prompt of its own.
    pub fn defaults(&self) -> &GenerationConfig {
        &self.defaults
    }

    /// Sends `image_png` with `config` upstream and returns the decoded result.
    #[instrument(level = "debug", skip_all, fields(model = %config.model))]
    pub async fn generate(
        &self,
        image_png: Vec<u8>,
        config: &GenerationConfig,
    ) -> Result<Vec<u8>, RelayError> {
        let image = Part::bytes(image_png)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|err| RelayError::UpstreamRequest(err.to_string()))?;
        let form = config
            .form_fields()
            .into_iter()
            .fold(Form::new().part("image", image), |form, (name, value)| {
                form.text(name, value)
            });

        let response = self
            .http
            .post(self.api_url.clone())
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                error!("Generation request failed: {err}");
                RelayError::UpstreamRequest(err.to_string())
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| RelayError::UpstreamRequest(err.to_string()))?;
        info!("Generation API response status: {status}");
        debug!("Generation API response body: {}", body_preview(&body));

        if status != StatusCode::OK {
            log_failure(status, &headers, &body);
            return Err(RelayError::UpstreamStatus(status.as_u16()));
        }

        let parsed: Value = serde_json::from_slice(&body).map_err(|err| {
            log_failure(status, &headers, &body);
            debug!("Generation API body is not JSON: {err}");
            RelayError::ResponseFormat("Invalid response format".to_string())
        })?;
        ImagePayload::parse(&parsed)?.decode()
    }
}

/// Where the base64 image was found in the upstream response.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum ImagePayload<'a> {
    /// `{"data": {"base64": "..."}}`
    Nested(&'a str),
    /// `{"image": "..."}`
    TopLevel(&'a str),
}

impl<'a> ImagePayload<'a> {
    /// Finds the image in a response body.
    ///
    /// The nested `data.base64` field wins; the top-level `image` field is the
    /// fallback. Only non-empty strings count.
    pub(crate) fn parse(body: &'a Value) -> Result<Self, RelayError> {
        let Some(object) = body.as_object() else {
            return Err(RelayError::ResponseFormat(
                "Invalid response format".to_string(),
            ));
        };

        let non_empty = |value: Option<&'a Value>| {
            value
                .and_then(Value::as_str)
                .filter(|encoded| !encoded.is_empty())
        };

        let nested = object.get("data").and_then(|data| data.get("base64"));
        if let Some(nested) = non_empty(nested) {
            return Ok(Self::Nested(nested));
        }
        if let Some(top_level) = non_empty(object.get("image")) {
            return Ok(Self::TopLevel(top_level));
        }
        Err(RelayError::ResponseFormat(
            "No image data in response".to_string(),
        ))
    }

    fn encoded(&self) -> &'a str {
        match self {
            Self::Nested(encoded) | Self::TopLevel(encoded) => *encoded,
        }
    }

    /// Strips an optional `data:image/...;base64,` prefix and decodes.
    pub(crate) fn decode(&self) -> Result<Vec<u8>, RelayError> {
        let encoded = strip_data_uri(self.encoded());
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        general_purpose::STANDARD.decode(cleaned).map_err(|err| {
            debug!("Failed to base64-decode image: {err}");
            RelayError::ResponseFormat(format!("Invalid base64 image data: {err}"))
        })
    }
}

/// Drops a leading `data:image/<subtype>;base64,` if there is one.
fn strip_data_uri(encoded: &str) -> &str {
    let Some(rest) = encoded.strip_prefix("data:image/") else {
        return encoded;
    };
    match rest.split_once(";base64,") {
        Some((subtype, payload))
            if !subtype.is_empty()
                && subtype
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            payload
        }
        _ => encoded,
    }
}

fn body_preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(LOG_BODY_PREVIEW_CHARS)
        .collect()
}

fn log_failure(status: StatusCode, headers: &HeaderMap, body: &[u8]) {
    error!(
        "Generation API failure: status={} headers={:?} body={}",
        status,
        headers,
        body_preview(body)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debug_output_hides_the_api_key() {
        let client = GenerationClient::new(
            "sk-very-secret",
            "https://generate.example.org/v2",
            GenerationConfig::default(),
        )
        .expect("client");
        let printed = format!("{client:?}");
        assert!(!printed.contains("sk-very-secret"), "{printed}");
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("https://generate.example.org/v2"));
    }

    #[test]
    fn nested_field_wins_over_top_level() {
        let body = json!({"data": {"base64": "bmVzdGVk"}, "image": "dG9w"});
        let payload = ImagePayload::parse(&body).expect("payload");
        assert_eq!(payload, ImagePayload::Nested("bmVzdGVk"));
        assert_eq!(payload.decode().expect("decode"), b"nested");
    }

    #[test]
    fn falls_back_to_top_level_image() {
        let body = json!({"image": "dG9w", "finish_reason": "SUCCESS"});
        assert_eq!(
            ImagePayload::parse(&body).expect("payload"),
            ImagePayload::TopLevel("dG9w")
        );

        // empty nested field does not count
        let body = json!({"data": {"base64": ""}, "image": "dG9w"});
        assert_eq!(
            ImagePayload::parse(&body).expect("payload"),
            ImagePayload::TopLevel("dG9w")
        );
    }

    #[test]
    fn missing_image_data() {
        for body in [
            json!({}),
            json!({"data": {}}),
            json!({"data": {"base64": null}, "image": 42}),
        ] {
            let err = ImagePayload::parse(&body).expect_err("no image data");
            assert_eq!(err.to_string(), "No image data in response");
        }
    }

    #[test]
    fn non_object_bodies_are_invalid() {
        for body in [json!("aGVsbG8="), json!([1, 2]), json!(null)] {
            let err = ImagePayload::parse(&body).expect_err("not an object");
            assert_eq!(err.to_string(), "Invalid response format");
        }
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        let body = json!({"image": "data:image/png;base64,aGVsbG8="});
        let decoded = ImagePayload::parse(&body)
            .expect("payload")
            .decode()
            .expect("decode");
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn only_image_data_uris_are_stripped() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(
            strip_data_uri("data:text/plain;base64,AAAA"),
            "data:text/plain;base64,AAAA"
        );
        assert_eq!(
            strip_data_uri("data:image/svg+xml;base64,AAAA"),
            "data:image/svg+xml;base64,AAAA"
        );
        assert_eq!(strip_data_uri("AAAA"), "AAAA");
    }

    #[test]
    fn invalid_base64_is_a_format_error() {
        let body = json!({"image": "***not base64***"});
        let err = ImagePayload::parse(&body)
            .expect("payload")
            .decode()
            .expect_err("bad base64");
        assert!(matches!(err, RelayError::ResponseFormat(_)));
    }

    #[test]
    fn rejects_bad_api_url() {
        assert!(GenerationClient::new("key", "not a url", GenerationConfig::default()).is_err());
        let client = GenerationClient::new(
            "",
            "https://upstream.example.org/generate",
            GenerationConfig::default(),
        )
        .expect("client without key");
        assert_eq!(client.defaults(), &GenerationConfig::default());
    }

    #[test]
    fn previews_are_truncated() {
        let body = "x".repeat(LOG_BODY_PREVIEW_CHARS * 2);
        assert_eq!(body_preview(body.as_bytes()).len(), LOG_BODY_PREVIEW_CHARS);
    }
}
