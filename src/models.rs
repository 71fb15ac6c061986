//! Request and response bodies for the generate endpoint.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// How the caller would like the generated image back.
///
/// Advisory only: the relay always answers with a URL.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    /// Inline base64 payload
    Base64,
    /// Public URL of the stored artifact
    #[default]
    Url,
}

/// Body of `POST /api/image`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Source image to restyle
    #[serde(default)]
    pub image_url: Option<String>,
    /// Advisory and taken as sent; see [`GenerationRequest::return_type`]
    #[serde(default, rename = "returnType")]
    pub raw_return_type: Option<serde_json::Value>,
    /// Optional fragment appended to the default prompt
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerationRequest {
    /// Returns the source image URL, rejecting missing or empty values.
    pub fn image_url(&self) -> Result<&str, RelayError> {
        self.image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RelayError::Validation("Image URL is required".to_string()))
    }

    /// The requested return type, if it is one the relay knows about.
    ///
    /// Any other value is ignored rather than rejected.
    pub fn return_type(&self) -> Option<ReturnType> {
        self.raw_return_type
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

/// Payload of a successful generation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImageData {
    /// Public URL of the stored artifact
    pub url: String,
}

/// Uniform envelope returned by the generate endpoint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    /// Mirrors the HTTP status
    pub code: u16,
    /// `success`, or the error message
    pub status_text: String,
    /// Only present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ImageData>,
}

impl ImageResponse {
    /// Envelope for a stored artifact.
    pub fn success(url: String) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            status_text: "success".to_string(),
            data: Some(ImageData { url }),
        }
    }

    /// Envelope for a failed request.
    pub fn failure(status: StatusCode, message: String) -> Self {
        Self {
            code: status.as_u16(),
            status_text: message,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_body() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{"imageUrl":"https://example.com/cat.jpg","returnType":"base64","prompt":"smiling"}"#,
        )
        .expect("parse request");
        assert_eq!(request.image_url().ok(), Some("https://example.com/cat.jpg"));
        assert_eq!(request.return_type(), Some(ReturnType::Base64));
        assert_eq!(request.prompt.as_deref(), Some("smiling"));
    }

    #[test]
    fn missing_or_empty_url_is_rejected() {
        let request: GenerationRequest = serde_json::from_str("{}").expect("parse request");
        assert!(matches!(request.image_url(), Err(RelayError::Validation(_))));

        let request: GenerationRequest =
            serde_json::from_str(r#"{"imageUrl":""}"#).expect("parse request");
        let err = request.image_url().expect_err("empty url");
        assert_eq!(err.to_string(), "Image URL is required");
    }

    #[test]
    fn unknown_return_types_are_ignored() {
        for body in [
            r#"{"imageUrl":"x","returnType":"gif"}"#,
            r#"{"imageUrl":"x","returnType":"URL"}"#,
            r#"{"imageUrl":"x","returnType":7}"#,
            r#"{"imageUrl":"x","returnType":null}"#,
        ] {
            let request: GenerationRequest = serde_json::from_str(body).expect("parse request");
            assert_eq!(request.return_type(), None, "{body}");
            assert_eq!(request.image_url().ok(), Some("x"));
        }

        let request: GenerationRequest =
            serde_json::from_str(r#"{"imageUrl":"x","returnType":"url"}"#).expect("parse request");
        assert_eq!(request.return_type(), Some(ReturnType::Url));
    }

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(ImageResponse::success(
            "https://relay.example.org/images/a.png".to_string(),
        ))
        .expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "code": 200,
                "statusText": "success",
                "data": { "url": "https://relay.example.org/images/a.png" }
            })
        );
    }
}
