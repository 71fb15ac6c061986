//! Helpers shared by the unit tests.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Multipart, Path};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::Mutex;

/// Encodes a gradient of the given size as PNG.
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .expect("encode test png");
    output
}

/// Base64 of the image the mock generation service hands back.
pub(crate) fn generated_png_base64() -> String {
    general_purpose::STANDARD.encode(test_png(8, 8))
}

/// Redirects `hops` times in total before landing on `/cat.png`.
async fn redirect_chain(Path(hops): Path<u32>) -> Response {
    let next = match hops {
        0 => return ([(CONTENT_TYPE, "image/png")], test_png(64, 48)).into_response(),
        1 => "/cat.png".to_string(),
        hops => format!("/redirect/{}", hops - 1),
    };
    Redirect::temporary(&next).into_response()
}

/// Multipart fields received by the mock generation service.
pub(crate) type ReceivedFields = Arc<Mutex<Vec<(String, String)>>>;

/// A local stand-in for both the source image host and the generation API.
pub(crate) struct MockServer {
    pub(crate) base_url: String,
    pub(crate) received: ReceivedFields,
}

impl MockServer {
    /// Starts a server whose `/generate` route replies with `status` and `body`.
    ///
    /// Also serves `/cat.png` (a PNG), `/notes.txt` (not an image),
    /// `/redirect/{hops}` (reaches `/cat.png` after that many redirects) and
    /// `/slow.png` (answers after five seconds).
    pub(crate) async fn start(status: StatusCode, body: serde_json::Value) -> Self {
        let received: ReceivedFields = Arc::new(Mutex::new(Vec::new()));
        let recorder = received.clone();

        let app = Router::new()
            .route(
                "/cat.png",
                get(|| async { ([(CONTENT_TYPE, "image/png")], test_png(64, 48)) }),
            )
            .route("/notes.txt", get(|| async { "definitely not an image" }))
            .route("/redirect/{hops}", get(redirect_chain))
            .route(
                "/slow.png",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    ([(CONTENT_TYPE, "image/png")], test_png(4, 4))
                }),
            )
            .route(
                "/generate",
                post(move |mut multipart: Multipart| {
                    let recorder = recorder.clone();
                    let body = body.clone();
                    async move {
                        while let Ok(Some(field)) = multipart.next_field().await {
                            let name = field.name().unwrap_or_default().to_string();
                            let value = if name == "image" {
                                let bytes = field.bytes().await.unwrap_or_default();
                                format!("{} bytes", bytes.len())
                            } else {
                                field.text().await.unwrap_or_default()
                            };
                            recorder.lock().await.push((name, value));
                        }
                        (status, axum::Json(body))
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            received,
        }
    }

    /// URL of a route on this server.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Value of a form field the generation route received.
    pub(crate) async fn field(&self, name: &str) -> Option<String> {
        self.received
            .lock()
            .await
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
    }
}
