use std::num::NonZeroU16;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::error::RelayError;
use crate::models::{GenerationRequest, ImageResponse, ReturnType};
use crate::relay::Relay;

mod images;

use images::image_handler;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    relay: Arc<Relay>,
}

impl AppState {
    fn new(relay: Relay) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImageResponse>, RelayError> {
    let request: GenerationRequest = serde_json::from_slice(&body)
        .map_err(|err| RelayError::Validation(format!("Invalid request body: {err}")))?;
    let image_url = request.image_url()?;
    if request.return_type() == Some(ReturnType::Base64) {
        debug!("base64 return type requested, answering with a URL");
    }

    let artifact = state
        .relay
        .generate(image_url, request.prompt.as_deref())
        .await?;
    Ok(Json(ImageResponse::success(artifact.public_url)))
}

fn create_router() -> Router<AppState> {
    let images = Router::new()
        .route("/api/images/{filename}", get(image_handler))
        .route("/images/{filename}", get(image_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::HEAD]),
        );

    Router::new()
        .route("/api/image", post(generate_handler))
        .merge(images)
}

/// Binds the listener and serves until the server stops.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    relay: Relay,
) -> Result<(), anyhow::Error> {
    info!(
        "Storing generated images in {}",
        relay.store().image_dir().display()
    );
    let app = create_router().with_state(AppState::new(relay));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}
