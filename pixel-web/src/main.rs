mod handlers;
mod state;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use pixel_core::config::MAX_UPLOAD_BYTES;
use std::env;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

/// Room above the upload limit so slightly oversized files reach validation
/// and get a proper error instead of a bare body-limit rejection.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/api/images",
            get(handlers::list_images)
                .post(handlers::upload_image)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize + BODY_LIMIT_SLACK)),
        )
        .route("/api/images/refresh", post(handlers::refresh))
        .route(
            "/api/images/:id",
            patch(handlers::update_image).delete(handlers::delete_image),
        )
        .route("/api/images/:id/like", post(handlers::toggle_like))
        .route("/api/stats", get(handlers::stats))
        .route("/api/albums", get(handlers::list_albums).post(handlers::create_album))
        .route("/api/albums/:album_id/images/:id", put(handlers::add_to_album))
        .route("/api/storage", get(handlers::list_storage))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixel_web=info,pixel_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get configuration from environment
    let bucket = env::var("PIXEL_BUCKET").ok().filter(|b| !b.is_empty());
    let snapshot = env::var("PIXEL_SNAPSHOT").ok().filter(|s| !s.is_empty());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

    // Create app state
    let state = AppState::new(bucket, snapshot).await?;

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Pixel gallery server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use chrono::Utc;
    use pixel_core::{Gallery, Gateway, GatewayConfig, MemoryStore};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn setup() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert("images/1700000000000_sunset.jpg", vec![0; 10], "image/jpeg", Utc::now())
            .await;
        let gateway = Gateway::new(store.clone(), GatewayConfig::new("test-bucket"));
        (store, AppState::from_gallery(Gallery::new(gateway)))
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn empty(method: Method, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_then_view() {
        let (_store, state) = setup().await;

        let (status, body) = send(&state, empty(Method::POST, "/api/images/refresh")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "added": 1, "total": 1 }));

        let (_, body) = send(&state, empty(Method::POST, "/api/images/refresh")).await;
        assert_eq!(body["added"], 0);

        let (status, body) = send(&state, empty(Method::GET, "/api/images?filter=All&q=SUN")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "sunset");

        let (_, body) = send(&state, empty(Method::GET, "/api/images?filter=Tech")).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_filter_is_bad_request() {
        let (_store, state) = setup().await;
        let (status, body) = send(&state, empty(Method::GET, "/api/images?filter=Food")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Food"));
    }

    #[tokio::test]
    async fn test_upload_adds_record() {
        let (store, state) = setup().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/images?filename=cat.png")
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(vec![1u8; 2048]))
            .unwrap();
        let (status, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "cat");
        assert_eq!(body["format"], "png");
        assert_eq!(store.len().await, 2);
        assert_eq!(state.gallery.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_uploads_map_to_client_errors() {
        let (store, state) = setup().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/images?filename=notes.txt")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/images?filename=big.png")
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(vec![0u8; 11_000_000]))
            .unwrap();
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        assert_eq!(store.len().await, 1);
        assert!(state.gallery.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_patch_like_and_delete() {
        let (store, state) = setup().await;
        send(&state, empty(Method::POST, "/api/images/refresh")).await;
        let id = "1700000000000_sunset.jpg";

        let (status, body) = send(
            &state,
            json_request(
                Method::PATCH,
                &format!("/api/images/{id}"),
                json!({ "title": "Golden", "category": "Nature", "tags": ["beach"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Golden");
        assert_eq!(body["category"], "Nature");

        let (_, body) = send(&state, empty(Method::POST, &format!("/api/images/{id}/like"))).await;
        assert_eq!(body["liked"], true);

        let (_, body) = send(&state, empty(Method::GET, "/api/stats")).await;
        assert_eq!(body["favorites"], 1);

        let (status, _) = send(&state, empty(Method::DELETE, &format!("/api/images/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(store.is_empty().await);

        let (status, _) = send(&state, empty(Method::DELETE, &format!("/api/images/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&state, empty(Method::POST, &format!("/api/images/{id}/like"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_missing_image_is_not_found() {
        let (_store, state) = setup().await;
        let (status, _) = send(
            &state,
            json_request(Method::PATCH, "/api/images/nope", json!({ "liked": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_albums() {
        let (_store, state) = setup().await;
        send(&state, empty(Method::POST, "/api/images/refresh")).await;

        let (status, album) = send(
            &state,
            json_request(Method::POST, "/api/albums", json!({ "name": "Trips" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let album_id = album["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            empty(
                Method::PUT,
                &format!("/api/albums/{album_id}/images/1700000000000_sunset.jpg"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, albums) = send(&state, empty(Method::GET, "/api/albums")).await;
        assert_eq!(albums[0]["image_count"], 1);

        let (_, images) = send(&state, empty(Method::GET, &format!("/api/images?album={album_id}"))).await;
        assert_eq!(images.as_array().unwrap().len(), 1);

        let (status, _) = send(
            &state,
            json_request(Method::POST, "/api/albums", json!({ "name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_listing_is_bad_gateway() {
        let (store, state) = setup().await;
        store.fail_lists(true);

        let (status, body) = send(&state, empty(Method::POST, "/api/images/refresh")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());
        assert!(state.gallery.lock().await.is_empty());
    }
}
