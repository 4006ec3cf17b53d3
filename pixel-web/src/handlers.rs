use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use pixel_core::{
    Album, CategoryFilter, GalleryError, GalleryStats, ImagePatch, ImageRecord,
    StorageObjectDescriptor, UploadFile, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;

/// One failed call, one error body.
#[derive(Debug)]
pub enum ApiError {
    Gallery(GalleryError),
    BadRequest(String),
}

impl From<GalleryError> for ApiError {
    fn from(e: GalleryError) -> Self {
        Self::Gallery(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Gallery(e) => {
                let status = match e {
                    GalleryError::Validation(ValidationError::SizeExceeded { .. }) => {
                        StatusCode::PAYLOAD_TOO_LARGE
                    }
                    GalleryError::Validation(ValidationError::UnsupportedType(_)) => {
                        StatusCode::UNSUPPORTED_MEDIA_TYPE
                    }
                    GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
                    GalleryError::Transfer { .. } => StatusCode::BAD_GATEWAY,
                    GalleryError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        } else {
            tracing::warn!("Request rejected: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn image_not_found(id: &str) -> ApiError {
    GalleryError::NotFound(format!("image {id}")).into()
}

#[derive(Debug, Deserialize)]
pub struct ViewParams {
    filter: Option<String>,
    album: Option<String>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    filename: String,
}

#[derive(Debug, Deserialize)]
pub struct NewAlbum {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshSummary {
    added: usize,
    total: usize,
}

/// Index page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Filtered, searched view of the gallery
pub async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Result<Json<Vec<ImageRecord>>, ApiError> {
    let filter: CategoryFilter = params
        .filter
        .as_deref()
        .unwrap_or("All")
        .parse()
        .map_err(ApiError::BadRequest)?;
    let album = params.album.as_deref().filter(|album| !album.is_empty());
    let query = params.q.as_deref().unwrap_or("");

    let gallery = state.gallery.lock().await;
    Ok(Json(gallery.view(filter, album, query)))
}

/// Re-list the bucket and merge new objects. Runs under the gallery lock so
/// no delete can land between the listing and the merge.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshSummary>, ApiError> {
    let mut gallery = state.gallery.lock().await;
    let added = gallery.load().await?;

    Ok(Json(RefreshSummary {
        added,
        total: gallery.len(),
    }))
}

/// Upload the raw request body as an image
pub async fn upload_image(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ImageRecord>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    tracing::info!(
        "Upload request: filename={}, content_type={}, size={} bytes",
        params.filename,
        content_type,
        body.len()
    );

    let file = UploadFile::new(params.filename, content_type, body.to_vec());
    let record = state
        .gallery
        .lock()
        .await
        .upload(file, |percent| tracing::debug!("Upload progress: {:.0}%", percent))
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ImagePatch>,
) -> Result<Json<ImageRecord>, ApiError> {
    let mut gallery = state.gallery.lock().await;
    if !gallery.update(&id, &patch).await {
        return Err(image_not_found(&id));
    }

    gallery.get(&id).cloned().map(Json).ok_or_else(|| image_not_found(&id))
}

/// Delete the stored object and its record; already-deleted objects are fine
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.gallery.lock().await.delete(&id).await?.is_none() {
        tracing::debug!("Delete of unknown image {}", id);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let liked = state
        .gallery
        .lock()
        .await
        .toggle_like(&id)
        .await
        .ok_or_else(|| image_not_found(&id))?;

    Ok(Json(json!({ "id": id, "liked": liked })))
}

pub async fn stats(State(state): State<AppState>) -> Json<GalleryStats> {
    Json(state.gallery.lock().await.stats())
}

pub async fn list_albums(State(state): State<AppState>) -> Json<Vec<Album>> {
    Json(state.gallery.lock().await.albums().to_vec())
}

pub async fn create_album(
    State(state): State<AppState>,
    Json(new_album): Json<NewAlbum>,
) -> Result<(StatusCode, Json<Album>), ApiError> {
    let name = new_album.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Album name must not be empty".to_string()));
    }

    let album = state
        .gallery
        .lock()
        .await
        .create_album(name, new_album.description);

    Ok((StatusCode::CREATED, Json(album)))
}

pub async fn add_to_album(
    State(state): State<AppState>,
    Path((album_id, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.gallery.lock().await.add_to_album(&id, &album_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Raw bucket listing, bypassing the gallery
pub async fn list_storage(
    State(state): State<AppState>,
) -> Result<Json<Vec<StorageObjectDescriptor>>, ApiError> {
    Ok(Json(state.gateway.list().await?))
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Pixel Gallery</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            max-width: 1200px;
            margin: 40px auto;
            padding: 20px;
            color: #333;
        }
        h1 {
            font-size: 2.5rem;
            font-weight: 300;
        }
        .controls {
            display: flex;
            gap: 10px;
            margin-bottom: 20px;
        }
        .grid {
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(240px, 1fr));
            gap: 15px;
        }
        .card img {
            width: 100%;
            height: 200px;
            object-fit: cover;
            border-radius: 4px;
        }
        .card p {
            margin: 4px 0;
            font-size: 0.9rem;
        }
    </style>
</head>
<body>
    <h1>Pixel Gallery</h1>
    <div class="controls">
        <select id="filter">
            <option>All</option>
            <option>Nature</option>
            <option>Art</option>
            <option>Cyber</option>
            <option>Tech</option>
            <option>Abstract</option>
            <option>Uncategorized</option>
        </select>
        <input id="search" type="text" placeholder="Search titles and tags">
        <button id="refresh">Refresh</button>
    </div>
    <div class="grid" id="gallery"></div>

    <script>
        async function render() {
            const params = new URLSearchParams({
                filter: document.getElementById('filter').value,
                q: document.getElementById('search').value,
            });
            const images = await (await fetch(`/api/images?${params}`)).json();
            const grid = document.getElementById('gallery');
            grid.replaceChildren(...images.map((image) => {
                const card = document.createElement('div');
                card.className = 'card';
                const img = document.createElement('img');
                img.src = image.url;
                img.alt = image.title;
                img.loading = 'lazy';
                const caption = document.createElement('p');
                caption.textContent = `${image.liked ? '♥ ' : ''}${image.title} · ${image.category}`;
                card.append(img, caption);
                return card;
            }));
        }

        document.getElementById('filter').addEventListener('change', render);
        document.getElementById('search').addEventListener('input', render);
        document.getElementById('refresh').addEventListener('click', async () => {
            await fetch('/api/images/refresh', { method: 'POST' });
            render();
        });

        fetch('/api/images/refresh', { method: 'POST' }).finally(render);
    </script>
</body>
</html>"#;
