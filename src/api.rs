use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, MatchedPath, Path, State},
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing, Json, Router,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tracing::{info, info_span, warn};
use utoipa::{OpenApi, ToSchema};

use crate::{
    caption::CaptionClient,
    storage::{self, sanitize_name, AlbumStore},
    view,
};

pub const DEFAULT_ALBUM: &str = "default";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] storage::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Storage(storage::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Storage(storage::Error::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Error::Storage(storage::Error::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("request failed: {}", self);
        }
        (status, Html(view::error_page(status, &self.to_string()))).into_response()
    }
}

/// Everything a handler needs; cloned per request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: AlbumStore,
    pub captions: CaptionClient,
}

impl AppState {
    pub fn new(store: AlbumStore, captions: CaptionClient) -> Self {
        Self { store, captions }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        // Matched route with placeholders, not the concrete path.
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        info_span!(
            "http_request",
            method = ?request.method(),
            matched_path,
        )
    });
    let cors_layer = CorsLayer::new()
        .allow_headers(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any);
    let uploads = ServeDir::new(state.store.root());
    Router::new()
        .route("/", routing::get(list_albums))
        .route("/upload", routing::get(upload_form).post(upload))
        .route("/album/:album_name", routing::get(view_album))
        .route("/api-docs/openapi.json", routing::get(openapi))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer)
        .layer(trace_layer)
        .layer(CompressionLayer::new().gzip(true).deflate(true))
        .with_state(state)
}

/// Filename to caption, serialized as a flat JSON object.
#[derive(Serialize, ToSchema, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Captions(pub BTreeMap<String, String>);

#[derive(TryFromMultipart)]
pub struct UploadForm {
    #[form_data(limit = "unlimited")]
    pub images: Vec<FieldData<Bytes>>,
    pub album: Option<String>,
}

/// Multipart layout of an upload, for the OpenAPI document only.
#[derive(ToSchema)]
#[allow(dead_code)]
struct UploadRequest {
    #[schema(value_type = Vec<String>)]
    images: Vec<Vec<u8>>,
    /// Target album, `default` when left empty.
    album: Option<String>,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Album index page", content_type = "text/html", body = String),
        (status = 500, description = "Upload root unreadable", content_type = "text/html", body = String),
    )
)]
async fn list_albums(State(state): State<AppState>) -> Result<Html<String>> {
    let albums = state.store.list_albums().await?;
    Ok(Html(view::index(&albums)))
}

#[utoipa::path(
    get,
    path = "/upload",
    responses(
        (status = 200, description = "Upload form", content_type = "text/html", body = String),
    )
)]
async fn upload_form() -> Html<String> {
    Html(view::upload_form())
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadRequest, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Caption of every stored image", body = Captions),
        (status = 400, description = "Invalid album name or malformed form", body = String),
        (status = 500, description = "Album directory could not be created", body = String),
    )
)]
async fn upload(
    State(state): State<AppState>,
    TypedMultipart(form): TypedMultipart<UploadForm>,
) -> Result<Json<Captions>> {
    let files: Vec<(String, Bytes)> = form
        .images
        .into_iter()
        .filter_map(|field| {
            let name = field.metadata.file_name.filter(|name| !name.is_empty())?;
            Some((name, field.contents))
        })
        .collect();
    if files.is_empty() {
        return Ok(Json(Captions::default()));
    }

    let album = form
        .album
        .as_deref()
        .map(str::trim)
        .filter(|album| !album.is_empty())
        .unwrap_or(DEFAULT_ALBUM);
    let album = state.store.ensure_album(album).await?;

    let mut captions = BTreeMap::new();
    for (name, contents) in files {
        let path = match state.store.save_image(&album, &name, &contents).await {
            Ok(path) => path,
            Err(err) => {
                warn!(album = %album, file = %name, "skipping upload: {err}");
                continue;
            }
        };
        let caption = state.captions.caption(&path).await;
        captions.insert(name, caption);
    }
    info!(album = %album, count = captions.len(), "stored upload");
    Ok(Json(Captions(captions)))
}

#[utoipa::path(
    get,
    path = "/album/{album_name}",
    params(("album_name" = String, Path, description = "Album to show")),
    responses(
        (status = 200, description = "Images of the album with fresh captions", content_type = "text/html", body = String),
        (status = 404, description = "No such album", content_type = "text/html", body = String),
    )
)]
async fn view_album(
    State(state): State<AppState>,
    Path(album_name): Path<String>,
) -> Result<Html<String>> {
    let album = sanitize_name(&album_name)?;
    let dir = state.store.album_dir(&album)?;
    let images = state.store.list_images(&album).await?;
    let mut captions = BTreeMap::new();
    for image in images {
        // Listed names are already on disk; they are joined as-is.
        let caption = state.captions.caption(&dir.join(&image)).await;
        captions.insert(image, caption);
    }
    Ok(Html(view::album(&album, &captions)))
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_albums,
        upload_form,
        upload,
        view_album,
    ),
    components(schemas(Captions, UploadRequest)),
    tags(
        (name = "albums", description = "Image albums with generated captions")
    )
)]
struct ApiDoc;
