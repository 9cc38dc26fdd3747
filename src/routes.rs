use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::library::{
    DeleteResponse, MediaLibrary, NameCheck, UploadRequest, UploadResponse, UsageReport,
};
use crate::store::StoredFile;

#[derive(Clone)]
pub struct AppState {
    pub library: MediaLibrary,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(library: MediaLibrary, admin_token: Option<String>) -> Self {
        Self {
            library,
            admin_token: admin_token.map(Arc::from),
        }
    }
}

#[derive(Deserialize)]
pub struct CheckQuery {
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct SeoRequest {
    url: String,
}

#[derive(Serialize)]
pub struct SeoResponse {
    url: String,
}

/// Credentials of an `Authorization: Bearer <token>` header. The scheme name
/// is matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

/// Compares without short-circuiting on the first differing byte.
fn token_matches(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, MediaError> {
    if let Some(expected) = state.admin_token.as_deref() {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .is_some_and(|token| token_matches(token, expected));
        if !authorized {
            return Err(MediaError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> MediaError {
    MediaError::BadRequest(format!("invalid multipart body: {err}"))
}

pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> MediaResult<Json<UploadResponse>> {
    let mut request = UploadRequest::default();
    let mut saw_image = false;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                request.content_type = field.content_type().map(str::to_string);
                request.file_name = field.file_name().map(str::to_string);
                request.bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                saw_image = true;
            }
            Some("baseName") => {
                request.base_name = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("overwrite") => {
                request.overwrite = field.text().await.map_err(multipart_error)?.trim() == "true";
            }
            _ => {}
        }
    }
    if !saw_image {
        return Err(MediaError::BadRequest("No file uploaded".to_string()));
    }
    Ok(Json(state.library.upload(request).await?))
}

pub async fn check_upload_name(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> MediaResult<Json<NameCheck>> {
    Ok(Json(state.library.check_name(query.name.as_deref()).await?))
}

pub async fn list_files(State(state): State<AppState>) -> MediaResult<Json<Vec<StoredFile>>> {
    Ok(Json(state.library.list_files().await?))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> MediaResult<Json<DeleteResponse>> {
    Ok(Json(state.library.delete_file(&name).await?))
}

pub async fn media_usage(State(state): State<AppState>) -> MediaResult<Json<UsageReport>> {
    Ok(Json(state.library.usage().await?))
}

pub async fn seo_image(
    State(state): State<AppState>,
    Json(body): Json<SeoRequest>,
) -> MediaResult<Json<SeoResponse>> {
    let url = state.library.ensure_seo_image(&body.url).await?;
    Ok(Json(SeoResponse { url }))
}

pub async fn health() -> &'static str {
    "ok"
}

/// Full application router: admin API under `api_root`, stored files under
/// `public_prefix`, `/health` unauthenticated.
pub fn router(state: AppState, config: &MediaConfig) -> Router {
    let admin = Router::new()
        .route(
            "/admin/upload",
            post(upload_image).layer(DefaultBodyLimit::max(config.upload_limit_bytes)),
        )
        .route("/admin/upload/check", get(check_upload_name))
        .route("/admin/files", get(list_files))
        .route("/admin/files/{name}", delete(delete_file))
        .route("/admin/media/usage", get(media_usage))
        .route("/admin/media/seo", post(seo_image))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api = if config.api_root.is_empty() {
        admin
    } else {
        Router::new().nest(&config.api_root, admin)
    };

    let files = ServeDir::new(state.library.store().base_dir());
    let app = Router::new().route("/health", get(health)).merge(api);
    let app = if config.public_prefix.is_empty() {
        app.fallback_service(files)
    } else {
        app.nest_service(&config.public_prefix, files)
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
