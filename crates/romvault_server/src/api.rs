use crate::auth::AuthenticatedUser;
use crate::state::AppState;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use romvault_core::prelude::*;
use romvault_library::{
    AssetDownload, BiosUpload, DownloadReference, RomUpload, SaveRequest, VersionUpload,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// A request the handlers could not make sense of.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BadRequest(pub String);

pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    message: String,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        if let Some(err) = self.0.downcast_ref::<AssetError>() {
            let status = match err {
                AssetError::NotFound(_) => StatusCode::NOT_FOUND,
                AssetError::UnsupportedSystem(_)
                | AssetError::InvalidSlot(_)
                | AssetError::InvalidFileName(_) => StatusCode::BAD_REQUEST,
                AssetError::DuplicateAsset(_) => StatusCode::CONFLICT,
                AssetError::AccessDenied => StatusCode::FORBIDDEN,
                AssetError::StorageUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                AssetError::StorageCleanupFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return (status, err.kind(), err.to_string());
        }
        if let Some(err) = self.0.downcast_ref::<AuthError>() {
            return match err {
                AuthError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", err.to_string()),
                _ => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            };
        }
        if let Some(err) = self.0.downcast_ref::<BadRequest>() {
            return (StatusCode::BAD_REQUEST, "invalid_request", err.to_string());
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal Server Error".to_string(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        if status.is_server_error() {
            error!(kind, error = ?self.0, "request failed");
        }
        (status, Json(ErrorBody { kind, message })).into_response()
    }
}

fn check_scope(user: &User, required: &str) -> Result<(), ApiError> {
    if user.has_scope(required) {
        Ok(())
    } else {
        Err(ApiError::from(AuthError::Forbidden(format!(
            "Missing permission: '{}' scope required.",
            required
        ))))
    }
}

fn stream_response(download: AssetDownload, content_type: &'static str) -> Response {
    let mut response = Body::from_stream(download.stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.size));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace('"', "")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(md5) = download.md5.and_then(|m| HeaderValue::from_str(&format!("\"{m}\"")).ok()) {
        headers.insert(header::ETAG, md5);
    }
    response
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAsset<T> {
    #[serde(flatten)]
    pub record: T,
    pub public_url: Option<String>,
}

/// GET /games
pub async fn list_games<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let games = state
        .library
        .assets
        .records()
        .store()
        .game_summaries()
        .await
        .map_err(AssetError::from)?;
    Ok(Json(games))
}

/// POST /games?system=..&fileName=..
/// Raw ROM bytes in the body.
pub async fn upload_rom<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(upload): Query<RomUpload>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    let game = state.library.assets.create_rom(body, upload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// GET /games/{id}
pub async fn get_game<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let game = state.library.assets.records().game(id).await?;
    let public_url = game
        .cover_path
        .as_deref()
        .and_then(|key| state.library.assets.public_url(key));
    Ok(Json(PublicAsset {
        record: game,
        public_url,
    }))
}

/// PATCH /games/{id}
pub async fn update_game<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
    Json(update): Json<GameUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    Ok(Json(state.library.assets.update_game(id, update).await?))
}

/// DELETE /games/{id}
pub async fn delete_game<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    state.library.assets.delete(AssetRef::Game(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /games/{id}/rom
pub async fn stream_game_rom<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let download = state.library.assets.open(AssetRef::Game(id)).await?;
    Ok(stream_response(download, "application/octet-stream"))
}

/// GET /games/{id}/download
/// Where to fetch the ROM that should be played: the preferred version, or
/// the primary ROM.
pub async fn game_download_reference<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<Json<DownloadReference>, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(state.library.versions.download_reference(id).await?))
}

/// PUT /games/{id}/cover
pub async fn upload_cover<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    let game = state.library.assets.set_cover(id, body).await?;
    let public_url = game
        .cover_path
        .as_deref()
        .and_then(|key| state.library.assets.public_url(key));
    Ok(Json(PublicAsset {
        record: game,
        public_url,
    }))
}

/// GET /games/{id}/screenshots
pub async fn list_screenshots<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let assets = &state.library.assets;
    assets.records().game(id).await?;
    let shots = assets
        .records()
        .store()
        .screenshots(id)
        .await
        .map_err(AssetError::from)?
        .into_iter()
        .map(|shot| PublicAsset {
            public_url: assets.public_url(&shot.path),
            record: shot,
        })
        .collect::<Vec<_>>();
    Ok(Json(shots))
}

/// POST /games/{id}/screenshots
pub async fn upload_screenshot<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    let shot = state.library.assets.add_screenshot(id, body).await?;
    let public_url = state.library.assets.public_url(&shot.path);
    Ok((
        StatusCode::CREATED,
        Json(PublicAsset {
            record: shot,
            public_url,
        }),
    ))
}

/// GET /games/{id}/versions
pub async fn list_versions<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(state.library.versions.list_versions(id).await?))
}

/// POST /games/{id}/versions?region=..&revision=..&preferred=..
pub async fn upload_version<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
    Query(upload): Query<VersionUpload>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    let version = state.library.versions.create_version(id, body, upload).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// PUT /games/{id}/versions/{version_id}/preferred
pub async fn set_preferred_version<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((game_id, version_id)): Path<(RecordId, RecordId)>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    Ok(Json(
        state
            .library
            .versions
            .set_preferred(game_id, version_id)
            .await?,
    ))
}

/// DELETE /versions/{id}
pub async fn delete_version<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    state.library.versions.delete_version(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /versions/{id}/rom
pub async fn stream_version_rom<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let download = state.library.assets.open(AssetRef::Version(id)).await?;
    Ok(stream_response(download, "application/octet-stream"))
}

/// GET /versions/{id}/download
pub async fn version_download_reference<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<Json<DownloadReference>, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(
        state
            .library
            .assets
            .download_reference(AssetRef::Version(id))
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct BiosQuery {
    system: Option<String>,
}

/// GET /bios?system=..
pub async fn list_bios<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<BiosQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let files = state
        .library
        .assets
        .records()
        .store()
        .bios_files(query.system.as_deref().map(str::to_lowercase).as_deref())
        .await
        .map_err(AssetError::from)?;
    Ok(Json(files))
}

/// POST /bios?system=..&fileName=..&required=..
pub async fn upload_bios<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(upload): Query<BiosUpload>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    let bios = state.library.assets.create_bios(body, upload).await?;
    Ok((StatusCode::CREATED, Json(bios)))
}

/// GET /bios/{id}/download
/// Streams the BIOS. This is the proxy route handed out by download references.
pub async fn stream_bios<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let download = state.library.assets.open(AssetRef::Bios(id)).await?;
    Ok(stream_response(download, "application/octet-stream"))
}

/// GET /bios/{id}/reference
pub async fn bios_download_reference<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<Json<DownloadReference>, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(
        state
            .library
            .assets
            .download_reference(AssetRef::Bios(id))
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    md5: String,
}

/// POST /bios/{id}/verify
pub async fn verify_bios<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    Ok(Json(state.library.assets.verify_bios(id, &req.md5).await?))
}

/// DELETE /bios/{id}
pub async fn delete_bios<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    state.library.assets.delete(AssetRef::Bios(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /systems/{system}/bios
pub async fn bios_status<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(system): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(state.library.assets.bios_status(&system).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveQuery {
    game_id: Option<RecordId>,
}

/// GET /save-states?gameId=..
pub async fn list_saves<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<SaveQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(state.library.saves.list(&user.id, query.game_id).await?))
}

/// POST /save-states
/// Multipart fields: `gameId`, `slot`, `state`, and optionally `screenshot`
/// and `description`.
pub async fn upload_save<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;

    let mut game_id = None;
    let mut slot = None;
    let mut state_bytes = None;
    let mut screenshot = None;
    let mut description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| BadRequest(e.body_text()))?;
        match name.as_str() {
            "gameId" => game_id = Some(parse_number::<RecordId>("gameId", &data)?),
            "slot" => slot = Some(parse_number::<i64>("slot", &data)?),
            "state" => state_bytes = Some(data),
            "screenshot" => screenshot = Some(data).filter(|d| !d.is_empty()),
            "description" => {
                description = Some(String::from_utf8_lossy(&data).into_owned())
                    .filter(|d| !d.trim().is_empty())
            }
            _ => {}
        }
    }

    let request = SaveRequest {
        user_id: user.id,
        game_id: game_id.ok_or_else(|| BadRequest("missing field gameId".into()))?,
        slot: slot.ok_or_else(|| BadRequest("missing field slot".into()))?,
        state: state_bytes.ok_or_else(|| BadRequest("missing field state".into()))?,
        screenshot,
        description,
    };
    let save = state.library.saves.create_or_update(request).await?;
    Ok(Json(save))
}

fn parse_number<T: std::str::FromStr>(field: &str, data: &[u8]) -> Result<T, BadRequest> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| BadRequest(format!("field {field} must be a number")))
}

/// GET /save-states/{id}/download
pub async fn stream_save<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let (_, download) = state.library.saves.load(id, &user.id).await?;
    Ok(stream_response(download, "application/octet-stream"))
}

/// GET /save-states/{id}/screenshot
pub async fn stream_save_screenshot<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    let download = state.library.saves.load_screenshot(id, &user.id).await?;
    Ok(stream_response(download, "image/png"))
}

/// DELETE /save-states/{id}
pub async fn delete_save<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "write")?;
    state.library.saves.delete(id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /duplicates
pub async fn duplicates<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "read")?;
    Ok(Json(state.library.duplicates.find_duplicates().await?))
}

#[derive(Deserialize)]
pub struct OrphanQuery {
    #[serde(default)]
    prefix: String,
}

/// GET /orphans?prefix=..
pub async fn orphans<S: StorageBackend, R: RecordStore, A: AuthProvider>(
    State(state): State<AppState<S, R, A>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<OrphanQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_scope(&user, "admin")?;
    Ok(Json(state.library.assets.find_orphans(&query.prefix).await?))
}
