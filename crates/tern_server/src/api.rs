use crate::ingest;
use crate::state::AppState;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use tern_core::prelude::*;
use tracing::error;

pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0
            .downcast_ref::<StoreError>()
            .map(|store_err| match store_err {
                StoreError::NotFound(name) => {
                    (StatusCode::NOT_FOUND, format!("Folder not found: {name}"))
                }
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Upload failed: {other}"),
                ),
            })
            .unwrap_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {}", self.0),
            ))
            .into_response()
    }
}

/// GET /
///
/// The bundled landing page doubles as the browser upload UI.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

/// GET /api/sync
///
/// Fresh manifest snapshot of every zone. A zone whose base directory
/// cannot be scanned reports an empty list rather than failing the request.
pub async fn manifest(State(state): State<AppState>) -> Json<Manifest> {
    let manifest = tokio::task::spawn_blocking(move || scan_manifest(&state))
        .await
        .unwrap_or_else(|e| {
            error!("manifest scan task failed: {e}");
            Manifest::default()
        });
    Json(manifest)
}

fn scan_manifest(state: &AppState) -> Manifest {
    let mut manifest = Manifest::new();
    for zone in state.zones.iter() {
        manifest.insert(zone.name.clone(), scan_zone(state, zone));
    }
    manifest
}

fn scan_zone(state: &AppState, zone: &Zone) -> Vec<FolderEntry> {
    let mut entries = Vec::new();
    let read_dir = match std::fs::read_dir(&zone.dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return entries,
        Err(e) => {
            error!("failed to scan zone {:?} at {:?}: {e}", zone.name, zone.dir);
            return entries;
        }
    };
    for dir_entry in read_dir.filter_map(Result::ok) {
        let path = dir_entry.path();
        if !path.is_dir() {
            continue;
        }
        entries.push(FolderEntry {
            name: dir_entry.file_name().to_string_lossy().into_owned(),
            md5: state.cache.folder_md5(&path),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// GET /download/{zone}/{folder}
///
/// Packs the asset folder and returns the archive; 404 when the zone or
/// folder does not exist. No partial/range support.
pub async fn download(
    State(state): State<AppState>,
    Path((zone_name, folder)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let Some(zone) = state.zone(&zone_name) else {
        return Err(StoreError::NotFound(folder).into());
    };
    if !is_plain_name(&folder) {
        return Err(StoreError::NotFound(folder).into());
    }
    let target = zone.dir.join(&folder);
    if !target.is_dir() {
        return Err(StoreError::NotFound(folder).into());
    }

    let archive = tokio::task::spawn_blocking(move || tern_archive::pack(&target))
        .await
        .map_err(anyhow::Error::from)??;

    Ok(([(header::CONTENT_TYPE, "application/gzip")], archive).into_response())
}

#[derive(serde::Deserialize)]
pub struct UploadParams {
    zone: Option<String>,
    name: Option<String>,
}

/// POST /upload?zone=..&name=..
///
/// Ingests the payload into exactly one asset folder. Missing parameters
/// fall back to defaults (first configured zone, `upload.tar.gz`) rather
/// than failing the request.
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let zone_name = params
        .zone
        .or_else(|| state.zones.first().map(|z| z.name.clone()))
        .unwrap_or_default();
    let Some(zone) = state.zone(&zone_name) else {
        return Err(StoreError::UnknownZone(zone_name).into());
    };
    let original_name = params.name.unwrap_or_else(|| "upload.tar.gz".to_string());
    let base_dir = zone.dir.clone();

    tokio::task::spawn_blocking(move || ingest::ingest(&base_dir, &original_name, &body))
        .await
        .map_err(anyhow::Error::from)??;

    Ok("Upload successful")
}

/// A folder name usable as a single path component.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names() {
        assert!(is_plain_name("2026-08-06_hero"));
        assert!(is_plain_name("hero model"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
    }
}
