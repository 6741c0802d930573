use super::auth::AuthUser;
use super::AppState;
use crate::domain::model::{FileKind, UploadStaticResponse};
use crate::utils::error::{DonlyError, Result};
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

/// multipart 上限比圖片上限多留 1 MiB 給欄位與邊界
pub const UPLOAD_BODY_LIMIT: usize = crate::core::static_service::MAX_UPLOAD_BYTES + 1024 * 1024;

pub async fn upload(
    State(state): State<AppState>,
    AuthUser(uuid): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadStaticResponse>> {
    let mut file: Option<Vec<u8>> = None;
    let mut kind: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => file = Some(field.bytes().await.map_err(multipart_error)?.to_vec()),
            Some("type") => kind = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let file = file.ok_or_else(|| DonlyError::validation("file is required"))?;
    let kind: FileKind = kind
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| DonlyError::validation("type is required"))?
        .trim()
        .parse()?;

    let id = state.statics.upload(&uuid, kind, file).await?;
    Ok(Json(UploadStaticResponse { uuid: id }))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> DonlyError {
    DonlyError::validation(format!("invalid multipart body: {}", err.body_text()))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    if id.trim().is_empty() {
        return Err(DonlyError::validation("missing file id"));
    }
    let object = state.statics.get_file(&id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        object.data,
    ))
}
