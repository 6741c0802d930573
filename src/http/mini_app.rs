use super::auth::AuthUser;
use super::error::json_body;
use super::AppState;
use crate::domain::model::UserProfileResponse;
use crate::utils::error::{DonlyError, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct TelegramAuthRequest {
    pub init_data: String,
}

#[derive(Debug, Serialize)]
pub struct TelegramAuthResponse {
    pub token: String,
    pub user: MiniAppUser,
}

#[derive(Debug, Serialize)]
pub struct MiniAppUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub streamer_uuid: String,
    #[serde(flatten)]
    pub profile: UserProfileResponse,
}

/// mini app 以 init data 換取 session token，只接受已註冊的直播主
pub async fn authenticate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TelegramAuthRequest>, JsonRejection>,
) -> Result<Json<TelegramAuthResponse>> {
    let req = json_body(payload)?;
    let tg = state.verifier.verify(&req.init_data).map_err(|e| {
        warn!("Telegram validation failed: {}", e);
        DonlyError::unauthorized("invalid telegram data")
    })?;

    let user = state
        .users
        .get_by_telegram_id(&tg.id.to_string())
        .await
        .map_err(|e| match e {
            DonlyError::NotFound { .. } => DonlyError::unauthorized("user not found"),
            other => other,
        })?;
    let token = state.jwt.generate_token(&user.uuid, state.session_ttl_secs)?;

    Ok(Json(TelegramAuthResponse {
        token,
        user: MiniAppUser {
            id: tg.id,
            username: tg.username,
            first_name: tg.first_name,
            last_name: tg.last_name,
            status: "authenticated",
        },
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    AuthUser(uuid): AuthUser,
) -> Result<Json<ProfileResponse>> {
    let profile = state.users.get_profile(&uuid).await?;
    Ok(Json(ProfileResponse {
        streamer_uuid: uuid,
        profile,
    }))
}
