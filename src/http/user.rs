use super::auth::{session_cookie, AuthUser, TelegramAuth};
use super::error::json_body;
use super::AppState;
use crate::core::user_service::DEFAULT_PAGE_SIZE;
use crate::domain::model::{
    RegisterUserRequest, RegisterUserResponse, UpdateUserRequest, UserHistoryResponse,
    UserProfileResponse,
};
use crate::utils::error::{DonlyError, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct StreamerQuery {
    pub streamer_uuid: Option<String>,
}

impl StreamerQuery {
    pub fn required(self) -> Result<String> {
        self.streamer_uuid
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DonlyError::validation("missing streamer_uuid"))
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    TelegramAuth(tg): TelegramAuth,
    payload: std::result::Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let mut req = json_body(payload)?;
    req.telegram_id = tg.id.to_string();

    let streamer_uuid = state.users.register(req).await?;
    let token = state.jwt.generate_token(&streamer_uuid, state.session_ttl_secs)?;
    info!("🆕 Streamer {} registered (telegram {})", streamer_uuid, tg.id);

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, state.session_ttl_secs))],
        Json(RegisterUserResponse { streamer_uuid }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    TelegramAuth(tg): TelegramAuth,
) -> Result<impl IntoResponse> {
    let user = state
        .users
        .get_by_telegram_id(&tg.id.to_string())
        .await
        .map_err(|e| match e {
            DonlyError::NotFound { .. } => DonlyError::unauthorized("user not found"),
            other => other,
        })?;
    let token = state.jwt.generate_token(&user.uuid, state.session_ttl_secs)?;

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, session_cookie(&token, state.session_ttl_secs))],
    ))
}

pub async fn me(AuthUser(uuid): AuthUser) -> Json<serde_json::Value> {
    Json(json!({ "streamer_uuid": uuid }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(uuid): AuthUser,
    payload: std::result::Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let req = json_body(payload)?;
    state.users.update_profile(&uuid, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Query(query): Query<StreamerQuery>,
) -> Result<Json<UserProfileResponse>> {
    let streamer_uuid = query.required()?;
    Ok(Json(state.users.get_profile(&streamer_uuid).await?))
}

pub async fn get_history(
    State(state): State<AppState>,
    AuthUser(uuid): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserHistoryResponse>> {
    let page = query
        .page
        .and_then(|p| p.parse::<i64>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1);
    let history = state
        .users
        .get_history(&uuid, page, i64::from(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(Json(history))
}
