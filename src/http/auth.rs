use super::AppState;
use crate::auth::TelegramUser;
use crate::utils::error::DonlyError;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub const SESSION_COOKIE: &str = "jwt";

/// 已通過 JWT 驗證的直播主 uuid
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = DonlyError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| DonlyError::unauthorized("missing token"))?;
        let uuid = state
            .jwt
            .parse_token(&token)
            .map_err(|_| DonlyError::unauthorized("invalid token"))?;
        Ok(AuthUser(uuid))
    }
}

/// `Authorization: tma <initData>` 驗證後的 Telegram 使用者
#[derive(Debug, Clone)]
pub struct TelegramAuth(pub TelegramUser);

impl FromRequestParts<AppState> for TelegramAuth {
    type Rejection = DonlyError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        state
            .verifier
            .verify_header(header)
            .map(TelegramAuth)
            .map_err(|e| {
                DonlyError::unauthorized(format!("invalid telegram auth: {}", e.client_message()))
            })
    }
}

/// 先看 Authorization（`Bearer` 前綴可省略），沒有再找 `jwt` cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string());
    if from_header.is_some() {
        return from_header;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, ttl_secs: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, ttl_secs
    )
}
