use crate::utils::error::{DonlyError, ErrorCategory};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

impl DonlyError {
    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
            ErrorCategory::Permission => StatusCode::FORBIDDEN,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 回給客戶端的訊息，不含內部細節
    pub fn client_message(&self) -> String {
        match self {
            Self::ValidationError { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message } => message.clone(),
            Self::TokenError(_) => "invalid token".to_string(),
            Self::NotFound { .. } | Self::AlreadyExists { .. } => self.to_string(),
            _ => "internal error".to_string(),
        }
    }
}

impl IntoResponse for DonlyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("❌ Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

/// 把 JSON 解析失敗轉成 400
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, DonlyError> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| DonlyError::validation("invalid request"))
}
