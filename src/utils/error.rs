use thiserror::Error;

#[derive(Error, Debug)]
pub enum DonlyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Token error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} already exists")]
    AlreadyExists { entity: &'static str },

    #[error("JSON-RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Contract error: {message}")]
    ContractError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// 錯誤分類，決定 HTTP 狀態碼與 CLI 退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Permission,
    NotFound,
    Conflict,
    Configuration,
    Network,
    Blockchain,
    Storage,
    Internal,
}

impl DonlyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractError {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError { .. } => ErrorCategory::Validation,
            Self::Unauthorized { .. } | Self::TokenError(_) => ErrorCategory::Authentication,
            Self::Forbidden { .. } => ErrorCategory::Permission,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::HttpError(_) => ErrorCategory::Network,
            Self::RpcError { .. } | Self::ContractError { .. } => ErrorCategory::Blockchain,
            Self::IoError(_) | Self::DatabaseError(_) | Self::StorageError { .. } => {
                ErrorCategory::Storage
            }
            Self::SerializationError(_) | Self::ImageError(_) | Self::Internal { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => "Could not reach the remote node".to_string(),
            ErrorCategory::Blockchain => format!("Blockchain call failed: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the config file and the environment variables it references"
            }
            ErrorCategory::Network => "Make sure the RPC URL is reachable and the node is running",
            ErrorCategory::Blockchain => {
                "Check that the node has an unlocked account and enough funds for gas"
            }
            ErrorCategory::Storage => "Check file paths and permissions",
            ErrorCategory::Validation => "Fix the request payload and try again",
            ErrorCategory::Authentication => "Re-open the mini app to obtain fresh init data",
            ErrorCategory::Permission => "The resource belongs to another user",
            ErrorCategory::NotFound | ErrorCategory::Conflict => "Verify the identifiers used",
            ErrorCategory::Internal => "Retry; if the problem persists, inspect the logs",
        }
    }

    /// CLI 退出碼
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Validation => 2,
            ErrorCategory::Network | ErrorCategory::Blockchain => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DonlyError>;
