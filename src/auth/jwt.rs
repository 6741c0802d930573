use crate::utils::error::{DonlyError, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    uuid: String,
    iat: i64,
    exp: i64,
}

/// HS256 工作階段 token
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn generate_token(&self, uuid: &str, ttl_secs: u64) -> Result<String> {
        self.generate_token_at(uuid, ttl_secs, Utc::now().timestamp())
    }

    pub fn generate_token_at(&self, uuid: &str, ttl_secs: u64, issued_at: i64) -> Result<String> {
        let claims = Claims {
            uuid: uuid.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs as i64),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// 回傳 token 內的使用者 uuid
    pub fn parse_token(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            DonlyError::unauthorized("invalid token")
        })?;
        if data.claims.uuid.is_empty() {
            return Err(DonlyError::unauthorized("invalid token"));
        }
        Ok(data.claims.uuid)
    }
}
