use crate::utils::error::{DonlyError, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_MAX_AGE_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Telegram Mini App init data 驗證器
#[derive(Clone)]
pub struct InitDataVerifier {
    bot_token: String,
    max_age_secs: i64,
}

impl InitDataVerifier {
    pub fn new(bot_token: impl Into<String>, max_age_secs: i64) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_age_secs,
        }
    }

    /// 驗證 `Authorization: tma <initData>`
    pub fn verify_header(&self, header: &str) -> Result<TelegramUser> {
        let raw = match header.split_once(' ') {
            Some(("tma", raw)) => raw,
            _ => {
                return Err(DonlyError::unauthorized(
                    "invalid authorization header format, expected 'tma <initData>'",
                ))
            }
        };
        self.verify(raw)
    }

    pub fn verify(&self, init_data: &str) -> Result<TelegramUser> {
        self.verify_at(init_data, Utc::now().timestamp())
    }

    pub fn verify_at(&self, init_data: &str, now: i64) -> Result<TelegramUser> {
        if init_data.is_empty() {
            return Err(DonlyError::unauthorized("empty init data"));
        }

        // 同一個 key 只取第一個值
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in form_urlencoded::parse(init_data.as_bytes()) {
            values
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        let hash = values
            .remove("hash")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DonlyError::unauthorized("hash is missing in init data"))?;

        if !verify_signature(&data_check_string(&values), &hash, &self.bot_token)? {
            return Err(DonlyError::unauthorized("invalid signature"));
        }

        self.check_auth_date(values.get("auth_date").map(String::as_str), now)?;
        parse_user(values.get("user").map(String::as_str))
    }

    fn check_auth_date(&self, raw: Option<&str>, now: i64) -> Result<()> {
        let raw = raw
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DonlyError::unauthorized("auth_date is missing"))?;
        let auth_date: i64 = raw
            .parse()
            .map_err(|e| DonlyError::unauthorized(format!("invalid auth_date format: {}", e)))?;
        if now - auth_date > self.max_age_secs {
            return Err(DonlyError::unauthorized(format!(
                "init data is too old (max age: {}s)",
                self.max_age_secs
            )));
        }
        Ok(())
    }
}

fn parse_user(raw: Option<&str>) -> Result<TelegramUser> {
    let raw = raw
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DonlyError::unauthorized("user data is missing"))?;
    let user: TelegramUser = serde_json::from_str(raw)
        .map_err(|e| DonlyError::unauthorized(format!("failed to parse user data: {}", e)))?;
    if user.id == 0 {
        return Err(DonlyError::unauthorized("user ID is missing or invalid"));
    }
    if user.first_name.is_empty() {
        return Err(DonlyError::unauthorized("user first name is missing"));
    }
    Ok(user)
}

/// 依 key 排序的 `key=value`，以換行串接
pub fn data_check_string(values: &BTreeMap<String, String>) -> String {
    values
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn new_mac(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key).map_err(|e| DonlyError::internal(format!("hmac key: {}", e)))
}

/// secret = HMAC-SHA256(key = "WebAppData", message = bot token)
fn signing_mac(bot_token: &str) -> Result<HmacSha256> {
    let mut secret = new_mac(b"WebAppData")?;
    secret.update(bot_token.as_bytes());
    new_mac(&secret.finalize().into_bytes())
}

fn verify_signature(check_string: &str, hash: &str, bot_token: &str) -> Result<bool> {
    let Ok(expected) = hex::decode(hash) else {
        return Ok(false);
    };
    let mut mac = signing_mac(bot_token)?;
    mac.update(check_string.as_bytes());
    Ok(mac.verify_slice(&expected).is_ok())
}

/// 產生帶簽章的 init data 查詢字串
pub fn sign_init_data(pairs: &[(&str, &str)], bot_token: &str) -> Result<String> {
    let values: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut mac = signing_mac(bot_token)?;
    mac.update(data_check_string(&values).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &values {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    Ok(serializer.finish())
}
