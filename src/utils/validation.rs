use crate::utils::error::{DonlyError, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static POLYGON_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> DonlyError {
    DonlyError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 只接受 http(s)，RPC 節點與 S3 端點都走這裡
pub fn validate_url(field: &str, raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(invalid(field, raw, "URL cannot be empty"));
    }
    let url = Url::parse(raw).map_err(|e| invalid(field, raw, format!("Invalid URL format: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            raw,
            format!("Unsupported URL scheme: {}", url.scheme()),
        ));
    }
    Ok(())
}

pub fn validate_path(field: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        Err(invalid(field, path, "Path cannot be empty"))
    } else if path.contains('\0') {
        Err(invalid(field, path, "Path contains null bytes"))
    } else {
        Ok(())
    }
}

pub fn validate_positive_number(field: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(field, value, format!("Value must be at least {}", min_value)));
    }
    Ok(())
}

/// 必填的密鑰類設定，錯誤訊息不回顯內容
pub fn validate_secret(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DonlyError::MissingConfigError {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "Value cannot be blank"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(field, value, format!("Value must be between {} and {}", min, max)));
    }
    Ok(())
}

/// Polygon 地址與 Ethereum 相容：0x + 40 個十六進位字元
pub fn is_valid_polygon_address(address: &str) -> bool {
    POLYGON_ADDRESS.is_match(address)
}

pub fn is_valid_hex_color(color: &str) -> bool {
    HEX_COLOR.is_match(color)
}

/// 以字元數（非位元組）檢查長度上限
pub fn exceeds_chars(value: &str, max: usize) -> bool {
    value.chars().count() > max
}
