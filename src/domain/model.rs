use crate::utils::error::DonlyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ALLOWED_TOPICS: [&str; 9] = [
    "IRL", "Gaming", "Music", "ASMR", "Creative", "Esports", "18+", "Animals", "Other",
];

pub const DEFAULT_BACKGROUND_COLOR: &str = "#090909";
pub const DEFAULT_BUTTON_BACKGROUND_COLOR: &str = "#7272FD";
pub const DEFAULT_BUTTON_TEXT_COLOR: &str = "#FFFFFF";

// ----- 使用者 -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub telegram_id: String,
    pub polygon_wallet: String,
    pub name: String,
    pub topics: Vec<String>,
    pub banner: String,
    pub avatar: String,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
    pub button_background_color: String,
    pub button_text_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUserRequest {
    pub polygon_wallet: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub name: String,
    /// 由已驗證的 Telegram init data 填入，不接受客戶端傳值
    #[serde(skip)]
    pub telegram_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserResponse {
    pub streamer_uuid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub banner: String,
    pub name: String,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
    pub button_background_color: String,
    pub button_text_color: String,
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub banner: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    pub button_background_color: String,
    pub button_text_color: String,
    pub avatar: String,
    pub topics: Vec<String>,
    pub polygon_wallet: String,
}

// ----- 願望清單 -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WishStatus {
    /// 等待合約 WishAdded 事件確認
    Pending,
    Active,
    Complete,
    Deleted,
}

impl WishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Deleted => "deleted",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Complete | Self::Deleted)
    }
}

impl fmt::Display for WishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WishStatus {
    type Err = DonlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "complete" => Ok(Self::Complete),
            "deleted" => Ok(Self::Deleted),
            other => Err(DonlyError::validation(format!(
                "unknown wish status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wish {
    pub uuid: String,
    pub streamer_uuid: String,
    pub wish_url: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub image: String,
    pub pol_target: f64,
    pub pol_amount: f64,
    pub is_priority: bool,
    pub status: WishStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddWishRequest {
    pub wish_url: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub image: String,
    pub pol_target: f64,
    #[serde(default)]
    pub is_priority: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddWishResponse {
    pub wish_uuid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWishRequest {
    pub wish_uuid: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub is_priority: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishResponse {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wish_url: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image: String,
    pub pol_target: f64,
    pub pol_amount: f64,
    pub is_priority: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWishesResponse {
    pub wishes: Vec<WishResponse>,
}

// ----- 靜態檔案 -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Avatar,
    Banner,
    Background,
    Wish,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Banner => "banner",
            Self::Background => "background",
            Self::Wish => "wish",
        }
    }

    /// 最小尺寸（寬, 高），單位像素
    pub fn min_dimensions(&self) -> (u32, u32) {
        match self {
            Self::Avatar => (128, 128),
            Self::Banner => (800, 200),
            Self::Background => (800, 800),
            Self::Wish => (128, 128),
        }
    }

    pub fn is_square(&self) -> bool {
        matches!(self, Self::Avatar | Self::Wish)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = DonlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avatar" => Ok(Self::Avatar),
            "banner" => Ok(Self::Banner),
            "background" => Ok(Self::Background),
            "wish" => Ok(Self::Wish),
            _ => Err(DonlyError::validation("invalid file type")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticFile {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub uploader_uuid: String,
    pub created_at: DateTime<Utc>,
}

impl StaticFile {
    /// 物件儲存中的 key
    pub fn storage_key(&self) -> String {
        format!("{}/{}.jpg", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStaticResponse {
    pub uuid: String,
}

// ----- 捐款紀錄與事件 -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Donate,
    Withdraw,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donate => "donate",
            Self::Withdraw => "withdraw",
        }
    }
}

impl FromStr for HistoryKind {
    type Err = DonlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donate" => Ok(Self::Donate),
            "withdraw" => Ok(Self::Withdraw),
            other => Err(DonlyError::validation(format!(
                "unknown history type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: String,
    pub streamer_uuid: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub username: Option<String>,
    pub datetime: DateTime<Utc>,
    pub amount: f64,
    pub wish_uuid: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub datetime: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wish_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHistoryResponse {
    pub page: u32,
    pub history: Vec<HistoryItem>,
}

/// 推送給直播端的即時捐款事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationEvent {
    pub uuid: String,
    pub streamer_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_username: Option<String>,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wish_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub datetime: DateTime<Utc>,
}

// ----- 區塊鏈同步 -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainEvent {
    /// `<tx_hash>:<log_index>`
    pub id: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub event_type: String,
    pub user_uuid: String,
    pub wish_uuid: String,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wish_status_round_trip_through_str() {
        for status in [
            WishStatus::Pending,
            WishStatus::Active,
            WishStatus::Complete,
            WishStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<WishStatus>().unwrap(), status);
        }
        assert!("archived".parse::<WishStatus>().is_err());
    }

    #[test]
    fn test_file_kind_rules() {
        assert_eq!(FileKind::Banner.min_dimensions(), (800, 200));
        assert!(FileKind::Avatar.is_square());
        assert!(!FileKind::Background.is_square());
        assert!("video".parse::<FileKind>().is_err());
    }

    #[test]
    fn test_storage_key() {
        let file = StaticFile {
            id: "abc".into(),
            kind: FileKind::Wish,
            uploader_uuid: "u".into(),
            created_at: Utc::now(),
        };
        assert_eq!(file.storage_key(), "wish/abc.jpg");
    }

    #[test]
    fn test_register_request_ignores_client_telegram_id() {
        let req: RegisterUserRequest = serde_json::from_str(
            r#"{"polygon_wallet":"0x0","topics":["IRL"],"name":"n","telegram_id":"42"}"#,
        )
        .unwrap();
        assert!(req.telegram_id.is_empty());
    }
}
