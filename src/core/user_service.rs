use crate::core::static_service::{check_file_ownership, image_url};
use crate::domain::model::{
    FileKind, HistoryItem, RegisterUserRequest, UpdateUserRequest, User, UserHistoryResponse,
    UserProfileResponse, ALLOWED_TOPICS, DEFAULT_BACKGROUND_COLOR, DEFAULT_BUTTON_BACKGROUND_COLOR,
    DEFAULT_BUTTON_TEXT_COLOR,
};
use crate::domain::ports::{HistoryRepository, StaticFileRepository, UserRepository};
use crate::utils::error::{DonlyError, Result};
use crate::utils::validation::{exceeds_chars, is_valid_hex_color, is_valid_polygon_address};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 50;
const MAX_TOPICS: usize = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    history: Arc<dyn HistoryRepository>,
    files: Arc<dyn StaticFileRepository>,
    static_base_url: String,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        history: Arc<dyn HistoryRepository>,
        files: Arc<dyn StaticFileRepository>,
        static_base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            history,
            files,
            static_base_url: static_base_url.into(),
        }
    }

    pub async fn register(&self, req: RegisterUserRequest) -> Result<String> {
        validate_register(&req)?;

        let now = Utc::now();
        let user = User {
            uuid: Uuid::new_v4().to_string(),
            telegram_id: req.telegram_id,
            polygon_wallet: req.polygon_wallet,
            name: req.name,
            topics: req.topics,
            banner: String::new(),
            avatar: String::new(),
            background_color: Some(DEFAULT_BACKGROUND_COLOR.to_string()),
            background_image: None,
            button_background_color: DEFAULT_BUTTON_BACKGROUND_COLOR.to_string(),
            button_text_color: DEFAULT_BUTTON_TEXT_COLOR.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.users.create_user(&user).await?;

        info!("👤 Registered streamer {} (telegram {})", user.uuid, user.telegram_id);
        Ok(user.uuid)
    }

    pub async fn update_profile(&self, uuid: &str, req: UpdateUserRequest) -> Result<()> {
        validate_update(&req)?;

        let mut user = self.require_user(uuid).await?;
        self.validate_user_files(&req, &user.uuid).await?;

        user.banner = req.banner;
        user.name = req.name;
        user.background_color = req.background_color;
        user.background_image = req.background_image;
        user.button_background_color = req.button_background_color;
        user.button_text_color = req.button_text_color;
        user.avatar = req.avatar;
        user.updated_at = Utc::now();
        self.users.update_user(&user).await
    }

    pub async fn get_profile(&self, uuid: &str) -> Result<UserProfileResponse> {
        let user = self.require_user(uuid).await?;
        let background_image = user
            .background_image
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| image_url(&self.static_base_url, id));

        Ok(UserProfileResponse {
            banner: image_url(&self.static_base_url, &user.banner),
            name: user.name,
            background_color: user.background_color,
            background_image,
            button_background_color: user.button_background_color,
            button_text_color: user.button_text_color,
            avatar: image_url(&self.static_base_url, &user.avatar),
            topics: user.topics,
            polygon_wallet: user.polygon_wallet,
        })
    }

    pub async fn get_history(
        &self,
        uuid: &str,
        page: i64,
        page_size: i64,
    ) -> Result<UserHistoryResponse> {
        let page = u32::try_from(page).ok().filter(|p| *p >= 1).unwrap_or(1);
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|s| (1..=100).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        self.require_user(uuid).await?;
        let rows = self.history.get_history(uuid, page, page_size).await?;

        let history = rows
            .into_iter()
            .map(|h| HistoryItem {
                kind: h.kind,
                username: h.username,
                datetime: h.datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
                amount: h.amount,
                wish_uuid: h.wish_uuid,
                message: h.message,
            })
            .collect();

        Ok(UserHistoryResponse { page, history })
    }

    pub async fn get_by_telegram_id(&self, telegram_id: &str) -> Result<User> {
        self.users
            .get_user_by_telegram_id(telegram_id)
            .await?
            .ok_or(DonlyError::NotFound { entity: "user" })
    }

    async fn require_user(&self, uuid: &str) -> Result<User> {
        if uuid.is_empty() {
            return Err(DonlyError::NotFound { entity: "user" });
        }
        self.users
            .get_user_by_uuid(uuid)
            .await?
            .ok_or(DonlyError::NotFound { entity: "user" })
    }

    async fn validate_user_files(&self, req: &UpdateUserRequest, owner: &str) -> Result<()> {
        let files = self.files.as_ref();
        if !req.banner.is_empty() {
            check_file_ownership(files, &req.banner, FileKind::Banner, owner).await?;
        }
        if !req.avatar.is_empty() {
            check_file_ownership(files, &req.avatar, FileKind::Avatar, owner).await?;
        }
        if let Some(background) = req.background_image.as_deref().filter(|s| !s.is_empty()) {
            check_file_ownership(files, background, FileKind::Background, owner).await?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DonlyError::validation("name cannot be empty"));
    }
    if exceeds_chars(name, MAX_NAME_CHARS) {
        return Err(DonlyError::validation(format!(
            "name cannot be longer than {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(())
}

fn validate_register(req: &RegisterUserRequest) -> Result<()> {
    if req.telegram_id.is_empty() {
        return Err(DonlyError::validation("telegram ID cannot be empty"));
    }
    validate_name(&req.name)?;
    if req.polygon_wallet.is_empty() {
        return Err(DonlyError::validation("polygon wallet cannot be empty"));
    }
    if !is_valid_polygon_address(&req.polygon_wallet) {
        return Err(DonlyError::validation("invalid polygon wallet format"));
    }
    if req.topics.is_empty() {
        return Err(DonlyError::validation("at least one topic is required"));
    }
    if req.topics.len() > MAX_TOPICS {
        return Err(DonlyError::validation(format!(
            "no more than {} topics allowed",
            MAX_TOPICS
        )));
    }
    if let Some(bad) = req
        .topics
        .iter()
        .find(|t| !ALLOWED_TOPICS.contains(&t.as_str()))
    {
        return Err(DonlyError::validation(format!("invalid topic: {}", bad)));
    }
    Ok(())
}

fn validate_update(req: &UpdateUserRequest) -> Result<()> {
    validate_name(&req.name)?;
    if !is_valid_hex_color(&req.button_background_color) {
        return Err(DonlyError::validation("invalid button background color"));
    }
    if !is_valid_hex_color(&req.button_text_color) {
        return Err(DonlyError::validation("invalid button text color"));
    }
    if let Some(color) = req.background_color.as_deref() {
        if !color.is_empty() && !is_valid_hex_color(color) {
            return Err(DonlyError::validation("invalid background color"));
        }
    }
    let has_color = req.background_color.as_deref().is_some_and(|c| !c.is_empty());
    let has_image = req.background_image.as_deref().is_some_and(|i| !i.is_empty());
    if !has_color && !has_image {
        return Err(DonlyError::validation(
            "either background color or background image is required",
        ));
    }
    Ok(())
}
