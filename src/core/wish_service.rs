use crate::core::static_service::{check_file_ownership, image_url};
use crate::domain::model::{
    AddWishRequest, FileKind, UpdateWishRequest, Wish, WishResponse, WishStatus,
};
use crate::domain::ports::{StaticFileRepository, UserRepository, WishRepository};
use crate::utils::error::{DonlyError, Result};
use crate::utils::validation::exceeds_chars;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_POL_TARGET: f64 = 1_000_000.0;

pub struct WishService {
    wishes: Arc<dyn WishRepository>,
    users: Arc<dyn UserRepository>,
    files: Arc<dyn StaticFileRepository>,
    static_base_url: String,
}

impl WishService {
    pub fn new(
        wishes: Arc<dyn WishRepository>,
        users: Arc<dyn UserRepository>,
        files: Arc<dyn StaticFileRepository>,
        static_base_url: impl Into<String>,
    ) -> Self {
        Self {
            wishes,
            users,
            files,
            static_base_url: static_base_url.into(),
        }
    }

    /// 新願望為 pending，等合約 WishAdded 事件後才會出現在清單中
    pub async fn add_wish(&self, user_uuid: &str, req: AddWishRequest) -> Result<String> {
        let user = self
            .users
            .get_user_by_uuid(user_uuid)
            .await?
            .ok_or(DonlyError::NotFound { entity: "user" })?;

        validate_add(&req)?;
        check_file_ownership(self.files.as_ref(), &req.image, FileKind::Wish, &user.uuid).await?;

        let now = Utc::now();
        let wish = Wish {
            uuid: Uuid::new_v4().to_string(),
            streamer_uuid: user.uuid,
            wish_url: req.wish_url.filter(|u| !u.is_empty()),
            name: req.name,
            description: req.description.filter(|d| !d.is_empty()),
            image: req.image,
            pol_target: req.pol_target,
            pol_amount: 0.0,
            is_priority: req.is_priority,
            status: WishStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.wishes.create_wish(&wish).await?;

        info!("🎁 Wish {} created for {} (pending)", wish.uuid, wish.streamer_uuid);
        Ok(wish.uuid)
    }

    pub async fn update_wish(&self, user_uuid: &str, req: UpdateWishRequest) -> Result<()> {
        let mut wish = self
            .wishes
            .get_wish(&req.wish_uuid)
            .await?
            .ok_or(DonlyError::NotFound { entity: "wish" })?;
        let user = self
            .users
            .get_user_by_uuid(user_uuid)
            .await?
            .ok_or(DonlyError::NotFound { entity: "user" })?;

        if wish.streamer_uuid != user.uuid {
            return Err(DonlyError::forbidden(
                "wish does not belong to the current user",
            ));
        }
        if wish.status.is_final() {
            return Err(DonlyError::validation(
                "cannot edit a completed or deleted wish",
            ));
        }
        if req.image.is_empty() {
            return Err(DonlyError::validation("wish image is required"));
        }
        check_file_ownership(self.files.as_ref(), &req.image, FileKind::Wish, &user.uuid).await?;

        wish.image = req.image;
        wish.is_priority = req.is_priority;
        wish.updated_at = Utc::now();
        self.wishes.update_wish(&wish).await
    }

    /// 只回傳 active 願望，優先的在前，其餘新到舊
    pub async fn get_wishes(&self, streamer_uuid: &str) -> Result<Vec<WishResponse>> {
        let wishes = self
            .wishes
            .get_wishes_by_status(streamer_uuid, WishStatus::Active)
            .await?;

        Ok(wishes
            .into_iter()
            .map(|w| WishResponse {
                image: image_url(&self.static_base_url, &w.image),
                uuid: w.uuid,
                wish_url: w.wish_url,
                name: w.name,
                description: w.description,
                pol_target: w.pol_target,
                pol_amount: w.pol_amount,
                is_priority: w.is_priority,
            })
            .collect())
    }
}

fn validate_add(req: &AddWishRequest) -> Result<()> {
    if req.name.is_empty() {
        return Err(DonlyError::validation("wish name cannot be empty"));
    }
    if exceeds_chars(&req.name, MAX_NAME_CHARS) {
        return Err(DonlyError::validation(format!(
            "wish name cannot be longer than {} characters",
            MAX_NAME_CHARS
        )));
    }
    if let Some(description) = &req.description {
        if exceeds_chars(description, MAX_DESCRIPTION_CHARS) {
            return Err(DonlyError::validation(format!(
                "description cannot be longer than {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }
    if req.pol_target.is_nan() || req.pol_target <= 0.0 {
        return Err(DonlyError::validation("pol_target must be greater than 0"));
    }
    if req.pol_target > MAX_POL_TARGET {
        return Err(DonlyError::validation(format!(
            "pol_target cannot exceed {} POL",
            MAX_POL_TARGET
        )));
    }
    if req.image.is_empty() {
        return Err(DonlyError::validation("wish image is required"));
    }
    Ok(())
}
