use crate::domain::model::{FileKind, StaticFile};
use crate::domain::ports::{FileStorage, StaticFileRepository, StoredObject};
use crate::utils::error::{DonlyError, Result};
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const JPEG_QUALITY: u8 = 90;

pub struct StaticService {
    files: Arc<dyn StaticFileRepository>,
    storage: Arc<dyn FileStorage>,
}

impl StaticService {
    pub fn new(files: Arc<dyn StaticFileRepository>, storage: Arc<dyn FileStorage>) -> Self {
        Self { files, storage }
    }

    /// 驗證、裁切並轉成 JPEG 後儲存，回傳檔案 id
    pub async fn upload(&self, uploader_uuid: &str, kind: FileKind, data: Vec<u8>) -> Result<String> {
        if data.is_empty() {
            return Err(DonlyError::validation("file is empty"));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(DonlyError::validation(format!(
                "file is too large (max {} bytes)",
                MAX_UPLOAD_BYTES
            )));
        }

        // 解碼與編碼是 CPU 密集工作
        let jpeg = tokio::task::spawn_blocking(move || process_image(&data, kind))
            .await
            .map_err(|e| DonlyError::internal(format!("image task failed: {}", e)))??;

        let file = StaticFile {
            id: Uuid::new_v4().to_string(),
            kind,
            uploader_uuid: uploader_uuid.to_string(),
            created_at: Utc::now(),
        };
        let key = file.storage_key();
        self.storage.put(&key, jpeg, "image/jpeg").await?;

        if let Err(e) = self.files.save_file(&file).await {
            warn!("Metadata save failed for {}, removing blob: {}", key, e);
            if let Err(cleanup) = self.storage.delete(&key).await {
                warn!("Failed to remove orphaned blob {}: {}", key, cleanup);
            }
            return Err(e);
        }

        info!("🖼️  Stored {} image {} for {}", kind, file.id, uploader_uuid);
        Ok(file.id)
    }

    pub async fn get_file(&self, id: &str) -> Result<StoredObject> {
        let file = self
            .files
            .get_file(id)
            .await?
            .ok_or(DonlyError::NotFound { entity: "file" })?;
        self.storage
            .get(&file.storage_key())
            .await?
            .ok_or(DonlyError::NotFound { entity: "file" })
    }
}

/// 只接受 JPEG/PNG，檢查最小尺寸，必要時置中裁成正方形，再以 JPEG 重新編碼
pub fn process_image(data: &[u8], kind: FileKind) -> Result<Vec<u8>> {
    let format = image::guess_format(data)
        .map_err(|_| DonlyError::validation("unsupported image format, expected JPEG or PNG"))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(DonlyError::validation(
            "unsupported image format, expected JPEG or PNG",
        ));
    }

    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| DonlyError::validation(format!("failed to decode image: {}", e)))?;

    let (min_w, min_h) = kind.min_dimensions();
    if img.width() < min_w || img.height() < min_h {
        return Err(DonlyError::validation(format!(
            "image too small: {}x{}, minimum {}x{}",
            img.width(),
            img.height(),
            min_w,
            min_h
        )));
    }

    let img = if kind.is_square() { crop_square(&img) } else { img };
    debug!("Encoding {}x{} {} image", img.width(), img.height(), kind);

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

fn crop_square(img: &DynamicImage) -> DynamicImage {
    let side = img.width().min(img.height());
    let x = (img.width() - side) / 2;
    let y = (img.height() - side) / 2;
    img.crop_imm(x, y, side, side)
}

/// 確認檔案存在、類型正確且屬於 owner
pub async fn check_file_ownership(
    files: &dyn StaticFileRepository,
    file_id: &str,
    expected: FileKind,
    owner_uuid: &str,
) -> Result<()> {
    let file = files
        .get_file(file_id)
        .await?
        .ok_or_else(|| DonlyError::validation(format!("file '{}' not found", file_id)))?;
    if file.kind != expected {
        return Err(DonlyError::validation(format!(
            "file must be of type '{}'",
            expected
        )));
    }
    if file.uploader_uuid != owner_uuid {
        return Err(DonlyError::validation(
            "file does not belong to the current user",
        ));
    }
    Ok(())
}

/// 空 id 保持為空字串
pub fn image_url(base_url: &str, image_id: &str) -> String {
    if image_id.is_empty() {
        return String::new();
    }
    format!("{}/static/{}", base_url.trim_end_matches('/'), image_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalStorage, SqliteStore};
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([200u8, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_avatar_is_cropped_to_square_jpeg() {
        let jpeg = process_image(&png(300, 200), FileKind::Avatar).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 200));
    }

    #[test]
    fn test_banner_keeps_aspect() {
        let jpeg = process_image(&png(1000, 250), FileKind::Banner).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1000, 250));
    }

    #[test]
    fn test_rejects_small_and_non_images() {
        let err = process_image(&png(100, 100), FileKind::Avatar).unwrap_err();
        assert!(err.to_string().contains("image too small"));
        assert!(process_image(b"GIF89a....", FileKind::Wish).is_err());
        assert!(process_image(b"plain text", FileKind::Wish).is_err());
    }

    #[test]
    fn test_image_url() {
        assert_eq!(image_url("http://cdn", "abc"), "http://cdn/static/abc");
        assert_eq!(image_url("http://cdn/", "abc"), "http://cdn/static/abc");
        assert_eq!(image_url("http://cdn", ""), "");
    }

    #[tokio::test]
    async fn test_upload_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let service = StaticService::new(store.clone(), Arc::new(LocalStorage::new(dir.path())));

        let id = service.upload("u1", FileKind::Wish, png(128, 128)).await.unwrap();
        let object = service.get_file(&id).await.unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert!(dir.path().join("wish").join(format!("{}.jpg", id)).exists());

        assert!(check_file_ownership(store.as_ref(), &id, FileKind::Wish, "u1").await.is_ok());
        assert!(check_file_ownership(store.as_ref(), &id, FileKind::Avatar, "u1").await.is_err());
        assert!(check_file_ownership(store.as_ref(), &id, FileKind::Wish, "u2").await.is_err());

        let missing = service.get_file("nope").await.unwrap_err();
        assert!(matches!(missing, DonlyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let service = StaticService::new(store, Arc::new(LocalStorage::new(dir.path())));
        let err = service.upload("u1", FileKind::Avatar, Vec::new()).await.unwrap_err();
        assert!(matches!(err, DonlyError::ValidationError { .. }));
    }
}
