use crate::domain::ports::{FileStorage, StoredObject};
use crate::utils::error::{DonlyError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

fn content_type_for(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// 本機檔案系統儲存，key 對應到 base_path 底下的相對路徑
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(DonlyError::storage(format!("invalid object key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        debug!("Writing {} bytes to {}", data.len(), path.display());
        fs::write(path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(StoredObject {
                data,
                content_type: content_type_for(key).to_string(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(feature = "s3")]
pub use s3::S3Storage;

#[cfg(feature = "s3")]
mod s3 {
    use super::content_type_for;
    use crate::config::S3Config;
    use crate::domain::ports::{FileStorage, StoredObject};
    use crate::utils::error::{DonlyError, Result};
    use async_trait::async_trait;
    use aws_sdk_s3::config::{Credentials, Region};
    use aws_sdk_s3::operation::get_object::GetObjectError;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::Client as S3Client;
    use tracing::info;

    /// S3 相容物件儲存（AWS S3 或 MinIO）
    #[derive(Debug, Clone)]
    pub struct S3Storage {
        client: S3Client,
        bucket: String,
    }

    impl S3Storage {
        pub fn new(client: S3Client, bucket: String) -> Self {
            Self { client, bucket }
        }

        pub async fn connect(config: &S3Config) -> Result<Self> {
            let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(Region::new(config.region.clone()));
            if let (Some(access), Some(secret)) = (&config.access_key, &config.secret_key) {
                loader = loader.credentials_provider(Credentials::new(
                    access.clone(),
                    secret.clone(),
                    None,
                    None,
                    "donly-config",
                ));
            }
            let shared = loader.load().await;

            let mut builder = aws_sdk_s3::config::Builder::from(&shared);
            if let Some(endpoint) = &config.endpoint {
                builder = builder.endpoint_url(endpoint).force_path_style(true);
            }
            info!("🪣 Using S3 bucket {}", config.bucket);
            Ok(Self::new(
                S3Client::from_conf(builder.build()),
                config.bucket.clone(),
            ))
        }
    }

    #[async_trait]
    impl FileStorage for S3Storage {
        async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| DonlyError::storage(format!("Failed to write to S3: {}", e)))?;
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
            let resp = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    let service_err = err.into_service_error();
                    if matches!(service_err, GetObjectError::NoSuchKey(_)) {
                        return Ok(None);
                    }
                    return Err(DonlyError::storage(format!(
                        "Failed to read from S3: {}",
                        service_err
                    )));
                }
            };

            let content_type = resp
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| content_type_for(key).to_string());
            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| DonlyError::storage(format!("Failed to collect S3 data: {}", e)))?;

            Ok(Some(StoredObject {
                data: data.into_bytes().to_vec(),
                content_type,
            }))
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| DonlyError::storage(format!("Failed to delete from S3: {}", e)))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage
            .put("avatar/a.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        let object = storage.get("avatar/a.jpg").await.unwrap().unwrap();
        assert_eq!(object.data, vec![1, 2, 3]);
        assert_eq!(object.content_type, "image/jpeg");

        storage.delete("avatar/a.jpg").await.unwrap();
        assert!(storage.get("avatar/a.jpg").await.unwrap().is_none());
        // 刪除不存在的物件不算錯誤
        storage.delete("avatar/a.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.put("../escape.jpg", vec![0], "image/jpeg").await.is_err());
        assert!(storage.get("/etc/passwd").await.is_err());
    }
}
