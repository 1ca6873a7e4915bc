use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// ObjectInfo は [`ObjectStorage::list_objects`] が返す一覧エントリ。
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// ObjectStorage はインポートパイプラインが必要とするオブジェクトストア操作。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8]) -> anyhow::Result<()>;

    async fn copy_object(&self, source_key: &str, target_key: &str) -> anyhow::Result<()>;

    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;

    /// 既存オブジェクトに対する短命のダウンロードURLを発行する。
    async fn generate_download_url(
        &self,
        key: &str,
        expires_in_seconds: u32,
    ) -> anyhow::Result<String>;

    async fn list_objects(&self) -> anyhow::Result<Vec<ObjectInfo>>;
}
