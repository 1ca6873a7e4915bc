use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::repository::{ObjectInfo, ObjectStorage};

struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// InMemoryObjectStorage はローカル開発・テスト用のオブジェクトストア。
/// delete は S3 と同様に存在しないキーでも成功する。
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put_object(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, target_key: &str) -> anyhow::Result<()> {
        let mut objects = self.objects.write().await;
        let data = objects
            .get(source_key)
            .map(|o| o.data.clone())
            .ok_or_else(|| anyhow::anyhow!("source object not found: {}", source_key))?;
        objects.insert(
            target_key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn generate_download_url(
        &self,
        key: &str,
        expires_in_seconds: u32,
    ) -> anyhow::Result<String> {
        Ok(format!(
            "https://storage.example.com/download/{}?expires={}&sig=mock",
            key, expires_in_seconds
        ))
    }

    async fn list_objects(&self) -> anyhow::Result<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                last_modified: object.last_modified,
            })
            .collect())
    }
}
