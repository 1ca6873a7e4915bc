use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entity::{ImportRecord, ImportStatus};
use crate::domain::repository::ImportRecordRepository;

/// InMemoryImportRecordRepository はローカル開発・テスト用のレコードストア。
pub struct InMemoryImportRecordRepository {
    records: RwLock<Vec<ImportRecord>>,
}

impl InMemoryImportRecordRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryImportRecordRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImportRecordRepository for InMemoryImportRecordRepository {
    async fn create(&self, record: &ImportRecord) -> anyhow::Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &ImportRecord) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => anyhow::bail!("import record not found: {}", record.id),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<ImportRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }

    async fn mark_failed_if_in_progress(&self, id: Uuid, error: &str) -> anyhow::Result<bool> {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|r| r.id == id && r.status == ImportStatus::InProgress)
        {
            Some(record) => {
                record.fail(error.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_stale(&self, older_than: DateTime<Utc>) -> anyhow::Result<Vec<ImportRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.status == ImportStatus::InProgress && r.submitted_at < older_than)
            .cloned()
            .collect())
    }
}
