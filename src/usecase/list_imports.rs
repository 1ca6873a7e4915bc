use std::sync::Arc;

use tracing::warn;

use crate::domain::entity::ImportRecord;
use crate::domain::repository::{ImportRecordRepository, ObjectStorage};

/// ImportHistoryEntry はインポート履歴の1行。コミット済みアーティファクトが
/// ある場合は短命のダウンロードURLを伴う。
#[derive(Debug, Clone)]
pub struct ImportHistoryEntry {
    pub record: ImportRecord,
    pub file_download_url: Option<String>,
}

/// ListImportsUseCase はインポート履歴を新しい順に取得する。
pub struct ListImportsUseCase {
    import_repo: Arc<dyn ImportRecordRepository>,
    storage: Arc<dyn ObjectStorage>,
    presign_expiry_seconds: u32,
}

impl ListImportsUseCase {
    pub fn new(
        import_repo: Arc<dyn ImportRecordRepository>,
        storage: Arc<dyn ObjectStorage>,
        presign_expiry_seconds: u32,
    ) -> Self {
        Self {
            import_repo,
            storage,
            presign_expiry_seconds,
        }
    }

    /// presign の失敗は一覧全体を失敗させず、該当エントリのURLを
    /// None に落とすだけにする。
    pub async fn execute(&self) -> anyhow::Result<Vec<ImportHistoryEntry>> {
        let records = self.import_repo.list().await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let file_download_url = match record.artifact_key.as_deref() {
                Some(key) => match self
                    .storage
                    .generate_download_url(key, self.presign_expiry_seconds)
                    .await
                {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(import_id = %record.id, error = %e, "presign failed, omitting download url");
                        None
                    }
                },
                None => None,
            };
            entries.push(ImportHistoryEntry {
                record,
                file_download_url,
            });
        }
        Ok(entries)
    }
}
