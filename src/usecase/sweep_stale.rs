use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::domain::repository::{ImportRecordRepository, ObjectStorage};
use crate::domain::twophase::TEMP_KEY_SUFFIX;

/// SweepReport は1回のスイープの実績。
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_records: usize,
    pub deleted_temp_objects: usize,
}

/// SweepStaleUseCase はクラッシュしたインポートの残骸を回収する。
/// 終端ステータスに到達しなかった IN_PROGRESS レコードと、commit にも
/// rollback にも至らなかったステージング済み `.tmp` オブジェクトが対象。
pub struct SweepStaleUseCase {
    import_repo: Arc<dyn ImportRecordRepository>,
    storage: Arc<dyn ObjectStorage>,
    stale_after: Duration,
}

impl SweepStaleUseCase {
    pub fn new(
        import_repo: Arc<dyn ImportRecordRepository>,
        storage: Arc<dyn ObjectStorage>,
        stale_after_seconds: u64,
    ) -> Self {
        Self {
            import_repo,
            storage,
            stale_after: Duration::seconds(stale_after_seconds as i64),
        }
    }

    pub async fn execute(&self) -> anyhow::Result<SweepReport> {
        let cutoff = Utc::now() - self.stale_after;
        let mut report = SweepReport::default();

        for record in self.import_repo.find_stale(cutoff).await? {
            // compare-and-set: 読み取り後に終端へ遷移したレコードは巻き戻さない
            match self
                .import_repo
                .mark_failed_if_in_progress(
                    record.id,
                    "import expired without reaching a terminal status",
                )
                .await
            {
                Ok(true) => report.expired_records += 1,
                Ok(false) => {}
                Err(e) => error!(import_id = %record.id, error = %e, "failed to expire record"),
            }
        }

        for object in self.storage.list_objects().await? {
            if object.key.ends_with(TEMP_KEY_SUFFIX) && object.last_modified < cutoff {
                match self.storage.delete_object(&object.key).await {
                    Ok(()) => report.deleted_temp_objects += 1,
                    Err(e) => warn!(key = %object.key, error = %e, "failed to delete stale temp object"),
                }
            }
        }

        if report.expired_records > 0 || report.deleted_temp_objects > 0 {
            info!(
                expired_records = report.expired_records,
                deleted_temp_objects = report.deleted_temp_objects,
                "stale import sweep finished"
            );
        }
        Ok(report)
    }
}
