use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::entity::{CityDescriptor, ImportRecord};
use crate::domain::repository::{ImportRecordRepository, ObjectStorage, TransactionalCityStore};
use crate::domain::twophase::{ObjectStoreParticipant, Participant};

/// ImportError はインポート操作のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// 一方の参加者がコミット済みの状態で他方のコミットが失敗した。
    /// ストア間が食い違っている可能性があり、運用者の対応が必要。
    #[error("stores may be inconsistent: {0}")]
    CommitInconsistent(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

enum PhaseFailure {
    /// 副作用はすべてロールバック済み。レコードは FAILURE になり、
    /// リクエスト自体は正常に応答する。
    Recoverable(String),
    /// 他の参加者がコミットした後にコミットが失敗した。
    Inconsistent(String),
}

/// ImportBatchUseCase は1回のインポート試行を最初から最後まで実行する。
///
/// レコードはどの参加者にも触れる前に IN_PROGRESS で永続化される。
/// その後、両参加者を prepare で駆動し、ドキュメントの行をステージングし、
/// オブジェクトストア、リレーショナルストアの順にコミットする。
/// インポートはプロセス内ロックで直列化される。
pub struct ImportBatchUseCase {
    import_repo: Arc<dyn ImportRecordRepository>,
    city_store: Arc<dyn TransactionalCityStore>,
    storage: Arc<dyn ObjectStorage>,
    import_lock: tokio::sync::Mutex<()>,
}

impl ImportBatchUseCase {
    pub fn new(
        import_repo: Arc<dyn ImportRecordRepository>,
        city_store: Arc<dyn TransactionalCityStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            import_repo,
            city_store,
            storage,
            import_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn execute(
        &self,
        submitted_by: &str,
        payload: Vec<u8>,
    ) -> Result<ImportRecord, ImportError> {
        let _serialized = self.import_lock.lock().await;

        let final_key = format!("import-{}.json", Uuid::new_v4());
        let artifact =
            ObjectStoreParticipant::new(self.storage.clone(), final_key.clone(), payload.clone());

        let mut record = ImportRecord::new(submitted_by.to_string());
        self.import_repo.create(&record).await?;
        info!(import_id = %record.id, submitted_by, "import started");

        let participants: [&dyn Participant; 2] = [&artifact, self.city_store.as_ref()];

        match self.run_phases(&payload, submitted_by, &participants).await {
            Ok(objects_added) => {
                record.succeed(objects_added, final_key);
                self.import_repo.update(&record).await?;
                info!(import_id = %record.id, objects_added, "import committed");
                Ok(record)
            }
            Err(PhaseFailure::Recoverable(message)) => {
                record.fail(message);
                self.import_repo.update(&record).await?;
                info!(
                    import_id = %record.id,
                    error = record.error_message.as_deref().unwrap_or(""),
                    "import rolled back"
                );
                Ok(record)
            }
            Err(PhaseFailure::Inconsistent(message)) => {
                record.fail(format!("commit inconsistency: {}", message));
                // レコード永続化の失敗で不整合エラー自体を覆い隠さない
                if let Err(e) = self.import_repo.update(&record).await {
                    error!(
                        import_id = %record.id,
                        error = %e,
                        "failed to persist commit-inconsistent record"
                    );
                }
                Err(ImportError::CommitInconsistent(message))
            }
        }
    }

    async fn run_phases(
        &self,
        payload: &[u8],
        submitted_by: &str,
        participants: &[&dyn Participant],
    ) -> Result<i32, PhaseFailure> {
        for participant in participants {
            if let Err(e) = participant.prepare().await {
                error!(participant = participant.name(), error = %e, "prepare failed");
                rollback_all(participants).await;
                return Err(PhaseFailure::Recoverable(format!(
                    "{}: prepare failed: {}",
                    participant.name(),
                    e
                )));
            }
        }

        let descriptors: Vec<CityDescriptor> = match serde_json::from_slice(payload) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                rollback_all(participants).await;
                return Err(PhaseFailure::Recoverable(format!(
                    "invalid import document: {}",
                    e
                )));
            }
        };

        let mut objects_added = 0i32;
        for descriptor in &descriptors {
            match self.city_store.create_city(descriptor, submitted_by).await {
                Ok(_) => objects_added += 1,
                Err(e) => {
                    rollback_all(participants).await;
                    return Err(PhaseFailure::Recoverable(e.to_string()));
                }
            }
        }

        for (idx, participant) in participants.iter().enumerate() {
            if let Err(e) = participant.commit().await {
                if idx == 0 {
                    // まだ何もコミットされていないので全参加者を巻き戻せる
                    rollback_all(&participants[idx..]).await;
                    return Err(PhaseFailure::Recoverable(format!(
                        "{}: commit failed: {}",
                        participant.name(),
                        e
                    )));
                }
                error!(
                    participant = participant.name(),
                    committed = idx,
                    error = %e,
                    "commit failed after earlier participants committed"
                );
                return Err(PhaseFailure::Inconsistent(format!(
                    "{}: commit failed after {} participant(s) committed: {}",
                    participant.name(),
                    idx,
                    e
                )));
            }
        }

        Ok(objects_added)
    }
}

/// ベストエフォートのロールバック。個々の失敗はログに残すだけで、
/// 元のエラーを覆い隠さない。
async fn rollback_all(participants: &[&dyn Participant]) {
    for participant in participants {
        if let Err(e) = participant.rollback().await {
            error!(participant = participant.name(), error = %e, "rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::repository::{InMemoryCityStore, InMemoryImportRecordRepository};
    use crate::domain::entity::{City, ImportStatus};
    use crate::domain::repository::import_record_repository::MockImportRecordRepository;
    use crate::domain::repository::object_storage::MockObjectStorage;
    use crate::domain::repository::CityStoreError;
    use crate::domain::twophase::ParticipantError;
    use crate::infrastructure::memory_storage::InMemoryObjectStorage;
    use async_trait::async_trait;

    fn usecase_with(
        city_store: Arc<dyn TransactionalCityStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> (ImportBatchUseCase, Arc<InMemoryImportRecordRepository>) {
        let repo = Arc::new(InMemoryImportRecordRepository::new());
        let usecase = ImportBatchUseCase::new(repo.clone(), city_store, storage);
        (usecase, repo)
    }

    #[tokio::test]
    async fn test_successful_import_commits_both_stores() {
        let city_store = Arc::new(InMemoryCityStore::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let (usecase, repo) = usecase_with(city_store.clone(), storage.clone());

        let payload = br#"[{"name": "Springfield"}, {"name": "Shelbyville"}]"#.to_vec();
        let record = usecase.execute("operator", payload).await.unwrap();

        assert_eq!(record.status, ImportStatus::Success);
        assert_eq!(record.objects_added, 2);
        let key = record.artifact_key.as_deref().unwrap();
        assert!(key.starts_with("import-") && key.ends_with(".json"));
        assert!(storage.contains(key).await);
        assert!(!storage.contains(&format!("{}.tmp", key)).await);
        assert_eq!(city_store.committed_cities().await.len(), 2);

        let stored = repo.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, ImportStatus::Success);
    }

    #[tokio::test]
    async fn test_duplicate_row_rolls_back_everything() {
        let city_store = Arc::new(InMemoryCityStore::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let (usecase, repo) = usecase_with(city_store.clone(), storage.clone());

        let payload = br#"[{"name": "Springfield"}, {"name": "Springfield"}]"#.to_vec();
        let record = usecase.execute("operator", payload).await.unwrap();

        assert_eq!(record.status, ImportStatus::Failure);
        assert_eq!(record.objects_added, 0);
        assert!(record.artifact_key.is_none());
        assert!(record.error_message.as_deref().unwrap().contains("already exists"));
        assert!(city_store.committed_cities().await.is_empty());
        assert_eq!(storage.object_count().await, 0);

        let stored = repo.list().await.unwrap();
        assert_eq!(stored[0].status, ImportStatus::Failure);
    }

    #[tokio::test]
    async fn test_malformed_document_fails_without_side_effects() {
        let city_store = Arc::new(InMemoryCityStore::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let (usecase, _repo) = usecase_with(city_store.clone(), storage.clone());

        let record = usecase
            .execute("operator", b"not json at all".to_vec())
            .await
            .unwrap();

        assert_eq!(record.status, ImportStatus::Failure);
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .contains("invalid import document"));
        assert!(city_store.committed_cities().await.is_empty());
        assert_eq!(storage.object_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds_with_zero_objects() {
        let city_store = Arc::new(InMemoryCityStore::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let (usecase, _repo) = usecase_with(city_store, storage.clone());

        let record = usecase.execute("operator", b"[]".to_vec()).await.unwrap();

        assert_eq!(record.status, ImportStatus::Success);
        assert_eq!(record.objects_added, 0);
        assert!(storage.contains(record.artifact_key.as_deref().unwrap()).await);
    }

    #[tokio::test]
    async fn test_staging_failure_fails_the_import() {
        let city_store = Arc::new(InMemoryCityStore::new());
        let mut storage = MockObjectStorage::new();
        storage
            .expect_put_object()
            .returning(|_, _| Err(anyhow::anyhow!("bucket unavailable")));

        let (usecase, repo) = usecase_with(city_store.clone(), Arc::new(storage));

        let record = usecase
            .execute("operator", br#"[{"name": "A"}]"#.to_vec())
            .await
            .unwrap();

        assert_eq!(record.status, ImportStatus::Failure);
        assert!(record.error_message.as_deref().unwrap().contains("prepare failed"));
        assert!(city_store.committed_cities().await.is_empty());
        assert_eq!(repo.list().await.unwrap()[0].status, ImportStatus::Failure);
    }

    /// インメモリストアに委譲するがコミットだけは拒否する。アーティファクトの
    /// rename 後にリレーショナルコミットが失敗するケースの再現用。
    struct FailOnCommitStore {
        inner: InMemoryCityStore,
    }

    #[async_trait]
    impl Participant for FailOnCommitStore {
        fn name(&self) -> &'static str {
            "relational-store"
        }

        async fn prepare(&self) -> Result<(), ParticipantError> {
            self.inner.prepare().await
        }

        async fn commit(&self) -> Result<(), ParticipantError> {
            Err(ParticipantError::Storage(anyhow::anyhow!(
                "connection reset during commit"
            )))
        }

        async fn rollback(&self) -> Result<(), ParticipantError> {
            self.inner.rollback().await
        }
    }

    #[async_trait]
    impl TransactionalCityStore for FailOnCommitStore {
        async fn create_city(
            &self,
            descriptor: &CityDescriptor,
            created_by: &str,
        ) -> Result<City, CityStoreError> {
            self.inner.create_city(descriptor, created_by).await
        }
    }

    #[tokio::test]
    async fn test_second_commit_failure_is_reported_as_inconsistent() {
        let city_store = Arc::new(FailOnCommitStore {
            inner: InMemoryCityStore::new(),
        });
        let storage = Arc::new(InMemoryObjectStorage::new());
        let (usecase, repo) = usecase_with(city_store, storage.clone());

        let result = usecase
            .execute("operator", br#"[{"name": "A"}]"#.to_vec())
            .await;

        assert!(matches!(result, Err(ImportError::CommitInconsistent(_))));

        // リレーショナルコミットの失敗前にアーティファクトは最終キーに
        // 到達している。これが報告される不整合そのもの。
        assert_eq!(storage.object_count().await, 1);

        let stored = repo.list().await.unwrap();
        assert_eq!(stored[0].status, ImportStatus::Failure);
        assert!(stored[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("commit inconsistency"));
    }

    #[tokio::test]
    async fn test_inconsistency_error_survives_record_persist_failure() {
        let mut repo = MockImportRecordRepository::new();
        repo.expect_create().returning(|_| Ok(()));
        repo.expect_update()
            .returning(|_| Err(anyhow::anyhow!("database unreachable")));

        let city_store = Arc::new(FailOnCommitStore {
            inner: InMemoryCityStore::new(),
        });
        let storage = Arc::new(InMemoryObjectStorage::new());
        let usecase = ImportBatchUseCase::new(Arc::new(repo), city_store, storage);

        let result = usecase
            .execute("operator", br#"[{"name": "A"}]"#.to_vec())
            .await;

        // レコードを書けなくても呼び出し元には不整合エラーを返す
        assert!(matches!(result, Err(ImportError::CommitInconsistent(_))));
    }

    /// prepare/commit の順序を記録し、交錯があれば検出できるようにする。
    struct TracingStore {
        inner: InMemoryCityStore,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Participant for TracingStore {
        fn name(&self) -> &'static str {
            "relational-store"
        }

        async fn prepare(&self) -> Result<(), ParticipantError> {
            self.log.lock().unwrap().push("begin");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.inner.prepare().await
        }

        async fn commit(&self) -> Result<(), ParticipantError> {
            let result = self.inner.commit().await;
            self.log.lock().unwrap().push("end");
            result
        }

        async fn rollback(&self) -> Result<(), ParticipantError> {
            self.inner.rollback().await
        }
    }

    #[async_trait]
    impl TransactionalCityStore for TracingStore {
        async fn create_city(
            &self,
            descriptor: &CityDescriptor,
            created_by: &str,
        ) -> Result<City, CityStoreError> {
            self.inner.create_city(descriptor, created_by).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_imports_are_serialized() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let city_store = Arc::new(TracingStore {
            inner: InMemoryCityStore::new(),
            log: log.clone(),
        });
        let storage = Arc::new(InMemoryObjectStorage::new());
        let (usecase, _repo) = usecase_with(city_store, storage);
        let usecase = Arc::new(usecase);

        let first = {
            let usecase = usecase.clone();
            tokio::spawn(async move {
                usecase.execute("operator", br#"[{"name": "A"}]"#.to_vec()).await
            })
        };
        let second = {
            let usecase = usecase.clone();
            tokio::spawn(async move {
                usecase.execute("operator", br#"[{"name": "B"}]"#.to_vec()).await
            })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.status, ImportStatus::Success);
        assert_eq!(second.status, ImportStatus::Success);

        // 次のインポートが始まる前に前のコミットが完了していること
        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["begin", "end", "begin", "end"]);
    }
}
