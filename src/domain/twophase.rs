use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::repository::ObjectStorage;

/// ステージング中のアーティファクトに最終キーへ付加するサフィックス。
pub const TEMP_KEY_SUFFIX: &str = ".tmp";

/// Phase は参加者ごとのトランザクション状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unprepared,
    Prepared,
    Committed,
    RolledBack,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unprepared => write!(f, "UNPREPARED"),
            Self::Prepared => write!(f, "PREPARED"),
            Self::Committed => write!(f, "COMMITTED"),
            Self::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

/// ParticipantError は prepare/commit/rollback 契約のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ParticipantError {
    /// 順序外の commit / rollback はコーディネータ側のバグであり、
    /// バックエンドストアに触れずに即座に失敗する。
    #[error("{participant}: {operation} is not allowed in phase {phase}")]
    InvalidPhase {
        participant: &'static str,
        operation: &'static str,
        phase: Phase,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Participant は論理トランザクションに参加するストレージシステム。
///
/// コーディネータは順序付けられた参加者列を prepare で駆動し、その後
/// commit か rollback のいずれかに進む。prepare の副作用は同一プロセス内の
/// rollback で取り消せること。UNPREPARED からの rollback(および二重
/// rollback)は安全な no-op とする。
#[async_trait]
pub trait Participant: Send + Sync {
    /// ログとエラー帰属に使う固定名。
    fn name(&self) -> &'static str;

    async fn prepare(&self) -> Result<(), ParticipantError>;
    async fn commit(&self) -> Result<(), ParticipantError>;
    async fn rollback(&self) -> Result<(), ParticipantError>;
}

struct StageState {
    phase: Phase,
    staged_key: Option<String>,
}

/// ObjectStoreParticipant はアーティファクトを一時キーでステージングし、
/// コミット時に最終キーへ昇格させる。
///
/// オブジェクトストアにはアトミックな rename がないため、コミットは
/// copy してから delete の2段階になる。copy 完了前に delete を試みては
/// ならない。copy 成功後の delete 失敗は無害な残骸として許容する
/// (後で stale スイープが回収する)。
pub struct ObjectStoreParticipant {
    storage: Arc<dyn ObjectStorage>,
    final_key: String,
    payload: Vec<u8>,
    state: tokio::sync::Mutex<StageState>,
}

impl ObjectStoreParticipant {
    pub fn new(storage: Arc<dyn ObjectStorage>, final_key: String, payload: Vec<u8>) -> Self {
        Self {
            storage,
            final_key,
            payload,
            state: tokio::sync::Mutex::new(StageState {
                phase: Phase::Unprepared,
                staged_key: None,
            }),
        }
    }

    pub fn final_key(&self) -> &str {
        &self.final_key
    }
}

#[async_trait]
impl Participant for ObjectStoreParticipant {
    fn name(&self) -> &'static str {
        "object-store"
    }

    async fn prepare(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Unprepared {
            return Err(ParticipantError::InvalidPhase {
                participant: self.name(),
                operation: "prepare",
                phase: state.phase,
            });
        }

        let temp_key = format!("{}{}", self.final_key, TEMP_KEY_SUFFIX);
        self.storage.put_object(&temp_key, &self.payload).await?;
        state.staged_key = Some(temp_key);
        state.phase = Phase::Prepared;
        Ok(())
    }

    async fn commit(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Prepared {
            return Err(ParticipantError::InvalidPhase {
                participant: self.name(),
                operation: "commit",
                phase: state.phase,
            });
        }

        let temp_key = state.staged_key.clone().ok_or_else(|| {
            ParticipantError::Storage(anyhow::anyhow!("prepared without a staged key"))
        })?;

        self.storage.copy_object(&temp_key, &self.final_key).await?;
        // ここから先、アーティファクトは最終キーで永続化済み。
        // 一時コピーの削除は後片付けにすぎない。
        state.phase = Phase::Committed;

        if let Err(e) = self.storage.delete_object(&temp_key).await {
            warn!(
                key = %temp_key,
                error = %e,
                "failed to delete staged copy after commit, leaving leftover"
            );
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        match state.phase {
            // 何もステージングされていないか、既に消えている
            Phase::Unprepared | Phase::RolledBack => Ok(()),
            Phase::Committed => Err(ParticipantError::InvalidPhase {
                participant: self.name(),
                operation: "rollback",
                phase: state.phase,
            }),
            Phase::Prepared => {
                let result = match state.staged_key.take() {
                    Some(temp_key) => self
                        .storage
                        .delete_object(&temp_key)
                        .await
                        .map_err(ParticipantError::Storage),
                    None => Ok(()),
                };
                state.phase = Phase::RolledBack;
                result
            }
        }
    }
}
