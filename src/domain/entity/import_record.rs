use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ImportStatus はインポート試行のライフサイクル状態。
/// 非終端状態は IN_PROGRESS のみで、そこからの遷移は一度きりで後戻りしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    InProgress,
    Success,
    Failure,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

impl ImportStatus {
    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            _ => anyhow::bail!("invalid import status: {}", s),
        }
    }
}

/// ImportRecord はインポート試行ごとの記録。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ImportRecord {
    pub id: Uuid,
    pub status: ImportStatus,
    pub submitted_at: DateTime<Utc>,
    pub objects_added: i32,
    pub submitted_by: String,
    /// オブジェクトストア参加者がコミットに到達した場合にのみ設定される。
    pub artifact_key: Option<String>,
    pub error_message: Option<String>,
}

impl ImportRecord {
    /// 参加者に触れる前に IN_PROGRESS で新規レコードを作成する。
    pub fn new(submitted_by: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: ImportStatus::InProgress,
            submitted_at: Utc::now(),
            objects_added: 0,
            submitted_by,
            artifact_key: None,
            error_message: None,
        }
    }

    /// 最終アーティファクトキーと共に成功として確定する。
    pub fn succeed(&mut self, objects_added: i32, artifact_key: String) {
        self.status = ImportStatus::Success;
        self.objects_added = objects_added;
        self.artifact_key = Some(artifact_key);
        self.error_message = None;
    }

    /// 失敗として確定する。アーティファクトキーなし、追加オブジェクト数ゼロ。
    pub fn fail(&mut self, error: String) {
        self.status = ImportStatus::Failure;
        self.objects_added = 0;
        self.error_message = Some(error);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ImportStatus::Success | ImportStatus::Failure)
    }
}
