use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entity::ImportRecord;

/// ImportRecordRepository はインポート試行レコードの永続化を抽象化する。
///
/// レコードは参加者に触れる前に書き込まれ、終端ステータスで一度だけ
/// 更新される。インポート途中のクラッシュは IN_PROGRESS 行として残り、
/// stale スイープの対象になる。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportRecordRepository: Send + Sync {
    async fn create(&self, record: &ImportRecord) -> anyhow::Result<()>;

    async fn update(&self, record: &ImportRecord) -> anyhow::Result<()>;

    /// 新しい順に返す。
    async fn list(&self) -> anyhow::Result<Vec<ImportRecord>>;

    /// カットオフより前に送信された IN_PROGRESS レコードを返す。
    async fn find_stale(&self, older_than: DateTime<Utc>) -> anyhow::Result<Vec<ImportRecord>>;

    /// まだ IN_PROGRESS の場合に限り FAILURE へ遷移させる (compare-and-set)。
    /// 読み取りと書き込みの間に終端へ遷移したレコードを巻き戻さないため、
    /// ステータス遷移の単調性はここで守られる。遷移したら true を返す。
    async fn mark_failed_if_in_progress(&self, id: Uuid, error: &str) -> anyhow::Result<bool>;
}
