use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{ImportRecord, ImportStatus};
use crate::domain::repository::ImportRecordRepository;

pub struct PostgresImportRecordRepository {
    pool: PgPool,
}

impl PostgresImportRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ImportRecordRow {
    id: Uuid,
    status: String,
    submitted_at: DateTime<Utc>,
    objects_added: i32,
    submitted_by: String,
    artifact_key: Option<String>,
    error_message: Option<String>,
}

impl TryFrom<ImportRecordRow> for ImportRecord {
    type Error = anyhow::Error;

    fn try_from(row: ImportRecordRow) -> Result<Self, Self::Error> {
        Ok(ImportRecord {
            id: row.id,
            status: ImportStatus::from_str_value(&row.status)?,
            submitted_at: row.submitted_at,
            objects_added: row.objects_added,
            submitted_by: row.submitted_by,
            artifact_key: row.artifact_key,
            error_message: row.error_message,
        })
    }
}

#[async_trait]
impl ImportRecordRepository for PostgresImportRecordRepository {
    async fn create(&self, record: &ImportRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO import_records
                (id, status, submitted_at, objects_added, submitted_by, artifact_key, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.status.to_string())
        .bind(record.submitted_at)
        .bind(record.objects_added)
        .bind(&record.submitted_by)
        .bind(&record.artifact_key)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, record: &ImportRecord) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE import_records
            SET status = $2, objects_added = $3, artifact_key = $4, error_message = $5
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.to_string())
        .bind(record.objects_added)
        .bind(&record.artifact_key)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("import record not found: {}", record.id);
        }
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<ImportRecord>> {
        let rows = sqlx::query_as::<_, ImportRecordRow>(
            r#"
            SELECT id, status, submitted_at, objects_added, submitted_by, artifact_key, error_message
            FROM import_records
            ORDER BY submitted_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ImportRecord::try_from).collect()
    }

    async fn mark_failed_if_in_progress(&self, id: Uuid, error: &str) -> anyhow::Result<bool> {
        // 状態条件付きUPDATE。終端に達したレコードは0行更新となり巻き戻らない。
        let result = sqlx::query(
            r#"
            UPDATE import_records
            SET status = 'FAILURE', objects_added = 0, error_message = $2
            WHERE id = $1 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_stale(&self, older_than: DateTime<Utc>) -> anyhow::Result<Vec<ImportRecord>> {
        let rows = sqlx::query_as::<_, ImportRecordRow>(
            r#"
            SELECT id, status, submitted_at, objects_added, submitted_by, artifact_key, error_message
            FROM import_records
            WHERE status = 'IN_PROGRESS' AND submitted_at < $1
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ImportRecord::try_from).collect()
    }
}
