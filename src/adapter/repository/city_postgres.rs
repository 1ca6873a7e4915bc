use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{City, CityDescriptor};
use crate::domain::repository::{CityStoreError, TransactionalCityStore};
use crate::domain::twophase::{Participant, ParticipantError, Phase};

struct TxState {
    phase: Phase,
    tx: Option<Transaction<'static, Postgres>>,
}

/// PostgresCityStore は単一のPostgresトランザクションに裏打ちされた
/// リレーショナル参加者。
///
/// ストアはインポート間で共有される。prepare は他のトランザクションが
/// 進行中でない限り新しいトランザクションを開くため、フェーズが弾くのは
/// 再入であって再利用ではない。
pub struct PostgresCityStore {
    pool: PgPool,
    state: tokio::sync::Mutex<TxState>,
}

impl PostgresCityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            state: tokio::sync::Mutex::new(TxState {
                phase: Phase::Unprepared,
                tx: None,
            }),
        }
    }
}

fn map_insert_error(e: sqlx::Error, name: &str) -> CityStoreError {
    if let sqlx::Error::Database(db) = &e {
        // 23505 = unique_violation
        if db.code().as_deref() == Some("23505") {
            return CityStoreError::Duplicate(name.to_string());
        }
    }
    CityStoreError::Internal(anyhow::Error::from(e))
}

#[async_trait]
impl Participant for PostgresCityStore {
    fn name(&self) -> &'static str {
        "relational-store"
    }

    async fn prepare(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        if state.tx.is_some() {
            return Err(ParticipantError::InvalidPhase {
                participant: self.name(),
                operation: "prepare",
                phase: state.phase,
            });
        }
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ParticipantError::Storage(anyhow::Error::from(e)))?;
        state.tx = Some(tx);
        state.phase = Phase::Prepared;
        Ok(())
    }

    async fn commit(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        let tx = state.tx.take().ok_or_else(|| ParticipantError::InvalidPhase {
            participant: self.name(),
            operation: "commit",
            phase: state.phase,
        })?;
        tx.commit()
            .await
            .map_err(|e| ParticipantError::Storage(anyhow::Error::from(e)))?;
        state.phase = Phase::Committed;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        // 開いているトランザクションがなければ取り消すものもない
        let Some(tx) = state.tx.take() else {
            return Ok(());
        };
        tx.rollback()
            .await
            .map_err(|e| ParticipantError::Storage(anyhow::Error::from(e)))?;
        state.phase = Phase::RolledBack;
        Ok(())
    }
}

#[async_trait]
impl TransactionalCityStore for PostgresCityStore {
    async fn create_city(
        &self,
        descriptor: &CityDescriptor,
        created_by: &str,
    ) -> Result<City, CityStoreError> {
        descriptor.validate().map_err(CityStoreError::Validation)?;

        let mut state = self.state.lock().await;
        let tx = state.tx.as_mut().ok_or(CityStoreError::NotPrepared)?;

        let city = City::from_descriptor(descriptor, created_by);

        sqlx::query(
            r#"
            INSERT INTO cities (id, name, area, population, capital, government, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(city.id)
        .bind(&city.name)
        .bind(city.area)
        .bind(city.population)
        .bind(city.capital)
        .bind(&city.government)
        .bind(&city.created_by)
        .bind(city.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_insert_error(e, &city.name))?;

        sqlx::query(
            r#"
            INSERT INTO city_audit (id, city_id, operation, performed_by, created_at)
            VALUES ($1, $2, 'CREATE', $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(city.id)
        .bind(&city.created_by)
        .bind(city.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| CityStoreError::Internal(anyhow::Error::from(e)))?;

        Ok(city)
    }
}
