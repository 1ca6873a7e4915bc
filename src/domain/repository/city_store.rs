use async_trait::async_trait;

use crate::domain::entity::{City, CityDescriptor};
use crate::domain::twophase::Participant;

#[derive(Debug, thiserror::Error)]
pub enum CityStoreError {
    #[error("city '{0}' already exists")]
    Duplicate(String),

    #[error("{0}")]
    Validation(String),

    #[error("city store has no open transaction")]
    NotPrepared,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// TransactionalCityStore はリレーショナルストアであり、同時に
/// 2つ目のトランザクション参加者でもある。
///
/// `create_city` は prepare と commit の間でのみ有効。ここで作成された行は
/// 参加者のトランザクション内にステージングされ、コーディネータが
/// コミットして初めて可視になる。
#[async_trait]
pub trait TransactionalCityStore: Participant {
    async fn create_city(
        &self,
        descriptor: &CityDescriptor,
        created_by: &str,
    ) -> Result<City, CityStoreError>;
}
