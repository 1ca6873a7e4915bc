use async_trait::async_trait;

use crate::domain::entity::{City, CityDescriptor};
use crate::domain::repository::{CityStoreError, TransactionalCityStore};
use crate::domain::twophase::{Participant, ParticipantError, Phase};

struct MemState {
    phase: Phase,
    staged: Vec<City>,
    committed: Vec<City>,
}

/// InMemoryCityStore はローカル開発・テスト用のトランザクショナルストア。
/// prepare と commit の間にステージングされた行はコミットまで不可視で、
/// rollback で破棄される。Postgres参加者と同じ振る舞いに揃えている。
pub struct InMemoryCityStore {
    state: tokio::sync::Mutex<MemState>,
}

impl InMemoryCityStore {
    pub fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(MemState {
                phase: Phase::Unprepared,
                staged: Vec::new(),
                committed: Vec::new(),
            }),
        }
    }

    pub async fn committed_cities(&self) -> Vec<City> {
        self.state.lock().await.committed.clone()
    }
}

impl Default for InMemoryCityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Participant for InMemoryCityStore {
    fn name(&self) -> &'static str {
        "relational-store"
    }

    async fn prepare(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Prepared {
            return Err(ParticipantError::InvalidPhase {
                participant: self.name(),
                operation: "prepare",
                phase: state.phase,
            });
        }
        state.staged.clear();
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
        let mut staged = std::mem::take(&mut state.staged);
        state.committed.append(&mut staged);
        state.phase = Phase::Committed;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ParticipantError> {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Prepared {
            state.staged.clear();
            state.phase = Phase::RolledBack;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionalCityStore for InMemoryCityStore {
    async fn create_city(
        &self,
        descriptor: &CityDescriptor,
        created_by: &str,
    ) -> Result<City, CityStoreError> {
        descriptor.validate().map_err(CityStoreError::Validation)?;

        let mut state = self.state.lock().await;
        if state.phase != Phase::Prepared {
            return Err(CityStoreError::NotPrepared);
        }
        let exists = state
            .staged
            .iter()
            .chain(state.committed.iter())
            .any(|city| city.name == descriptor.name);
        if exists {
            return Err(CityStoreError::Duplicate(descriptor.name.clone()));
        }

        let city = City::from_descriptor(descriptor, created_by);
        state.staged.push(city.clone());
        Ok(city)
    }
}
