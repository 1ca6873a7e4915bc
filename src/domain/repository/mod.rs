pub mod city_store;
pub mod import_record_repository;
pub mod object_storage;

pub use city_store::{CityStoreError, TransactionalCityStore};
pub use import_record_repository::ImportRecordRepository;
pub use object_storage::{ObjectInfo, ObjectStorage};
