pub mod city_in_memory;
pub mod city_postgres;
pub mod import_record_in_memory;
pub mod import_record_postgres;

pub use city_in_memory::InMemoryCityStore;
pub use city_postgres::PostgresCityStore;
pub use import_record_in_memory::InMemoryImportRecordRepository;
pub use import_record_postgres::PostgresImportRecordRepository;
