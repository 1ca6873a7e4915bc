pub mod config;
pub mod database;
pub mod memory_storage;
pub mod s3_storage;
