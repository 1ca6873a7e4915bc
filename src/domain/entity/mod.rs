pub mod city;
pub mod import_record;

pub use city::{City, CityDescriptor};
pub use import_record::{ImportRecord, ImportStatus};
