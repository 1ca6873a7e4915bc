pub mod import_batch;
pub mod list_imports;
pub mod sweep_stale;

pub use import_batch::{ImportBatchUseCase, ImportError};
pub use list_imports::{ImportHistoryEntry, ListImportsUseCase};
pub use sweep_stale::{SweepReport, SweepStaleUseCase};
