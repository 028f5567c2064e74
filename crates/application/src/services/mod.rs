pub mod calculation_engine;
pub mod recalculation_executor;
pub mod snapshot_service;

pub use calculation_engine::TableCalculationEngine;
pub use recalculation_executor::RecalculationExecutor;
pub use snapshot_service::{compute_checksum, RestoreOutcome, SnapshotService};
