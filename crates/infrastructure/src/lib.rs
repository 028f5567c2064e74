pub mod circuit_breaker;
pub mod circuit_breaker_wrapper;
pub mod file_snapshot_storage;
pub mod memory_store;
pub mod sqlite_store;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitBreakerStats, CircuitBreakerStatus, DATA_STORE,
    SNAPSHOT_STORAGE,
};
pub use circuit_breaker_wrapper::CircuitBreakerSnapshotStorage;
pub use file_snapshot_storage::FileSnapshotStorage;
pub use memory_store::{InMemoryStandingsStore, InMemoryTransaction};
pub use sqlite_store::{SqliteStandingsStore, SqliteStandingsTransaction};
