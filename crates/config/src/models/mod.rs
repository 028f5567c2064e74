pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod monitoring;
pub mod queue;
pub mod resilience;
pub mod snapshots;

pub use api_observability::*;
pub use app_config::*;
pub use database::*;
pub use monitoring::*;
pub use queue::*;
pub use resilience::*;
pub use snapshots::*;
