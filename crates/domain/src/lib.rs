pub mod entities;
pub mod ports;
pub mod repositories;
pub mod standings;
pub mod value_objects;

pub use entities::*;
pub use ports::*;
pub use repositories::*;
pub use standings::{compare_rows, compute_standings, rank_standings, total_points};
pub use standings_errors::{StandingsError, StandingsResult};
pub use value_objects::*;
