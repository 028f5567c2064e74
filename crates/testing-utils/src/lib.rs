//! # Standings Testing Utils
//!
//! Shared testing utilities for the standings workspace.
//!
//! - **Builders**: matches, standings rows and a seeded league fixture
//! - **Mocks**: failure-injecting store and scripted/recording executors
//! - **Helpers**: logging setup and polling assertions for async tests
//!
//! ```toml
//! [dev-dependencies]
//! standings-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
