//! # Lesson Scheduler Testing Utils
//!
//! Shared test doubles for the scheduling workspace:
//!
//! - **In-memory store**: task store with compare-and-set semantics plus the student/test read model
//! - **Collaborator mocks**: recording mail dispatcher, scriptable document renderer, recording observer
//! - **Builders**: due tasks and read-model snapshots with sensible defaults
//! - **SQLite helpers**: seeding the read-model tables of a migrated database
//!
//! ```toml
//! [dev-dependencies]
//! lesson-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
