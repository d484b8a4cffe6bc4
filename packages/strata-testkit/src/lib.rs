//! Test support: an in-memory document store, recording collaborators, configuration fixtures
//! and throwaway Postgres databases.

mod database;
mod error;
mod fakes;
mod fixtures;
mod memory;

pub use database::{TestDatabase, env_dsn};
pub use error::{Error, Result};
pub use fakes::{RecordingDiagnostics, StaticIdentity};
pub use fixtures::{service, test_config};
pub use memory::MemoryStore;
