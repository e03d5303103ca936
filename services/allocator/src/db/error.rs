//! Pool and migration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{variable} must be a non-negative integer, got '{value}'")]
    InvalidPoolSize {
        variable: &'static str,
        value: String,
    },

    #[error("pool bounds are inverted or empty (min {min}, max {max})")]
    PoolSizeRange { min: u32, max: u32 },

    #[error("cannot open a connection pool: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("database did not answer a ping: {0}")]
    Ping(#[source] sqlx::Error),

    #[error("applying migrations failed: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),

    /// None of the search paths held a readable migrations directory. Start
    /// the binary from the repo root or from `services/allocator`.
    #[error("no migrations directory found (searched {})", display_paths(.searched))]
    NoMigrations { searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
