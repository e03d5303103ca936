//! Postgres persistence for the allocator.
//!
//! [`Database`] owns the pool and hands out the two store handles:
//! [`PgAllocationStore`] for the transactional write path and [`PgRoster`]
//! for the read-only user table. SQLx runs without compile-time macros, so
//! no database is needed to build.

mod allocations;
mod error;
mod roster;

pub use allocations::PgAllocationStore;
pub use error::DbError;
pub use roster::PgRoster;

use std::path::PathBuf;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/mentorship";

/// Pool settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl DbConfig {
    /// `DATABASE_URL`, `DB_MAX_CONNECTIONS` and `DB_MIN_CONNECTIONS` from
    /// `lookup`. Unparseable, empty or inverted pool sizes are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let defaults = Self::default();
        let max_connections = pool_size(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?;
        let min_connections = pool_size(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?;

        if max_connections == 0 || min_connections > max_connections {
            return Err(DbError::PoolSizeRange {
                min: min_connections,
                max: max_connections,
            });
        }

        Ok(Self {
            max_connections,
            min_connections,
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            ..defaults
        })
    }
}

fn pool_size(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
    default: u32,
) -> Result<u32, DbError> {
    match lookup(variable) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DbError::InvalidPoolSize {
                variable,
                value: raw,
            }),
    }
}

/// Shared connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Opening database pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query; used by the readiness probe.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(DbError::Ping)
    }

    /// Apply pending migrations from the first readable search path.
    ///
    /// Only dev mode and tests call this; production applies migrations out
    /// of band.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let searched = migration_search_paths();
        for dir in &searched {
            let Ok(migrator) = Migrator::new(dir.clone()).await else {
                continue;
            };
            info!(
                dir = %dir.display(),
                migrations = migrator.iter().count(),
                "Applying migrations"
            );
            migrator.run(&self.pool).await.map_err(DbError::Migrate)?;
            return Ok(());
        }
        Err(DbError::NoMigrations { searched })
    }

    pub fn allocation_store(&self) -> PgAllocationStore {
        PgAllocationStore::new(self.pool.clone())
    }

    pub fn roster(&self) -> PgRoster {
        PgRoster::new(self.pool.clone())
    }
}

fn migration_search_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("migrations"),
        PathBuf::from("services/allocator/migrations"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    ]
}
