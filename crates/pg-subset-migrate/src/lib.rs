//! # pg-subset-migrate
//!
//! Selective PostgreSQL-to-PostgreSQL table migration library.
//!
//! Copies a subset of tables (schema and data) from a source database to a
//! target database:
//!
//! - **Heuristic table selection** by name/column keyword matching, with a
//!   swappable selector abstraction
//! - **Schema introspection** (columns, primary keys, foreign keys) from the
//!   source catalog
//! - **FK-aware ordering** via a cycle-tolerant topological sort, so
//!   referenced tables are created and populated first
//! - **Batched, transactional copy**: one transaction per table, with a
//!   post-commit row-count verification
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_subset_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> pg_subset_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let result = Orchestrator::new(config).run().await?;
//!     println!("Migrated {} rows", result.rows_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod ddl;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod select;
pub mod source;
pub mod target;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, MigrationRun, Orchestrator, PlanReport};
pub use plan::{DependencyGraph, MigrationPlan};
pub use select::{ExplicitSelector, KeywordSelector, TableSelector};
pub use source::{ColumnSpec, ForeignKeySpec, PgSourcePool, TableInfo, TableSchema};
pub use target::{PgTargetPool, SqlNullType, SqlValue};
pub use transfer::{TransferEngine, TransferStats};
