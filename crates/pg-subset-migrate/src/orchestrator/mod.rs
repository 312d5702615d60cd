//! Migration orchestrator. Drives the end-to-end workflow: bootstrap the
//! target, select tables from the source catalog, order them by dependency,
//! then create and populate each in turn.

use crate::config::Config;
use crate::ddl;
use crate::error::Result;
use crate::plan::{DependencyGraph, MigrationPlan};
use crate::select::{ExplicitSelector, KeywordSelector, TableSelector};
use crate::source::{PgSourcePool, TableInfo, TableSchema};
use crate::target::{self, PgTargetPool};
use crate::transfer::TransferEngine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Mutable state for one migration run, threaded through the workflow.
#[derive(Debug, Clone)]
pub struct MigrationRun {
    pub started_at: DateTime<Utc>,
    pub tables_total: usize,
    pub tables_migrated: usize,
    /// Rows counted in the source across all attempted tables.
    pub rows_total: i64,
    pub rows_migrated: i64,
    pub failed_tables: Vec<String>,
}

impl MigrationRun {
    fn start(tables_total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            tables_total,
            tables_migrated: 0,
            rows_total: 0,
            rows_migrated: 0,
            failed_tables: Vec::new(),
        }
    }

    fn record_success(&mut self, rows_observed: i64, rows_written: i64) {
        self.tables_migrated += 1;
        self.rows_total += rows_observed;
        self.rows_migrated += rows_written;
    }

    fn record_failure(&mut self, table: &str) {
        self.failed_tables.push(table.to_string());
    }

    fn finish(self) -> MigrationResult {
        let completed_at = Utc::now();
        let duration_seconds =
            (completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;

        let status = if self.failed_tables.is_empty() {
            "completed"
        } else if self.tables_migrated > 0 {
            "completed_with_errors"
        } else {
            "failed"
        };

        let rows_per_second = if duration_seconds > 0.0 {
            (self.rows_migrated as f64 / duration_seconds) as i64
        } else {
            0
        };

        MigrationResult {
            status: status.to_string(),
            started_at: self.started_at,
            completed_at,
            duration_seconds,
            tables_total: self.tables_total,
            tables_migrated: self.tables_migrated,
            tables_failed: self.failed_tables.len(),
            rows_total: self.rows_total,
            rows_migrated: self.rows_migrated,
            rows_per_second,
            failed_tables: self.failed_tables,
        }
    }
}

/// Final summary of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub tables_total: usize,
    pub tables_migrated: usize,
    pub tables_failed: usize,
    pub rows_total: i64,
    pub rows_migrated: i64,
    pub rows_per_second: i64,
    pub failed_tables: Vec<String>,
}

impl MigrationResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// What a run would do, without touching the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    /// Tables chosen by the selector, selection order.
    pub selected: Vec<String>,

    /// The same tables in migration order.
    pub order: Vec<String>,

    /// CREATE TABLE statement per table, migration order.
    pub ddl: Vec<String>,
}

/// Coordinates one migration from a validated config.
pub struct Orchestrator {
    config: Config,
    selector: Option<Box<dyn TableSelector + Send + Sync>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            selector: None,
        }
    }

    /// Replace the default table selection strategy.
    pub fn with_selector(mut self, selector: Box<dyn TableSelector + Send + Sync>) -> Self {
        self.selector = Some(selector);
        self
    }

    fn default_selector(&self) -> Box<dyn TableSelector + Send + Sync> {
        match &self.config.migration.tables {
            Some(tables) => Box::new(ExplicitSelector::new(tables.clone())),
            None => Box::new(KeywordSelector),
        }
    }

    /// Select and order tables against the source, without writing anything.
    pub async fn plan(&self) -> Result<PlanReport> {
        let source = PgSourcePool::connect(&self.config.source).await?;
        let (selected, schemas) = self.select_and_introspect(&source).await?;
        let plan = resolve_order(&selected, &schemas);

        let ddl = plan
            .tables()
            .iter()
            .filter_map(|t| schemas.get(t))
            .map(ddl::create_table_sql)
            .collect();

        Ok(PlanReport {
            selected,
            order: plan.tables().to_vec(),
            ddl,
        })
    }

    /// Verify that both databases are reachable.
    pub async fn health_check(&self) -> Result<()> {
        let source = PgSourcePool::connect(&self.config.source).await?;
        let tables = source.list_tables().await?;
        info!("Source reachable, {} tables visible", tables.len());

        if target::database_exists(&self.config.target).await? {
            info!("Target database '{}' exists", self.config.target.database);
        } else {
            info!(
                "Target database '{}' does not exist yet; a run will create it",
                self.config.target.database
            );
        }
        Ok(())
    }

    /// Run the full migration.
    pub async fn run(&self) -> Result<MigrationResult> {
        target::ensure_database(&self.config.target).await?;
        let target = PgTargetPool::connect(&self.config.target).await?;
        target
            .create_extension(&self.config.migration.extension)
            .await?;

        let source = PgSourcePool::connect(&self.config.source).await?;
        let (selected, schemas) = self.select_and_introspect(&source).await?;

        let mut run = MigrationRun::start(selected.len());
        for table in &selected {
            if !schemas.contains_key(table) {
                run.record_failure(table);
            }
        }

        let plan = resolve_order(&selected, &schemas);
        info!("Migration order: {:?}", plan.tables());

        let engine = TransferEngine::new(&target, self.config.migration.batch_size);

        for table in plan.tables() {
            let schema = match schemas.get(table) {
                Some(schema) => schema,
                None => continue,
            };
            match self.migrate_table(&source, &target, &engine, schema).await {
                Ok((observed, written)) => {
                    run.record_success(observed, written);
                    info!("Migrated {} ({} rows)", table, written);
                }
                Err(e) => {
                    error!("Failed to migrate {}: {}", table, e.format_detailed());
                    run.record_failure(table);
                    if e.is_fatal() {
                        return Err(e);
                    }
                }
            }
        }

        let result = run.finish();
        info!(
            "Migration {}: {}/{} tables, {} rows in {:.1}s ({} rows/s)",
            result.status,
            result.tables_migrated,
            result.tables_total,
            result.rows_migrated,
            result.duration_seconds,
            result.rows_per_second
        );
        if !result.failed_tables.is_empty() {
            warn!("Failed tables: {:?}", result.failed_tables);
        }
        Ok(result)
    }

    /// Build the catalog, apply the selector, and introspect the selection.
    /// A table that fails introspection is dropped from the schema map and
    /// later counted as failed.
    async fn select_and_introspect(
        &self,
        source: &PgSourcePool,
    ) -> Result<(Vec<String>, HashMap<String, TableSchema>)> {
        let tables = source.list_tables().await?;
        let mut catalog = Vec::with_capacity(tables.len());
        for table in &tables {
            // A table whose columns cannot be listed stays in the catalog
            // with none; it can still be selected by name.
            let columns = match source.list_columns(table).await {
                Ok(columns) => columns,
                Err(e) => {
                    warn!("Could not list columns for {}: {}", table, e);
                    Vec::new()
                }
            };
            catalog.push(TableInfo {
                name: table.clone(),
                columns,
            });
        }

        let selected = match &self.selector {
            Some(selector) => selector.select(&catalog),
            None => self.default_selector().select(&catalog),
        };

        let mut schemas = HashMap::new();
        for table in &selected {
            match source.table_schema(table).await {
                Ok(schema) if schema.columns.is_empty() => {
                    warn!("Skipping {}: no columns in source catalog", table);
                }
                Ok(schema) => {
                    schemas.insert(table.clone(), schema);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", table, e);
                }
            }
        }

        Ok((selected, schemas))
    }

    async fn migrate_table(
        &self,
        source: &PgSourcePool,
        target: &PgTargetPool,
        engine: &TransferEngine<'_>,
        schema: &TableSchema,
    ) -> Result<(i64, i64)> {
        let create_sql = ddl::create_table_sql(schema);
        target.create_table(&schema.name, &create_sql).await?;

        let fk_statements = ddl::foreign_key_sql(schema);
        target
            .apply_foreign_keys(&schema.name, &fk_statements)
            .await?;

        let rows = source.fetch_rows(schema).await?;
        let source_count = source.count_rows(&schema.name).await?;
        let columns = schema.column_names();

        let stats = engine
            .copy_table(&schema.name, &columns, rows, source_count)
            .await?;
        Ok((source_count, stats.rows_written as i64))
    }
}

fn resolve_order(selected: &[String], schemas: &HashMap<String, TableSchema>) -> MigrationPlan {
    // Ordering only considers tables that introspected cleanly.
    let ordered_input: Vec<String> = selected
        .iter()
        .filter(|t| schemas.contains_key(*t))
        .cloned()
        .collect();
    let graph = DependencyGraph::build(&ordered_input, schemas);
    MigrationPlan::resolve(&graph)
}
