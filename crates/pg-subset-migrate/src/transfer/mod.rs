//! Batched data copy into the target, one transaction per table.

use crate::error::{MigrateError, Result};
use crate::target::{build_insert_sql, PgTargetPool, SqlValue};
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

/// Outcome of copying one table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferStats {
    pub rows_written: u64,
    pub batches: u64,
}

/// Writes extracted rows into target tables in fixed-size batches.
pub struct TransferEngine<'a> {
    target: &'a PgTargetPool,
    batch_size: usize,
}

impl<'a> TransferEngine<'a> {
    pub fn new(target: &'a PgTargetPool, batch_size: usize) -> Self {
        Self { target, batch_size }
    }

    /// Copy all rows for one table inside a single transaction.
    ///
    /// Any batch failure aborts the whole table: the error propagates and the
    /// transaction rolls back on drop, leaving the table empty rather than
    /// partially loaded. After commit the target count is compared against
    /// `source_count`; a mismatch is logged, not failed, since the loaded
    /// rows are already durable. Empty input succeeds without touching the
    /// target at all.
    pub async fn copy_table(
        &self,
        table: &str,
        columns: &[String],
        rows: Vec<Vec<SqlValue>>,
        source_count: i64,
    ) -> Result<TransferStats> {
        if rows.is_empty() {
            debug!("{}: no rows to copy", table);
            return Ok(TransferStats::default());
        }

        let total_rows = rows.len();
        let total_batches = batch_count(total_rows, self.batch_size);
        let mut stats = TransferStats::default();

        let mut client = self.target.get().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::data(table, e))?;

        for chunk in rows.chunks(self.batch_size) {
            let (sql, params) = build_insert_sql(table, columns, chunk);
            let param_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect();

            tx.execute(sql.as_str(), &param_refs)
                .await
                .map_err(|e| MigrateError::data(table, e))?;

            stats.rows_written += chunk.len() as u64;
            stats.batches += 1;
            debug!(
                "{}: batch {}/{} written ({}/{} rows)",
                table, stats.batches, total_batches, stats.rows_written, total_rows
            );
        }

        tx.commit()
            .await
            .map_err(|e| MigrateError::data(table, e))?;

        info!(
            "{}: committed {} rows in {} batches",
            table, stats.rows_written, stats.batches
        );

        self.verify_count(table, source_count).await?;
        Ok(stats)
    }

    async fn verify_count(&self, table: &str, source_count: i64) -> Result<()> {
        let target_count = self.target.count_rows(table).await?;
        if target_count != source_count {
            warn!(
                "{}: row count mismatch after copy (source {}, target {})",
                table, source_count, target_count
            );
        } else {
            debug!("{}: row count verified ({})", table, target_count);
        }
        Ok(())
    }
}

fn batch_count(total_rows: usize, batch_size: usize) -> usize {
    total_rows.div_ceil(batch_size)
}
