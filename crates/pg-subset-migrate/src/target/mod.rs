//! Target database operations: bootstrap, DDL execution, batched inserts.

use crate::config::TargetConfig;
use crate::ddl::quote_ident;
use crate::error::{MigrateError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{types::ToSql, Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

const POOL_SIZE: usize = 4;

/// Owned cell value for rows in flight between source and target.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null(SqlNullType),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Decimal(rust_decimal::Decimal),
    Json(serde_json::Value),
    Jsonb(serde_json::Value),
    DateTime(chrono::NaiveDateTime),
    DateTimeOffset(chrono::DateTime<chrono::FixedOffset>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
}

/// Type hint for NULL values so the cast suffix stays correct.
#[derive(Debug, Clone, Copy)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    Json,
    Jsonb,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

fn target_pg_config(config: &TargetConfig, database: &str) -> PgConfig {
    let mut pg_config = PgConfig::new();
    pg_config.host(&config.host);
    pg_config.port(config.port);
    pg_config.dbname(database);
    pg_config.user(&config.user);
    pg_config.password(&config.password);
    pg_config
}

async fn maintenance_client(config: &TargetConfig) -> Result<tokio_postgres::Client> {
    let pg_config = target_pg_config(config, &config.maintenance_db);
    let (client, connection) = pg_config
        .connect(NoTls)
        .await
        .map_err(|e| MigrateError::connection(e, "connecting to maintenance database"))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("Maintenance connection closed with error: {}", e);
        }
    });
    Ok(client)
}

/// Whether the target database already exists, checked via the maintenance
/// database.
pub async fn database_exists(config: &TargetConfig) -> Result<bool> {
    let client = maintenance_client(config).await?;
    let rows = client
        .query(
            "SELECT 1 FROM pg_database WHERE datname = $1",
            &[&config.database],
        )
        .await?;
    Ok(!rows.is_empty())
}

/// Create the target database if it does not exist.
///
/// Connects to the maintenance database because `CREATE DATABASE` cannot run
/// against the database being created. Failure here is fatal: nothing else
/// can proceed without a target.
pub async fn ensure_database(config: &TargetConfig) -> Result<()> {
    let client = maintenance_client(config).await?;
    let rows = client
        .query(
            "SELECT 1 FROM pg_database WHERE datname = $1",
            &[&config.database],
        )
        .await?;

    if rows.is_empty() {
        let sql = format!("CREATE DATABASE {}", quote_ident(&config.database));
        client
            .execute(&sql, &[])
            .await
            .map_err(|e| MigrateError::connection(e, "creating target database"))?;
        info!("Created target database '{}'", config.database);
    } else {
        debug!("Target database '{}' already exists", config.database);
    }

    Ok(())
}

/// Connection pool against the target database.
pub struct PgTargetPool {
    pool: Pool,
}

impl PgTargetPool {
    /// Connect to the target database and verify the connection.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let pg_config = target_pg_config(config, &config.database);
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(POOL_SIZE)
            .build()
            .map_err(|e| MigrateError::connection(e, "creating target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(e, "connecting to target database"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to target: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self { pool })
    }

    /// Check out a pooled connection.
    pub async fn get(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(e, "getting target connection"))
    }

    /// Install an extension, idempotently.
    pub async fn create_extension(&self, name: &str) -> Result<()> {
        let client = self.get().await?;
        let sql = format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(name));
        client.execute(&sql, &[]).await?;
        debug!("Extension '{}' available", name);
        Ok(())
    }

    /// Execute a CREATE TABLE statement and verify the table exists afterward.
    pub async fn create_table(&self, table: &str, ddl: &str) -> Result<()> {
        let client = self.get().await?;
        client
            .execute(ddl, &[])
            .await
            .map_err(|e| MigrateError::ddl(table, e))?;

        if !self.table_exists(table).await? {
            return Err(MigrateError::ddl(
                table,
                "table missing from target catalog after CREATE TABLE",
            ));
        }

        debug!("Created table {}", table);
        Ok(())
    }

    /// Whether a table exists in the public schema.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let client = self.get().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = 'public' AND table_name = $1
                )",
                &[&table],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Apply FK statements one at a time. A failing constraint is logged and
    /// skipped; the data is already in place and the rest still apply.
    pub async fn apply_foreign_keys(&self, table: &str, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        let client = self.get().await?;

        for sql in statements {
            match client.execute(sql.as_str(), &[]).await {
                Ok(_) => debug!("Applied constraint: {}", sql),
                Err(e) => warn!("Skipping foreign key on {}: {}", table, e),
            }
        }
        Ok(())
    }

    /// Exact row count for a target table.
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let client = self.get().await?;
        let sql = format!("SELECT COUNT(*)::int8 FROM {}", quote_ident(table));
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get::<_, i64>(0))
    }
}

/// Cast suffix appended to each placeholder. Parameters are sent as text, so
/// the server-side cast restores the column type.
pub(crate) fn sql_cast_for_value(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Bool(_) => "::boolean",
        SqlValue::I16(_) => "::smallint",
        SqlValue::I32(_) => "::integer",
        SqlValue::I64(_) => "::bigint",
        SqlValue::F32(_) => "::real",
        SqlValue::F64(_) => "::double precision",
        SqlValue::String(_) => "::text",
        SqlValue::DateTime(_) => "::timestamp",
        SqlValue::DateTimeOffset(_) => "::timestamptz",
        SqlValue::Date(_) => "::date",
        SqlValue::Time(_) => "::time",
        SqlValue::Uuid(_) => "::uuid",
        SqlValue::Decimal(_) => "::numeric",
        SqlValue::Json(_) => "::json",
        SqlValue::Jsonb(_) => "::jsonb",
        SqlValue::Bytes(_) => "::bytea",
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::Bool => "::boolean",
            SqlNullType::I16 => "::smallint",
            SqlNullType::I32 => "::integer",
            SqlNullType::I64 => "::bigint",
            SqlNullType::F32 => "::real",
            SqlNullType::F64 => "::double precision",
            SqlNullType::String => "::text",
            SqlNullType::DateTime => "::timestamp",
            SqlNullType::DateTimeOffset => "::timestamptz",
            SqlNullType::Date => "::date",
            SqlNullType::Time => "::time",
            SqlNullType::Uuid => "::uuid",
            SqlNullType::Decimal => "::numeric",
            SqlNullType::Json => "::json",
            SqlNullType::Jsonb => "::jsonb",
            SqlNullType::Bytes => "::bytea",
        },
    }
}

/// Convert a value to a boxed text parameter. Everything goes over the wire
/// as a string and the placeholder cast does the rest.
pub(crate) fn sql_value_to_param(value: &SqlValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null(_) => Box::new(None::<String>),
        SqlValue::Bool(b) => Box::new(if *b { "t".to_string() } else { "f".to_string() }),
        SqlValue::I16(n) => Box::new(n.to_string()),
        SqlValue::I32(n) => Box::new(n.to_string()),
        SqlValue::I64(n) => Box::new(n.to_string()),
        SqlValue::F32(n) => Box::new(n.to_string()),
        SqlValue::F64(n) => Box::new(n.to_string()),
        SqlValue::String(s) => Box::new(s.clone()),
        SqlValue::Bytes(b) => Box::new(format!("\\x{}", hex::encode(b))),
        SqlValue::Uuid(u) => Box::new(u.to_string()),
        SqlValue::Decimal(d) => Box::new(d.to_string()),
        SqlValue::Json(v) | SqlValue::Jsonb(v) => Box::new(v.to_string()),
        SqlValue::DateTime(dt) => Box::new(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        SqlValue::DateTimeOffset(dt) => Box::new(dt.to_rfc3339()),
        SqlValue::Date(d) => Box::new(d.to_string()),
        SqlValue::Time(t) => Box::new(t.to_string()),
    }
}

/// Build a multi-row parameterized INSERT for one batch.
pub(crate) fn build_insert_sql(
    table: &str,
    cols: &[String],
    rows: &[Vec<SqlValue>],
) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let col_list: String = cols
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut placeholders = Vec::new();
    let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();
    let mut idx = 1;

    // Column casts come from the first row; every row has the same layout.
    let col_casts: Vec<&'static str> = rows
        .first()
        .map(|row| row.iter().map(sql_cast_for_value).collect())
        .unwrap_or_default();

    for row in rows {
        let row_placeholders: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col_idx, value)| {
                let p = format!("${}", idx);
                idx += 1;
                let cast = col_casts
                    .get(col_idx)
                    .copied()
                    .unwrap_or_else(|| sql_cast_for_value(value));
                format!("{}{}", p, cast)
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));

        for value in row {
            params.push(sql_value_to_param(value));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        col_list,
        placeholders.join(", ")
    );

    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_insert_sql_single_row() {
        let rows = vec![vec![
            SqlValue::I32(1),
            SqlValue::String("alice".to_string()),
        ]];
        let (sql, params) = build_insert_sql("users", &cols(&["id", "name"]), &rows);

        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1::integer, $2::text)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_build_insert_sql_multi_row_numbering() {
        let rows = vec![
            vec![SqlValue::I32(1), SqlValue::Bool(true)],
            vec![SqlValue::I32(2), SqlValue::Bool(false)],
            vec![SqlValue::I32(3), SqlValue::Null(SqlNullType::Bool)],
        ];
        let (sql, params) = build_insert_sql("flags", &cols(&["id", "active"]), &rows);

        assert!(sql.contains("($1::integer, $2::boolean)"));
        assert!(sql.contains("($3::integer, $4::boolean)"));
        assert!(sql.contains("($5::integer, $6::boolean)"));
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn test_null_cast_follows_first_row_type() {
        // First row decides the cast; a null in a later row keeps it.
        let rows = vec![
            vec![SqlValue::Uuid(uuid::Uuid::nil())],
            vec![SqlValue::Null(SqlNullType::String)],
        ];
        let (sql, _) = build_insert_sql("t", &cols(&["id"]), &rows);
        assert_eq!(sql.matches("::uuid").count(), 2);
    }

    #[test]
    fn test_cast_for_null_matches_concrete() {
        assert_eq!(
            sql_cast_for_value(&SqlValue::Decimal(rust_decimal::Decimal::ZERO)),
            sql_cast_for_value(&SqlValue::Null(SqlNullType::Decimal))
        );
        assert_eq!(
            sql_cast_for_value(&SqlValue::DateTimeOffset(
                chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap()
            )),
            "::timestamptz"
        );
    }

    #[test]
    fn test_json_values_keep_their_type() {
        let doc = serde_json::json!({"level": "high"});
        let rows = vec![
            vec![SqlValue::Jsonb(doc.clone()), SqlValue::Json(doc)],
            vec![
                SqlValue::Null(SqlNullType::Jsonb),
                SqlValue::Null(SqlNullType::Json),
            ],
        ];
        let (sql, params) = build_insert_sql("events", &cols(&["payload", "raw"]), &rows);

        assert!(sql.contains("($1::jsonb, $2::json)"));
        assert!(sql.contains("($3::jsonb, $4::json)"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_build_insert_sql_empty_rows() {
        let (sql, params) = build_insert_sql("users", &cols(&["id"]), &[]);
        assert_eq!(sql, "INSERT INTO \"users\" (\"id\") VALUES ");
        assert!(params.is_empty());
    }
}
