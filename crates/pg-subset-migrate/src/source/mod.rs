//! Source database catalog introspection and row extraction.

mod types;

pub use types::{ColumnSpec, ForeignKeySpec, TableInfo, TableSchema};

use crate::config::SourceConfig;
use crate::ddl::quote_ident;
use crate::error::{MigrateError, Result};
use crate::target::{SqlNullType, SqlValue};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

const POOL_SIZE: usize = 4;

/// Connection pool against the source database.
pub struct PgSourcePool {
    pool: Pool,
}

impl PgSourcePool {
    /// Connect to the source database and verify the connection.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(POOL_SIZE)
            .build()
            .map_err(|e| MigrateError::connection(e, "creating source pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(e, "connecting to source database"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to source: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self { pool })
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(e, context))
    }

    /// List base tables in the public schema, alphabetically.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("listing source tables").await?;

        let query = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = 'public'
            ORDER BY table_name
        "#;

        let rows = client.query(query, &[]).await?;
        let tables = rows
            .iter()
            .map(|row| row.get::<_, String>(0))
            .collect::<Vec<_>>();

        info!("Source catalog lists {} tables", tables.len());
        Ok(tables)
    }

    /// Column names and type names for one table, ordinal order.
    pub async fn list_columns(&self, table: &str) -> Result<Vec<(String, String)>> {
        let client = self.client("listing source columns").await?;

        let query = r#"
            SELECT column_name, udt_name
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
        "#;

        let rows = client.query(query, &[&table]).await?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    /// Full introspected schema for one table: columns, primary key,
    /// foreign keys.
    pub async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let client = self.client("introspecting source table").await?;

        let column_query = r#"
            SELECT
                column_name,
                udt_name,
                character_maximum_length::int4,
                numeric_precision::int4,
                numeric_scale::int4,
                CASE WHEN is_nullable = 'YES' THEN true ELSE false END,
                column_default
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
        "#;

        let rows = client.query(column_query, &[&table]).await?;
        if rows.is_empty() {
            // Table missing from the catalog. Not an error: callers get an
            // empty schema and decide what to do with it.
            debug!("{}: not present in information_schema", table);
            return Ok(TableSchema {
                name: table.to_string(),
                columns: Vec::new(),
                primary_key: Vec::new(),
                foreign_keys: Vec::new(),
            });
        }

        let columns: Vec<ColumnSpec> = rows
            .iter()
            .map(|row| ColumnSpec {
                name: row.get(0),
                data_type: row.get(1),
                max_length: row.get(2),
                precision: row.get(3),
                scale: row.get(4),
                is_nullable: row.get(5),
                default_expr: row.get(6),
            })
            .collect();

        let pk_query = r#"
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_name = tc.constraint_name
             AND kcu.table_schema = tc.table_schema
            WHERE tc.table_schema = 'public'
              AND tc.table_name = $1
              AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
        "#;

        let rows = client.query(pk_query, &[&table]).await?;
        let primary_key: Vec<String> = rows.iter().map(|row| row.get(0)).collect();

        for pk_col in &primary_key {
            if !columns.iter().any(|c| &c.name == pk_col) {
                return Err(MigrateError::catalog(
                    table,
                    format!("primary key column '{}' missing from column list", pk_col),
                ));
            }
        }

        let fk_query = r#"
            SELECT
                kcu.column_name,
                ccu.table_name AS ref_table,
                ccu.column_name AS ref_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON kcu.constraint_name = tc.constraint_name
             AND kcu.table_schema = tc.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.table_schema = tc.table_schema
            WHERE tc.table_schema = 'public'
              AND tc.table_name = $1
              AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;

        let rows = client.query(fk_query, &[&table]).await?;
        let foreign_keys: Vec<ForeignKeySpec> = rows
            .iter()
            .map(|row| ForeignKeySpec {
                column: row.get(0),
                ref_table: row.get(1),
                ref_column: row.get(2),
            })
            .collect();

        debug!(
            "Introspected {}: {} columns, {} pk columns, {} foreign keys",
            table,
            columns.len(),
            primary_key.len(),
            foreign_keys.len()
        );

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            primary_key,
            foreign_keys,
        })
    }

    /// Read every row of a table, converting each cell by its catalog type.
    pub async fn fetch_rows(&self, schema: &TableSchema) -> Result<Vec<Vec<SqlValue>>> {
        let client = self.client("reading source rows").await?;

        for col in &schema.columns {
            if !has_native_conversion(&col.data_type) {
                warn!(
                    "{}.{}: no native conversion for type '{}'; values are read \
                     as text and unreadable cells become NULL",
                    schema.name, col.name, col.data_type
                );
            }
        }

        let column_list = schema
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {} FROM {}",
            column_list,
            quote_ident(&schema.name)
        );

        let rows = client.query(&query, &[]).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(schema.columns.len());
            for (idx, col) in schema.columns.iter().enumerate() {
                values.push(convert_pg_row_value(&row, idx, &col.data_type));
            }
            result.push(values);
        }

        debug!("Fetched {} rows from {}", result.len(), schema.name);
        Ok(result)
    }

    /// Exact row count for a table.
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let client = self.client("counting source rows").await?;
        let query = format!("SELECT COUNT(*)::int8 FROM {}", quote_ident(table));
        let row = client.query_one(&query, &[]).await?;
        Ok(row.get::<_, i64>(0))
    }
}

/// Convert one cell to an owned `SqlValue` keyed on the catalog type name.
/// Unknown types fall back to text representation.
fn convert_pg_row_value(row: &tokio_postgres::Row, idx: usize, data_type: &str) -> SqlValue {
    let dt = data_type.to_lowercase();

    match dt.as_str() {
        "bool" | "boolean" => row
            .try_get::<_, bool>(idx)
            .ok()
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
        "int2" | "smallint" => row
            .try_get::<_, i16>(idx)
            .ok()
            .map(SqlValue::I16)
            .unwrap_or(SqlValue::Null(SqlNullType::I16)),
        "int4" | "integer" | "int" => row
            .try_get::<_, i32>(idx)
            .ok()
            .map(SqlValue::I32)
            .unwrap_or(SqlValue::Null(SqlNullType::I32)),
        "int8" | "bigint" => row
            .try_get::<_, i64>(idx)
            .ok()
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null(SqlNullType::I64)),
        "float4" | "real" => row
            .try_get::<_, f32>(idx)
            .ok()
            .map(SqlValue::F32)
            .unwrap_or(SqlValue::Null(SqlNullType::F32)),
        "float8" | "double precision" => row
            .try_get::<_, f64>(idx)
            .ok()
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null(SqlNullType::F64)),
        "uuid" => row
            .try_get::<_, uuid::Uuid>(idx)
            .ok()
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid)),
        "timestamp" | "timestamp without time zone" => row
            .try_get::<_, chrono::NaiveDateTime>(idx)
            .ok()
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
        "timestamptz" | "timestamp with time zone" => row
            .try_get::<_, chrono::DateTime<chrono::FixedOffset>>(idx)
            .ok()
            .map(SqlValue::DateTimeOffset)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTimeOffset)),
        "date" => row
            .try_get::<_, chrono::NaiveDate>(idx)
            .ok()
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null(SqlNullType::Date)),
        "time" | "time without time zone" => row
            .try_get::<_, chrono::NaiveTime>(idx)
            .ok()
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Null(SqlNullType::Time)),
        "bytea" => row
            .try_get::<_, Vec<u8>>(idx)
            .ok()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
        "numeric" | "decimal" => row
            .try_get::<_, rust_decimal::Decimal>(idx)
            .ok()
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),
        "json" => row
            .try_get::<_, serde_json::Value>(idx)
            .ok()
            .map(SqlValue::Json)
            .unwrap_or(SqlValue::Null(SqlNullType::Json)),
        "jsonb" => row
            .try_get::<_, serde_json::Value>(idx)
            .ok()
            .map(SqlValue::Jsonb)
            .unwrap_or(SqlValue::Null(SqlNullType::Jsonb)),
        _ => row
            .try_get::<_, String>(idx)
            .ok()
            .map(SqlValue::String)
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
    }
}

/// Whether a catalog type name has a dedicated `SqlValue` conversion. Types
/// outside this set go through the text fallback.
fn has_native_conversion(data_type: &str) -> bool {
    matches!(
        data_type.to_lowercase().as_str(),
        "bool"
            | "boolean"
            | "int2"
            | "smallint"
            | "int4"
            | "integer"
            | "int"
            | "int8"
            | "bigint"
            | "float4"
            | "real"
            | "float8"
            | "double precision"
            | "uuid"
            | "timestamp"
            | "timestamp without time zone"
            | "timestamptz"
            | "timestamp with time zone"
            | "date"
            | "time"
            | "time without time zone"
            | "bytea"
            | "numeric"
            | "decimal"
            | "json"
            | "jsonb"
            // Textual types land in the fallback arm on purpose.
            | "varchar"
            | "character varying"
            | "text"
            | "char"
            | "bpchar"
            | "character"
            | "name"
    )
}
