//! Schema and metadata types.

use serde::{Deserialize, Serialize};

/// Introspected table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name (unique within the run).
    pub name: String,

    /// Column definitions in ordinal position order.
    pub columns: Vec<ColumnSpec>,

    /// Primary key column names. Each must name an existing column.
    pub primary_key: Vec<String>,

    /// Foreign key definitions in catalog discovery order.
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSchema {
    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Column names in ordinal position order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Names of tables this one references through its foreign keys, deduped,
    /// discovery order preserved. Self-references are dropped.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for fk in &self.foreign_keys {
            if fk.ref_table != self.name && !refs.contains(&fk.ref_table) {
                refs.push(fk.ref_table.clone());
            }
        }
        refs
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Declared type as reported by the source catalog. Passed through to the
    /// target DDL untouched; dialect compatibility is the caller's problem.
    pub data_type: String,

    /// Maximum length for character types. Mutually exclusive with
    /// precision/scale.
    pub max_length: Option<i32>,

    /// Numeric precision.
    pub precision: Option<i32>,

    /// Numeric scale.
    pub scale: Option<i32>,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default expression, opaque passthrough text from the source catalog.
    pub default_expr: Option<String>,
}

/// Foreign key metadata: local column -> referenced table/column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Local column name. Must exist in the owning table's columns.
    pub column: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column name.
    pub ref_column: String,
}

/// Narrow catalog view consumed by the table classifier: a table name and
/// its (column name, data type) pairs.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Table name.
    pub name: String,

    /// Columns as (name, data_type), ordinal order.
    pub columns: Vec<(String, String)>,
}
