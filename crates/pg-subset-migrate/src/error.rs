//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database unreachable or bootstrap failure. Always fatal for the run.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Raw driver error from tokio-postgres.
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// Metadata query failed for one table. The table is skipped, the run continues.
    #[error("Catalog query failed for table {table}: {message}")]
    Catalog { table: String, message: String },

    /// Table-creation DDL failed. The table is skipped, the run continues.
    #[error("DDL failed for table {table}: {message}")]
    Ddl { table: String, message: String },

    /// Row insertion failed. The table's transaction is rolled back in full.
    #[error("Data copy failed for table {table}: {message}")]
    Data { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error with context about where it occurred.
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Catalog error for a table.
    pub fn catalog(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Catalog {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Ddl error for a table.
    pub fn ddl(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Ddl {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Data error for a table.
    pub fn data(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Data {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error aborts the whole run (as opposed to one table).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Config(_) | MigrateError::Connection { .. }
        )
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Connection { .. } => 2,
            MigrateError::Catalog { .. } => 3,
            MigrateError::Ddl { .. } => 4,
            MigrateError::Data { .. } => 5,
            MigrateError::Db(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Json(_) => 8,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
