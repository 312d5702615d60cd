//! DDL synthesis from introspected schemas.
//!
//! Type names and default expressions are carried through verbatim from the
//! source catalog, so the output is only valid against a PostgreSQL target.

use crate::source::TableSchema;

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a `CREATE TABLE IF NOT EXISTS` statement for a schema.
///
/// Column order follows the catalog's ordinal order. A single-column primary
/// key becomes an inline `PRIMARY KEY` modifier; a composite key becomes one
/// trailing table constraint.
pub fn create_table_sql(schema: &TableSchema) -> String {
    let single_pk = if schema.primary_key.len() == 1 {
        Some(schema.primary_key[0].as_str())
    } else {
        None
    };

    let mut clauses: Vec<String> = schema
        .columns
        .iter()
        .map(|col| {
            let mut clause = format!("{} {}", col.name, col.data_type);

            if let Some(len) = col.max_length {
                clause.push_str(&format!("({})", len));
            } else if col.data_type == "numeric" {
                if let (Some(precision), Some(scale)) = (col.precision, col.scale) {
                    clause.push_str(&format!("({},{})", precision, scale));
                }
            }

            if single_pk == Some(col.name.as_str()) {
                clause.push_str(" PRIMARY KEY");
            }
            if !col.is_nullable {
                clause.push_str(" NOT NULL");
            }
            if let Some(default) = &col.default_expr {
                clause.push_str(&format!(" DEFAULT {}", default));
            }
            clause
        })
        .collect();

    if schema.primary_key.len() > 1 {
        clauses.push(format!("PRIMARY KEY ({})", schema.primary_key.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        schema.name,
        clauses.join(", ")
    )
}

/// Render one `ALTER TABLE ... ADD CONSTRAINT` statement per foreign key.
///
/// Constraint names are derived from the table and column, so re-running them
/// against an existing constraint fails cleanly rather than duplicating it.
pub fn foreign_key_sql(schema: &TableSchema) -> Vec<String> {
    schema
        .foreign_keys
        .iter()
        .map(|fk| {
            format!(
                "ALTER TABLE {} ADD CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {}({})",
                schema.name, schema.name, fk.column, fk.column, fk.ref_table, fk.ref_column
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ColumnSpec, ForeignKeySpec};

    fn column(name: &str, data_type: &str) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            data_type: data_type.to_string(),
            max_length: None,
            precision: None,
            scale: None,
            is_nullable: true,
            default_expr: None,
        }
    }

    #[test]
    fn test_users_table_exact_output() {
        let schema = TableSchema {
            name: "users".to_string(),
            columns: vec![
                ColumnSpec {
                    name: "id".to_string(),
                    data_type: "uuid".to_string(),
                    max_length: None,
                    precision: None,
                    scale: None,
                    is_nullable: false,
                    default_expr: None,
                },
                ColumnSpec {
                    name: "name".to_string(),
                    data_type: "varchar".to_string(),
                    max_length: Some(50),
                    precision: None,
                    scale: None,
                    is_nullable: true,
                    default_expr: None,
                },
            ],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![],
        };

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS users (id uuid PRIMARY KEY NOT NULL, name varchar(50))"
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let schema = TableSchema {
            name: "payments".to_string(),
            columns: vec![column("id", "integer"), column("amount", "numeric")],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![],
        };
        assert_eq!(create_table_sql(&schema), create_table_sql(&schema));
    }

    #[test]
    fn test_composite_primary_key_single_clause() {
        let schema = TableSchema {
            name: "visit_labs".to_string(),
            columns: vec![column("visit_id", "uuid"), column("lab_id", "uuid")],
            primary_key: vec!["visit_id".to_string(), "lab_id".to_string()],
            foreign_keys: vec![],
        };

        let sql = create_table_sql(&schema);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS visit_labs (visit_id uuid, lab_id uuid, PRIMARY KEY (visit_id, lab_id))"
        );
        // Exactly one PRIMARY KEY clause, never per-column modifiers.
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_numeric_precision_and_scale() {
        let mut amount = column("amount", "numeric");
        amount.precision = Some(10);
        amount.scale = Some(2);
        let schema = TableSchema {
            name: "invoices".to_string(),
            columns: vec![amount],
            primary_key: vec![],
            foreign_keys: vec![],
        };

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS invoices (amount numeric(10,2))"
        );
    }

    #[test]
    fn test_length_wins_over_precision() {
        let mut col = column("code", "varchar");
        col.max_length = Some(20);
        col.precision = Some(10);
        col.scale = Some(0);
        let schema = TableSchema {
            name: "codes".to_string(),
            columns: vec![col],
            primary_key: vec![],
            foreign_keys: vec![],
        };

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS codes (code varchar(20))"
        );
    }

    #[test]
    fn test_precision_ignored_for_non_numeric() {
        // integer columns report precision in the catalog but must not render it
        let mut col = column("age", "integer");
        col.precision = Some(32);
        col.scale = Some(0);
        let schema = TableSchema {
            name: "people".to_string(),
            columns: vec![col],
            primary_key: vec![],
            foreign_keys: vec![],
        };

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS people (age integer)"
        );
    }

    #[test]
    fn test_not_null_and_default_ordering() {
        let mut col = column("created_at", "timestamp");
        col.is_nullable = false;
        col.default_expr = Some("now()".to_string());
        let schema = TableSchema {
            name: "audit".to_string(),
            columns: vec![col],
            primary_key: vec![],
            foreign_keys: vec![],
        };

        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS audit (created_at timestamp NOT NULL DEFAULT now())"
        );
    }

    #[test]
    fn test_foreign_key_statements() {
        let schema = TableSchema {
            name: "patients".to_string(),
            columns: vec![column("id", "uuid"), column("user_id", "uuid")],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![ForeignKeySpec {
                column: "user_id".to_string(),
                ref_table: "users".to_string(),
                ref_column: "id".to_string(),
            }],
        };

        assert_eq!(
            foreign_key_sql(&schema),
            vec![
                "ALTER TABLE patients ADD CONSTRAINT fk_patients_user_id \
                 FOREIGN KEY (user_id) REFERENCES users(id)"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_no_foreign_keys_no_statements() {
        let schema = TableSchema {
            name: "users".to_string(),
            columns: vec![column("id", "uuid")],
            primary_key: vec![],
            foreign_keys: vec![],
        };
        assert!(foreign_key_sql(&schema).is_empty());
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
