//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
source:
  host: localhost
  database: clinic_legacy
  user: postgres
  password: password
target:
  host: localhost
  database: clinic_hmis
  user: postgres
  password: password
"#;

    #[test]
    fn test_minimal_yaml_applies_defaults() {
        let config = Config::from_yaml(MINIMAL_YAML).unwrap();
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.maintenance_db, "postgres");
        assert_eq!(config.migration.batch_size, 1000);
        assert_eq!(config.migration.extension, "uuid-ossp");
        assert!(config.migration.tables.is_none());
    }

    #[test]
    fn test_explicit_table_list_parsed() {
        let yaml = format!(
            "{}migration:\n  tables: [patients, payments]\n  batch_size: 500\n",
            MINIMAL_YAML
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(
            config.migration.tables,
            Some(vec!["patients".to_string(), "payments".to_string()])
        );
        assert_eq!(config.migration.batch_size, 500);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        assert!(Config::from_yaml("source: [").is_err());
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(Config::from_yaml("source:\n  host: localhost\n").is_err());
    }
}
