//! Table classification - picks the migration-relevant subset of tables.
//!
//! Selection is a swappable capability: the orchestrator only sees the
//! [`TableSelector`] trait, so the keyword heuristics can be replaced by an
//! explicit allow-list (or anything else) without touching the dependency or
//! DDL logic.

use crate::source::TableInfo;
use tracing::{debug, info, warn};

/// Strategy for choosing which tables to migrate.
pub trait TableSelector {
    /// Return the subset of `catalog` considered migration-relevant, in a
    /// deterministic order. Must be idempotent for a fixed catalog snapshot.
    fn select(&self, catalog: &[TableInfo]) -> Vec<String>;
}

/// Table-name keywords for person/patient-centric tables.
const PERSON_KEYWORDS: &[&str] = &[
    "patient",
    "person",
    "client",
    "member",
    "customer",
    "admission",
    "visit",
];

/// Column names that mark a table as related to a person record. Matched by
/// exact membership, not substring.
const PERSON_COLUMN_NAMES: &[&str] = &[
    "patient_id",
    "person_id",
    "client_id",
    "member_id",
    "customer_id",
    "admission_id",
    "visit_id",
];

/// Table-name keywords for billing/financial tables.
const FINANCIAL_KEYWORDS: &[&str] = &[
    "payment",
    "invoice",
    "bill",
    "charge",
    "fee",
    "transaction",
    "receipt",
    "finance",
];

/// Table-name keywords for clinical tables.
const MEDICAL_KEYWORDS: &[&str] = &[
    "diagnosis",
    "prescription",
    "medication",
    "lab",
    "test",
    "result",
    "vitals",
    "treatment",
];

/// Literal table names tried when no keyword matches anything.
const COMMON_TABLE_NAMES: &[&str] = &[
    "patients",
    "patient",
    "persons",
    "person",
    "clients",
    "client",
    "payments",
    "payment",
    "invoices",
    "invoice",
    "bills",
    "bill",
    "charges",
    "charge",
    "fees",
    "fee",
    "transactions",
    "transaction",
];

/// How many tables the last-resort fallback takes, in catalog order.
const FALLBACK_TABLE_COUNT: usize = 5;

/// Keyword-based heuristic selector (the default strategy).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordSelector;

impl KeywordSelector {
    fn name_matches(name: &str, keywords: &[&str]) -> bool {
        let lower = name.to_lowercase();
        keywords.iter().any(|kw| lower.contains(kw))
    }

    fn columns_match(info: &TableInfo) -> bool {
        info.columns
            .iter()
            .any(|(col, _)| PERSON_COLUMN_NAMES.contains(&col.to_lowercase().as_str()))
    }

    fn push_unique(selected: &mut Vec<String>, name: &str) {
        if !selected.iter().any(|t| t == name) {
            selected.push(name.to_string());
        }
    }

    fn keyword_passes(catalog: &[TableInfo]) -> Vec<String> {
        let mut selected = Vec::new();

        // Person-related tables: name match first, column match second.
        for info in catalog {
            if Self::name_matches(&info.name, PERSON_KEYWORDS) {
                debug!("Selected by name: {}", info.name);
                Self::push_unique(&mut selected, &info.name);
            } else if Self::columns_match(info) {
                debug!("Selected by column: {}", info.name);
                Self::push_unique(&mut selected, &info.name);
            }
        }

        // Financial tables, then medical tables, appended in catalog order.
        for info in catalog {
            if Self::name_matches(&info.name, FINANCIAL_KEYWORDS) {
                Self::push_unique(&mut selected, &info.name);
            }
        }
        for info in catalog {
            if Self::name_matches(&info.name, MEDICAL_KEYWORDS) {
                Self::push_unique(&mut selected, &info.name);
            }
        }

        selected
    }

    fn common_name_fallback(catalog: &[TableInfo]) -> Vec<String> {
        catalog
            .iter()
            .filter(|info| COMMON_TABLE_NAMES.contains(&info.name.to_lowercase().as_str()))
            .map(|info| info.name.clone())
            .collect()
    }
}

impl TableSelector for KeywordSelector {
    fn select(&self, catalog: &[TableInfo]) -> Vec<String> {
        let mut selected = Self::keyword_passes(catalog);

        // Crude fallbacks for catalogs where nothing matched: well-known
        // table names, then simply the first few tables.
        if selected.is_empty() {
            warn!("No keyword matches; trying common table names");
            selected = Self::common_name_fallback(catalog);
        }
        if selected.is_empty() {
            warn!(
                "No common table names found; falling back to the first {} tables",
                FALLBACK_TABLE_COUNT
            );
            selected = catalog
                .iter()
                .take(FALLBACK_TABLE_COUNT)
                .map(|info| info.name.clone())
                .collect();
        }

        info!("Selected {} of {} tables", selected.len(), catalog.len());
        selected
    }
}

/// Explicit allow-list selector. Keeps the configured order, filtered to
/// tables actually present in the catalog.
#[derive(Debug, Clone)]
pub struct ExplicitSelector {
    tables: Vec<String>,
}

impl ExplicitSelector {
    /// Create a selector from an allow-list of table names.
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }
}

impl TableSelector for ExplicitSelector {
    fn select(&self, catalog: &[TableInfo]) -> Vec<String> {
        let mut selected = Vec::new();
        for name in &self.tables {
            if catalog.iter().any(|info| &info.name == name) {
                if !selected.contains(name) {
                    selected.push(name.clone());
                }
            } else {
                warn!("Configured table not found in source catalog: {}", name);
            }
        }
        info!("Selected {} of {} tables", selected.len(), catalog.len());
        selected
    }
}
