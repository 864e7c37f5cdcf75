//! Table persistence seam. The only write mode is a full replace: tables are
//! dropped and recreated on every write, never appended to or migrated.

use std::fmt;

use async_trait::async_trait;

use crate::table::DataTable;

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

/// Cached data-element dictionary table.
pub const DATA_ELEMENTS_TABLE: &str = "dhis2_data_elements";
/// Cached category-option-combo dictionary table.
pub const CATEGORY_OPTION_COMBOS_TABLE: &str = "dhis2_category_option_combos";
/// Suffix of tables produced by the column-name resolution pass.
pub const RESOLVED_SUFFIX: &str = "_resolved";

/// True for the dictionary tables the resolution pass must not touch.
pub fn is_dictionary_table(name: &str) -> bool {
    name == DATA_ELEMENTS_TABLE || name == CATEGORY_OPTION_COMBOS_TABLE
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Replaces `name` with the given table: drop if present, recreate,
    /// insert all rows. Never merges with prior contents.
    async fn replace_table(&self, name: &str, table: &DataTable) -> Result<(), StoreError>;

    /// Reads a whole table back, column order preserved.
    async fn read_table(&self, name: &str) -> Result<DataTable, StoreError>;

    /// Names of all base tables in the working schema, sorted.
    async fn table_names(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Sql { context: String, detail: String },
    MissingTable { name: String },
}

impl StoreError {
    pub(crate) fn sql(context: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Sql {
            context: context.into(),
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql { context, detail } => write!(f, "{context}: {detail}"),
            Self::MissingTable { name } => write!(f, "table '{name}' does not exist"),
        }
    }
}

impl std::error::Error for StoreError {}
