//! Metadata dictionary pass: fetches the data-element and
//! category-option-combo listings and caches each verbatim as a two-column
//! `(id, name)` table. Failures here never abort a sync run.

use std::collections::HashMap;
use std::fmt;

use crate::client::{Dhis2Api, NamedResource};
use crate::store::{StoreError, TableStore, CATEGORY_OPTION_COMBOS_TABLE, DATA_ELEMENTS_TABLE};
use crate::table::DataTable;

/// Outcome of refreshing one dictionary. Discriminated so callers can react
/// without parsing log text.
#[derive(Debug)]
pub enum DictionaryOutcome {
    Stored { table: String, records: usize },
    Empty { table: String },
    Failed { table: String, reason: String },
}

impl fmt::Display for DictionaryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored { table, records } => {
                write!(f, "stored {records} records in table '{table}'")
            }
            Self::Empty { table } => write!(f, "warning: no records found for '{table}'"),
            Self::Failed { table, reason } => {
                write!(f, "failed to refresh '{table}': {reason}")
            }
        }
    }
}

const DICTIONARIES: [(NamedResource, &str); 2] = [
    (NamedResource::DataElements, DATA_ELEMENTS_TABLE),
    (NamedResource::CategoryOptionCombos, CATEGORY_OPTION_COMBOS_TABLE),
];

/// Refreshes both dictionaries, replacing any prior contents. Empty listings
/// skip persistence; fetch or store failures are recorded and the next
/// dictionary still runs.
pub async fn refresh_dictionaries(
    api: &impl Dhis2Api,
    store: &impl TableStore,
) -> Vec<DictionaryOutcome> {
    let mut outcomes = Vec::with_capacity(DICTIONARIES.len());
    for (resource, table_name) in DICTIONARIES {
        println!("downloading {} metadata...", resource.label());
        let refs = match api.named_refs(resource).await {
            Ok(refs) => refs,
            Err(err) => {
                outcomes.push(DictionaryOutcome::Failed {
                    table: table_name.to_string(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if refs.is_empty() {
            outcomes.push(DictionaryOutcome::Empty {
                table: table_name.to_string(),
            });
            continue;
        }
        let mut table = DataTable::new(vec!["id".to_string(), "name".to_string()]);
        for named in &refs {
            table
                .rows
                .push(vec![Some(named.id.clone()), Some(named.name.clone())]);
        }
        match store.replace_table(table_name, &table).await {
            Ok(()) => outcomes.push(DictionaryOutcome::Stored {
                table: table_name.to_string(),
                records: refs.len(),
            }),
            Err(err) => outcomes.push(DictionaryOutcome::Failed {
                table: table_name.to_string(),
                reason: err.to_string(),
            }),
        }
    }
    outcomes
}

/// Loads a cached dictionary back as an `id -> trimmed name` map.
pub async fn load_dictionary(
    store: &impl TableStore,
    table_name: &str,
) -> Result<HashMap<String, String>, StoreError> {
    let table = store.read_table(table_name).await?;
    let id_index = column_index(&table, "id", table_name)?;
    let name_index = column_index(&table, "name", table_name)?;
    let mut map = HashMap::with_capacity(table.rows.len());
    for row in &table.rows {
        if let (Some(Some(id)), Some(Some(name))) = (row.get(id_index), row.get(name_index)) {
            map.insert(id.clone(), name.trim().to_string());
        }
    }
    Ok(map)
}

fn column_index(table: &DataTable, column: &str, table_name: &str) -> Result<usize, StoreError> {
    table
        .columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| {
            StoreError::sql(
                format!("dictionary table '{table_name}'"),
                format!("missing '{column}' column"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[tokio::test]
    async fn load_dictionary_trims_names() {
        let store = MemStore::new();
        let table = DataTable {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Some("abc123".to_string()), Some("  Malaria Cases ".to_string())],
                vec![Some("def456".to_string()), Some("Under 5".to_string())],
                vec![None, Some("orphan".to_string())],
            ],
        };
        store
            .replace_table(DATA_ELEMENTS_TABLE, &table)
            .await
            .expect("write");
        let map = load_dictionary(&store, DATA_ELEMENTS_TABLE)
            .await
            .expect("load");
        assert_eq!(map.len(), 2);
        assert_eq!(map["abc123"], "Malaria Cases");
    }

    #[tokio::test]
    async fn load_dictionary_rejects_malformed_table() {
        let store = MemStore::new();
        let table = DataTable {
            columns: vec!["identifier".to_string()],
            rows: vec![],
        };
        store
            .replace_table(CATEGORY_OPTION_COMBOS_TABLE, &table)
            .await
            .expect("write");
        let err = load_dictionary(&store, CATEGORY_OPTION_COMBOS_TABLE)
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("missing 'id' column"));
    }
}
