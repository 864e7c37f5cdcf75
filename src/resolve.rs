//! Column-name resolution: a batch pass over previously synced wide tables
//! that rewrites `{dataElementId}_{categoryOptionComboId}` column names into
//! human-readable names using the cached dictionaries, then saves each table
//! under a `_resolved` suffix.

use std::collections::{HashMap, HashSet};

use crate::identifier::{disambiguate_column, shorten_column_name};
use crate::metadata::load_dictionary;
use crate::store::{
    is_dictionary_table, StoreError, TableStore, CATEGORY_OPTION_COMBOS_TABLE,
    DATA_ELEMENTS_TABLE, RESOLVED_SUFFIX,
};
use crate::table::DataTable;

#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Source tables whose resolved counterpart was written.
    pub resolved: Vec<String>,
    /// Source tables that failed, with the reason. A bad table never aborts
    /// the batch.
    pub failed: Vec<(String, String)>,
}

/// Computes the new column names for one table, in order. A name without a
/// separator is kept verbatim. Otherwise the part before the first `_` is
/// looked up as a data-element id and the remainder (verbatim, may itself
/// contain `_`) as a category-option-combo id; unknown ids fall back to the
/// raw identifier. Spaces become underscores, names are bounded to the
/// 63-character identifier ceiling, and collisions within the table get
/// numeric suffixes, so the output never has two columns with one name.
pub fn build_rename_map(
    columns: &[String],
    data_elements: &HashMap<String, String>,
    combos: &HashMap<String, String>,
) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut renamed = Vec::with_capacity(columns.len());
    for column in columns {
        let candidate = match column.split_once('_') {
            Some((element_id, combo_id)) => {
                let element_part = data_elements
                    .get(element_id)
                    .map(String::as_str)
                    .unwrap_or(element_id)
                    .replace(' ', "_");
                let combo_part = combos
                    .get(combo_id)
                    .map(String::as_str)
                    .unwrap_or(combo_id)
                    .replace(' ', "_");
                shorten_column_name(&format!("{element_part}_{combo_part}"))
            }
            None => column.clone(),
        };
        let unique = disambiguate_column(&candidate, &taken);
        taken.insert(unique.clone());
        renamed.push(unique);
    }
    renamed
}

/// Resolves every synced wide table: reads it back, rewrites its column
/// names and replaces `{name}_resolved`. The dictionary tables themselves
/// and already-resolved tables are excluded; the latter keeps the pass
/// re-runnable without stacking suffixes.
pub async fn resolve_column_names(store: &impl TableStore) -> Result<ResolveReport, StoreError> {
    let data_elements = load_dictionary(store, DATA_ELEMENTS_TABLE).await?;
    let combos = load_dictionary(store, CATEGORY_OPTION_COMBOS_TABLE).await?;

    let mut report = ResolveReport::default();
    for name in store.table_names().await? {
        if is_dictionary_table(&name) || name.ends_with(RESOLVED_SUFFIX) {
            continue;
        }
        println!("processing table: {name}");
        match resolve_one(store, &name, &data_elements, &combos).await {
            Ok(resolved_name) => {
                println!("saved resolved table as: {resolved_name}");
                report.resolved.push(name);
            }
            Err(err) => {
                eprintln!("failed to process {name}: {err}");
                report.failed.push((name, err.to_string()));
            }
        }
    }
    Ok(report)
}

async fn resolve_one(
    store: &impl TableStore,
    name: &str,
    data_elements: &HashMap<String, String>,
    combos: &HashMap<String, String>,
) -> Result<String, StoreError> {
    let table = store.read_table(name).await?;
    let renamed = DataTable {
        columns: build_rename_map(&table.columns, data_elements, combos),
        rows: table.rows,
    };
    let resolved_name = format!("{name}{RESOLVED_SUFFIX}");
    store.replace_table(&resolved_name, &renamed).await?;
    Ok(resolved_name)
}
