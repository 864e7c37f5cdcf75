//! Resolver batch-pass behaviour over the in-memory store: exclusions,
//! re-runnability and the fatal missing-dictionary path.

use dhis2_warehouse::resolve::resolve_column_names;
use dhis2_warehouse::store::{
    MemStore, StoreError, TableStore, CATEGORY_OPTION_COMBOS_TABLE, DATA_ELEMENTS_TABLE,
};
use dhis2_warehouse::table::DataTable;

fn dictionary(records: &[(&str, &str)]) -> DataTable {
    DataTable {
        columns: vec!["id".to_string(), "name".to_string()],
        rows: records
            .iter()
            .map(|(id, name)| vec![Some((*id).to_string()), Some((*name).to_string())])
            .collect(),
    }
}

fn wide_table() -> DataTable {
    DataTable {
        columns: vec![
            "date".to_string(),
            "facility".to_string(),
            "report_name".to_string(),
            "abc123_def456".to_string(),
        ],
        rows: vec![vec![
            Some("202401".to_string()),
            Some("Chileka HC".to_string()),
            Some("Malaria Report".to_string()),
            Some("10".to_string()),
        ]],
    }
}

async fn seeded_store() -> MemStore {
    let store = MemStore::new();
    store
        .replace_table(
            DATA_ELEMENTS_TABLE,
            &dictionary(&[("abc123", "Malaria Cases")]),
        )
        .await
        .expect("seed data elements");
    store
        .replace_table(
            CATEGORY_OPTION_COMBOS_TABLE,
            &dictionary(&[("def456", "Under 5")]),
        )
        .await
        .expect("seed combos");
    store
        .replace_table("dataset_malaria_report", &wide_table())
        .await
        .expect("seed wide table");
    store
}

#[tokio::test]
async fn resolves_tables_and_skips_dictionaries() {
    let store = seeded_store().await;
    let report = resolve_column_names(&store).await.expect("should resolve");

    assert_eq!(report.resolved, vec!["dataset_malaria_report".to_string()]);
    assert!(report.failed.is_empty());
    assert!(store.contains("dataset_malaria_report_resolved"));
    assert!(!store.contains("dhis2_data_elements_resolved"));
    assert!(!store.contains("dhis2_category_option_combos_resolved"));

    let resolved = store
        .read_table("dataset_malaria_report_resolved")
        .await
        .expect("read resolved");
    assert_eq!(resolved.columns[3], "Malaria_Cases_Under_5");
    assert_eq!(resolved.rows, wide_table().rows);
}

#[tokio::test]
async fn second_run_does_not_stack_suffixes() {
    let store = seeded_store().await;
    resolve_column_names(&store).await.expect("first run");
    let report = resolve_column_names(&store).await.expect("second run");

    assert_eq!(report.resolved, vec!["dataset_malaria_report".to_string()]);
    assert!(!store.contains("dataset_malaria_report_resolved_resolved"));
}

#[tokio::test]
async fn resolution_replaces_a_stale_resolved_table() {
    let store = seeded_store().await;
    resolve_column_names(&store).await.expect("first run");

    // New sync rewrites the source table with an extra column; the next
    // resolution pass must fully replace the resolved counterpart.
    let mut updated = wide_table();
    updated.columns.push("abc123_zzz999".to_string());
    updated.rows[0].push(Some("4".to_string()));
    store
        .replace_table("dataset_malaria_report", &updated)
        .await
        .expect("rewrite source");

    resolve_column_names(&store).await.expect("second run");
    let resolved = store
        .read_table("dataset_malaria_report_resolved")
        .await
        .expect("read resolved");
    assert_eq!(resolved.columns.len(), 5);
    assert_eq!(resolved.columns[4], "Malaria_Cases_zzz999");
}

#[tokio::test]
async fn missing_dictionary_is_fatal() {
    let store = MemStore::new();
    store
        .replace_table("dataset_malaria_report", &wide_table())
        .await
        .expect("seed wide table");

    let err = resolve_column_names(&store)
        .await
        .expect_err("should abort without dictionaries");
    assert!(matches!(err, StoreError::MissingTable { .. }));
}
