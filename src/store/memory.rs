//! In-memory [`TableStore`] with the same full-replace semantics as the
//! Postgres implementation. Backs the integration tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::store::{StoreError, TableStore};
use crate::table::DataTable;

#[derive(Debug, Default)]
pub struct MemStore {
    tables: Mutex<BTreeMap<String, DataTable>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables
            .lock()
            .map(|tables| tables.contains_key(name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl TableStore for MemStore {
    async fn replace_table(&self, name: &str, table: &DataTable) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::sql("in-memory store", "lock poisoned"))?;
        tables.insert(name.to_string(), table.clone());
        Ok(())
    }

    async fn read_table(&self, name: &str) -> Result<DataTable, StoreError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::sql("in-memory store", "lock poisoned"))?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::MissingTable {
                name: name.to_string(),
            })
    }

    async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::sql("in-memory store", "lock poisoned"))?;
        Ok(tables.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_overwrites_prior_contents() {
        let store = MemStore::new();
        let first = DataTable {
            columns: vec!["id".to_string()],
            rows: vec![vec![Some("a".to_string())]],
        };
        let second = DataTable {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![],
        };
        store.replace_table("t", &first).await.expect("write");
        store.replace_table("t", &second).await.expect("rewrite");
        let read = store.read_table("t").await.expect("read");
        assert_eq!(read.columns.len(), 2);
        assert!(read.rows.is_empty());
    }

    #[tokio::test]
    async fn missing_table_is_a_distinct_error() {
        let store = MemStore::new();
        let err = store.read_table("absent").await.expect_err("should miss");
        assert!(matches!(err, StoreError::MissingTable { .. }));
    }
}
