//! Postgres-backed [`TableStore`]. All SQL is runtime-checked
//! (`sqlx::query`, not the compile-time macros) so no database is needed at
//! build time. Every cell this pipeline handles is an observed string value,
//! so all columns are created as TEXT.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::store::{StoreError, TableStore};
use crate::table::DataTable;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|err| StoreError::sql("failed to connect to database", err))?;
        Ok(Self { pool })
    }
}

/// Double-quotes an identifier, escaping embedded quotes. Resolved column
/// names can carry characters beyond `[a-z0-9_]`, so every identifier goes
/// through this.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl TableStore for PgStore {
    async fn replace_table(&self, name: &str, table: &DataTable) -> Result<(), StoreError> {
        if table.columns.is_empty() {
            return Err(StoreError::sql(
                format!("cannot create table '{name}'"),
                "a table needs at least one column",
            ));
        }
        let context = |step: &str| format!("failed to {step} table '{name}'");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::sql(context("replace"), err))?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)))
            .execute(&mut *tx)
            .await
            .map_err(|err| StoreError::sql(context("drop"), err))?;

        let column_defs: Vec<String> = table
            .columns
            .iter()
            .map(|column| format!("{} TEXT", quote_ident(column)))
            .collect();
        sqlx::query(&format!(
            "CREATE TABLE {} ({})",
            quote_ident(name),
            column_defs.join(", ")
        ))
        .execute(&mut *tx)
        .await
        .map_err(|err| StoreError::sql(context("create"), err))?;

        let placeholders: Vec<String> = (1..=table.columns.len())
            .map(|i| format!("${i}"))
            .collect();
        let column_list: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(name),
            column_list.join(", "),
            placeholders.join(", ")
        );
        for row in &table.rows {
            let mut query = sqlx::query(&insert);
            for cell in row {
                query = query.bind(cell.as_deref());
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|err| StoreError::sql(context("insert into"), err))?;
        }

        tx.commit()
            .await
            .map_err(|err| StoreError::sql(context("commit"), err))
    }

    async fn read_table(&self, name: &str) -> Result<DataTable, StoreError> {
        // Column names come from the catalog so an empty table still reads
        // back with its schema intact.
        let column_rows = sqlx::query(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::sql(format!("failed to describe table '{name}'"), err))?;

        if column_rows.is_empty() {
            return Err(StoreError::MissingTable {
                name: name.to_string(),
            });
        }
        let columns: Vec<String> = column_rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<_, _>>()
            .map_err(|err| StoreError::sql(format!("failed to describe table '{name}'"), err))?;

        let select_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let data_rows = sqlx::query(&format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            quote_ident(name)
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::sql(format!("failed to read table '{name}'"), err))?;

        let mut table = DataTable::new(columns);
        for row in data_rows {
            let mut cells = Vec::with_capacity(table.columns.len());
            for index in 0..table.columns.len() {
                let cell: Option<String> = row
                    .try_get(index)
                    .map_err(|err| StoreError::sql(format!("failed to read table '{name}'"), err))?;
                cells.push(cell);
            }
            table.rows.push(cells);
        }
        Ok(table)
    }

    async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::sql("failed to list tables", err))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<_, _>>()
            .map_err(|err| StoreError::sql("failed to list tables", err))
    }
}

#[cfg(test)]
mod tests {
    use super::quote_ident;

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("plain_name"), "\"plain_name\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
