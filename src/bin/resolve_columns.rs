//! Standalone column-name resolution job. Reads the cached metadata
//! dictionaries and rewrites the column names of every synced wide table,
//! saving each under a `_resolved` suffix. Run after one or more syncs.
//! Database connection comes from DB_HOST/DB_PORT/DB_USER/DB_PASSWORD/DB_NAME.

use std::process::ExitCode;

use dhis2_warehouse::config::database_url_from_env;
use dhis2_warehouse::resolve::resolve_column_names;
use dhis2_warehouse::store::PgStore;

#[tokio::main]
async fn main() -> ExitCode {
    let database_url = match database_url_from_env() {
        Ok(url) => url,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let store = match PgStore::connect(&database_url).await {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    match resolve_column_names(&store).await {
        Ok(report) => {
            if report.failed.is_empty() {
                println!("all {} tables processed successfully", report.resolved.len());
            } else {
                eprintln!("the following tables failed to process:");
                for (table, reason) in &report.failed {
                    eprintln!("  - {table}: {reason}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("resolution aborted: {err}");
            ExitCode::FAILURE
        }
    }
}
