//! Command dispatch: `sync`, `resolve` and `check-config`, with exit codes
//! 0 (success), 1 (runtime failure) and 2 (usage or configuration error).

use crate::client::Dhis2Client;
use crate::config::{database_url_from_env, Credentials, SyncConfig};
use crate::resolve::resolve_column_names;
use crate::store::PgStore;
use crate::sync::{DatasetOutcome, DatasetSync, SyncReport};

const DEFAULT_CONFIG_PATH: &str = "config/sync.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sync,
    Resolve,
    CheckConfig,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("sync") => Some(Command::Sync),
        Some("resolve") => Some(Command::Resolve),
        Some("check-config") => Some(Command::CheckConfig),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Sync) => handle_sync(args),
        Some(Command::Resolve) => handle_resolve(),
        Some(Command::CheckConfig) => handle_check_config(args),
        None => {
            eprintln!("usage: dhis2-warehouse <sync|resolve|check-config> [config-path]");
            2
        }
    }
}

fn config_path(args: &[String]) -> &str {
    args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH)
}

fn handle_sync(args: &[String]) -> i32 {
    let config = match SyncConfig::from_yaml_file(config_path(args)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };
    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };
    let database_url = match database_url_from_env() {
        Ok(url) => url,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return 1;
        }
    };
    runtime.block_on(async {
        let client = match Dhis2Client::new(&config.base_url, credentials) {
            Ok(client) => client,
            Err(err) => {
                eprintln!("{err}");
                return 1;
            }
        };
        let store = match PgStore::connect(&database_url).await {
            Ok(store) => store,
            Err(err) => {
                eprintln!("{err}");
                return 1;
            }
        };
        match DatasetSync::new(&client, &store, &config).run().await {
            Ok(report) => {
                print_sync_summary(&report);
                0
            }
            Err(err) => {
                eprintln!("sync aborted: {err}");
                1
            }
        }
    })
}

fn handle_resolve() -> i32 {
    let database_url = match database_url_from_env() {
        Ok(url) => url,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return 1;
        }
    };
    runtime.block_on(async {
        let store = match PgStore::connect(&database_url).await {
            Ok(store) => store,
            Err(err) => {
                eprintln!("{err}");
                return 1;
            }
        };
        match resolve_column_names(&store).await {
            Ok(report) => {
                if report.failed.is_empty() {
                    println!(
                        "all {} tables processed successfully",
                        report.resolved.len()
                    );
                } else {
                    eprintln!("the following tables failed to process:");
                    for (table, reason) in &report.failed {
                        eprintln!("  - {table}: {reason}");
                    }
                }
                0
            }
            Err(err) => {
                eprintln!("resolution aborted: {err}");
                1
            }
        }
    })
}

fn handle_check_config(args: &[String]) -> i32 {
    match SyncConfig::from_yaml_file(config_path(args)) {
        Ok(config) => {
            let org_unit_count: usize = config.datasets.iter().map(|d| d.org_units.len()).sum();
            println!(
                "configuration ok: {} datasets, {} org unit assignments, {} to {}",
                config.datasets.len(),
                org_unit_count,
                config.start_date,
                config.end_date
            );
            0
        }
        Err(err) => {
            eprintln!("{err}");
            2
        }
    }
}

fn print_sync_summary(report: &SyncReport) {
    println!("sync summary:");
    for (dataset_id, outcome) in &report.datasets {
        match outcome {
            DatasetOutcome::Stored {
                table,
                rows,
                unit_failures,
            } => {
                if unit_failures.is_empty() {
                    println!("  {dataset_id}: stored {rows} rows in '{table}'");
                } else {
                    println!(
                        "  {dataset_id}: stored {rows} rows in '{table}' ({} org unit fetches failed)",
                        unit_failures.len()
                    );
                }
            }
            DatasetOutcome::SkippedUnknown => {
                println!("  {dataset_id}: skipped (not found in DHIS2)");
            }
            DatasetOutcome::SkippedEmpty { unit_failures } => {
                println!(
                    "  {dataset_id}: skipped (no data in range, {} org unit fetches failed)",
                    unit_failures.len()
                );
            }
            DatasetOutcome::StoreFailed { table, reason, .. } => {
                println!("  {dataset_id}: failed to store '{table}': {reason}");
            }
        }
    }
    if report.fully_succeeded() {
        println!("all datasets synced successfully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command(&args(&["bin", "sync"])), Some(Command::Sync));
        assert_eq!(
            parse_command(&args(&["bin", "resolve"])),
            Some(Command::Resolve)
        );
        assert_eq!(
            parse_command(&args(&["bin", "check-config"])),
            Some(Command::CheckConfig)
        );
    }

    #[test]
    fn rejects_unknown_commands() {
        assert_eq!(parse_command(&args(&["bin"])), None);
        assert_eq!(parse_command(&args(&["bin", "serve"])), None);
    }
}
