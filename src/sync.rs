//! Dataset synchronizer: per configured dataset, fetch data values for each
//! org unit, reshape to wide form and replace the target table. Partial
//! success is normal; only the initial dataset and org-unit listings are
//! allowed to abort the run.

use std::collections::HashMap;
use std::fmt;

use crate::client::{ClientError, Dhis2Api, NamedResource};
use crate::config::SyncConfig;
use crate::identifier::sanitize_table_name;
use crate::metadata::{refresh_dictionaries, DictionaryOutcome};
use crate::store::TableStore;
use crate::table::{reshape_wide, CompositeKey, LongRow};

/// Display-name fallback for org units missing from the global listing.
pub const UNKNOWN_FACILITY: &str = "Unknown Facility";

/// One org-unit fetch that failed. The dataset keeps syncing without it.
#[derive(Debug)]
pub struct UnitFailure {
    pub org_unit: String,
    pub error: ClientError,
}

/// What happened to one configured dataset.
#[derive(Debug)]
pub enum DatasetOutcome {
    /// Wide table written.
    Stored {
        table: String,
        rows: usize,
        unit_failures: Vec<UnitFailure>,
    },
    /// Dataset id absent from the remote listing; nothing written.
    SkippedUnknown,
    /// No data points in range across all org units; nothing written.
    SkippedEmpty { unit_failures: Vec<UnitFailure> },
    /// Reshape succeeded but the table write failed.
    StoreFailed {
        table: String,
        reason: String,
        unit_failures: Vec<UnitFailure>,
    },
}

#[derive(Debug)]
pub struct SyncReport {
    pub dictionaries: Vec<DictionaryOutcome>,
    pub datasets: Vec<(String, DatasetOutcome)>,
}

impl SyncReport {
    /// True when every dataset stored cleanly and no unit fetch failed.
    pub fn fully_succeeded(&self) -> bool {
        self.datasets.iter().all(|(_, outcome)| {
            matches!(outcome, DatasetOutcome::Stored { unit_failures, .. } if unit_failures.is_empty())
        })
    }
}

/// Fatal sync failure: one of the required top-level listings could not be
/// fetched.
#[derive(Debug)]
pub enum SyncError {
    Client(ClientError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        Self::Client(err)
    }
}

pub struct DatasetSync<'a, A, S> {
    api: &'a A,
    store: &'a S,
    config: &'a SyncConfig,
}

impl<'a, A: Dhis2Api, S: TableStore> DatasetSync<'a, A, S> {
    pub fn new(api: &'a A, store: &'a S, config: &'a SyncConfig) -> Self {
        Self { api, store, config }
    }

    /// Runs the whole sync pass sequentially: dictionaries first, then the
    /// two required listings, then each configured dataset in document order
    /// with each org unit in configured order. Sequencing is what makes
    /// "first value wins" in the reshape well-defined.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let dictionaries = refresh_dictionaries(self.api, self.store).await;
        for outcome in &dictionaries {
            println!("{outcome}");
        }

        println!("fetching dataset metadata...");
        let datasets = self.api.named_refs(NamedResource::DataSets).await?;
        let dataset_lookup: HashMap<&str, &str> = datasets
            .iter()
            .map(|d| (d.id.as_str(), d.name.as_str()))
            .collect();

        println!("fetching organisation units...");
        let org_units = self.api.named_refs(NamedResource::OrganisationUnits).await?;
        let org_lookup: HashMap<&str, &str> = org_units
            .iter()
            .map(|ou| (ou.id.as_str(), ou.name.as_str()))
            .collect();

        let total = self.config.datasets.len();
        let mut outcomes = Vec::with_capacity(total);
        for (position, entry) in self.config.datasets.iter().enumerate() {
            let Some(dataset_name) = dataset_lookup.get(entry.dataset.as_str()) else {
                eprintln!("skipping dataset {} (not found in DHIS2)", entry.dataset);
                outcomes.push((entry.dataset.clone(), DatasetOutcome::SkippedUnknown));
                continue;
            };
            let table_name =
                sanitize_table_name(&format!("dataset_{dataset_name}"), Some(&entry.dataset));
            println!(
                "{} of {}: processing dataset '{}' -> table '{}'",
                position + 1,
                total,
                dataset_name,
                table_name
            );

            let (long_rows, unit_failures) = self
                .fetch_dataset_rows(entry, dataset_name, &org_lookup)
                .await;

            if long_rows.is_empty() {
                eprintln!("  no data found for dataset '{dataset_name}'");
                outcomes.push((
                    entry.dataset.clone(),
                    DatasetOutcome::SkippedEmpty { unit_failures },
                ));
                continue;
            }

            let wide = reshape_wide(&long_rows);
            match self.store.replace_table(&table_name, &wide).await {
                Ok(()) => {
                    println!("  stored {} rows in table '{}'", wide.rows.len(), table_name);
                    outcomes.push((
                        entry.dataset.clone(),
                        DatasetOutcome::Stored {
                            table: table_name,
                            rows: wide.rows.len(),
                            unit_failures,
                        },
                    ));
                }
                Err(err) => {
                    eprintln!("  failed to store table '{table_name}': {err}");
                    outcomes.push((
                        entry.dataset.clone(),
                        DatasetOutcome::StoreFailed {
                            table: table_name,
                            reason: err.to_string(),
                            unit_failures,
                        },
                    ));
                }
            }
        }

        Ok(SyncReport {
            dictionaries,
            datasets: outcomes,
        })
    }

    /// Fetches and flattens the data values of every configured org unit for
    /// one dataset. A failing unit contributes zero rows and a recorded
    /// failure; the remaining units still run.
    async fn fetch_dataset_rows(
        &self,
        entry: &crate::config::DatasetEntry,
        dataset_name: &str,
        org_lookup: &HashMap<&str, &str>,
    ) -> (Vec<LongRow>, Vec<UnitFailure>) {
        let mut long_rows = Vec::new();
        let mut unit_failures = Vec::new();

        for org_unit in &entry.org_units {
            let facility = org_lookup
                .get(org_unit.as_str())
                .map(|name| (*name).to_string())
                .unwrap_or_else(|| UNKNOWN_FACILITY.to_string());
            println!("  fetching org unit '{facility}' ({org_unit})");
            match self
                .api
                .data_value_set(
                    &entry.dataset,
                    org_unit,
                    self.config.start_date,
                    self.config.end_date,
                )
                .await
            {
                Ok(values) => {
                    for value in values {
                        long_rows.push(LongRow {
                            period: value.period,
                            facility: facility.clone(),
                            report_name: dataset_name.to_string(),
                            key: CompositeKey {
                                data_element: value.data_element,
                                category_combo: value.category_option_combo,
                            },
                            value: value.value,
                        });
                    }
                }
                Err(error) => {
                    eprintln!("    error fetching data for org unit {org_unit}: {error}");
                    unit_failures.push(UnitFailure {
                        org_unit: org_unit.clone(),
                        error,
                    });
                }
            }
        }
        (long_rows, unit_failures)
    }
}
