//! Sync configuration: a YAML document mapping datasets to organisation
//! units plus the date range, and credentials sourced from the process
//! environment.

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;

use chrono::NaiveDate;
use serde::Deserialize;

/// Basic-auth credentials for the DHIS2 API.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Reads `DHIS2_USERNAME` / `DHIS2_PASSWORD` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            username: required_env("DHIS2_USERNAME")?,
            password: required_env("DHIS2_PASSWORD")?,
        })
    }
}

/// One configured dataset and the organisation units to pull it for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetEntry {
    pub dataset: String,
    pub org_units: Vec<String>,
}

/// The full sync configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    pub base_url: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub datasets: Vec<DatasetEntry>,
}

impl SyncConfig {
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.datasets.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one dataset entry is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for entry in &self.datasets {
            if entry.dataset.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "dataset id must not be empty".to_string(),
                ));
            }
            if entry.org_units.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "dataset '{}' has no org units",
                    entry.dataset
                )));
            }
            // A repeated id would silently shadow an earlier entry; reject it.
            if !seen.insert(entry.dataset.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate dataset id '{}' in configuration",
                    entry.dataset
                )));
            }
        }
        Ok(())
    }
}

/// Composes a Postgres connection URL from `DB_HOST`, `DB_PORT`, `DB_USER`,
/// `DB_PASSWORD` and `DB_NAME`.
pub fn database_url_from_env() -> Result<String, ConfigError> {
    let user = required_env("DB_USER")?;
    let password = required_env("DB_PASSWORD")?;
    let host = required_env("DB_HOST")?;
    let port = required_env("DB_PORT")?;
    let name = required_env("DB_NAME")?;
    Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}

fn required_env(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnv(key))
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_yaml::Error),
    Invalid(String),
    MissingEnv(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read configuration file: {err}"),
            Self::Parse(err) => write!(f, "failed to parse configuration YAML: {err}"),
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::MissingEnv(key) => write!(f, "missing environment variable {key}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
base_url: https://dhis2.example.org
start_date: 2024-01-01
end_date: 2024-12-31
datasets:
  - dataset: zysssD93UWM
    org_units: [zw8eLbN4Znw, EQg6N2v2TXj]
  - dataset: Fdn3C7gKoju
    org_units: [Rmh4wKR794k]
";

    #[test]
    fn parses_valid_document() {
        let config = SyncConfig::from_yaml_str(SAMPLE).expect("sample should parse");
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.datasets[0].dataset, "zysssD93UWM");
        assert_eq!(config.datasets[0].org_units.len(), 2);
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
        );
    }

    #[test]
    fn rejects_duplicate_dataset_ids() {
        let raw = SAMPLE.replace("Fdn3C7gKoju", "zysssD93UWM");
        let err = SyncConfig::from_yaml_str(&raw).expect_err("duplicates should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("duplicate dataset id"));
    }

    #[test]
    fn rejects_reversed_date_range() {
        let raw = SAMPLE.replace("start_date: 2024-01-01", "start_date: 2025-06-01");
        let err = SyncConfig::from_yaml_str(&raw).expect_err("reversed range should fail");
        assert!(err.to_string().contains("after end_date"));
    }

    #[test]
    fn rejects_empty_org_unit_list() {
        let raw = SAMPLE.replace("org_units: [Rmh4wKR794k]", "org_units: []");
        let err = SyncConfig::from_yaml_str(&raw).expect_err("empty org units should fail");
        assert!(err.to_string().contains("no org units"));
    }
}
