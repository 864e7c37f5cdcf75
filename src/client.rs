//! Thin DHIS2 HTTP client: the single point of contact with the remote
//! service. Failures are classified (status / timeout / connection / decode)
//! and always propagated; the client never retries.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Credentials;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The `id,name` listings the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedResource {
    DataElements,
    CategoryOptionCombos,
    DataSets,
    OrganisationUnits,
}

impl NamedResource {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::DataElements => "api/dataElements",
            Self::CategoryOptionCombos => "api/categoryOptionCombos",
            Self::DataSets => "api/dataSets",
            Self::OrganisationUnits => "api/organisationUnits",
        }
    }

    /// Array field wrapping the records in the JSON envelope.
    pub fn envelope_field(self) -> &'static str {
        match self {
            Self::DataElements => "dataElements",
            Self::CategoryOptionCombos => "categoryOptionCombos",
            Self::DataSets => "dataSets",
            Self::OrganisationUnits => "organisationUnits",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DataElements => "data elements",
            Self::CategoryOptionCombos => "category option combos",
            Self::DataSets => "datasets",
            Self::OrganisationUnits => "organisation units",
        }
    }
}

/// An `(id, name)` record from a metadata listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

/// One data value from `api/dataValueSets`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataValue {
    #[serde(default)]
    pub period: String,
    #[serde(default, rename = "dataElement")]
    pub data_element: String,
    #[serde(default, rename = "categoryOptionCombo")]
    pub category_option_combo: String,
    #[serde(default)]
    pub value: String,
}

/// Remote access seam consumed by the sync and metadata passes. Lets tests
/// drive the pipeline with canned responses.
#[async_trait]
pub trait Dhis2Api: Send + Sync {
    /// Full unpaginated `id,name` listing for a resource. A missing envelope
    /// field yields an empty list.
    async fn named_refs(&self, resource: NamedResource) -> Result<Vec<NamedRef>, ClientError>;

    /// Data values for one dataset and org unit over an inclusive date range.
    async fn data_value_set(
        &self,
        dataset: &str,
        org_unit: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DataValue>, ClientError>;
}

/// HTTP client holding the base URL, credentials and a configured
/// `reqwest::Client`.
pub struct Dhis2Client {
    base_url: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl Dhis2Client {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        // Certificate verification stays off: several of the target DHIS2
        // deployments serve expired or self-signed certificates. Accepted
        // operational risk, do not drop silently.
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .build()
            .map_err(|err| ClientError::Init {
                detail: err.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }

    /// Issues one authenticated GET and parses the JSON body. All failure
    /// paths map onto the [`ClientError`] taxonomy and are returned to the
    /// caller untouched.
    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ClientError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .query(params)
            .send()
            .await
            .map_err(|err| classify(&url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                url,
            });
        }
        response.json::<Value>().await.map_err(|err| classify(&url, err))
    }
}

fn classify(url: &str, err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        ClientError::Connection {
            url: url.to_string(),
        }
    } else if err.is_decode() {
        ClientError::Decode {
            url: url.to_string(),
            detail: err.to_string(),
        }
    } else {
        ClientError::Connection {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Dhis2Api for Dhis2Client {
    async fn named_refs(&self, resource: NamedResource) -> Result<Vec<NamedRef>, ClientError> {
        let body = self
            .get_json(
                resource.endpoint(),
                &[
                    ("paging", "false".to_string()),
                    ("fields", "id,name".to_string()),
                ],
            )
            .await?;
        unwrap_envelope(&body, resource.envelope_field())
    }

    async fn data_value_set(
        &self,
        dataset: &str,
        org_unit: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DataValue>, ClientError> {
        let body = self
            .get_json(
                "api/dataValueSets",
                &[
                    ("dataSet", dataset.to_string()),
                    ("orgUnit", org_unit.to_string()),
                    ("startDate", start.format("%Y-%m-%d").to_string()),
                    ("endDate", end.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;
        unwrap_envelope(&body, "dataValues")
    }
}

fn unwrap_envelope<T: serde::de::DeserializeOwned>(
    body: &Value,
    field: &str,
) -> Result<Vec<T>, ClientError> {
    match body.get(field) {
        None => Ok(Vec::new()),
        Some(records) => {
            serde_json::from_value(records.clone()).map_err(|err| ClientError::Decode {
                url: field.to_string(),
                detail: err.to_string(),
            })
        }
    }
}

/// Discriminated transport failures. Callers decide per failure site whether
/// to skip-and-continue or abort.
#[derive(Debug)]
pub enum ClientError {
    /// Any non-2xx response.
    Status { code: u16, url: String },
    /// The 120-second request timeout elapsed.
    Timeout { url: String },
    /// Host unreachable or the connection was refused.
    Connection { url: String },
    /// The body was not the JSON we expected.
    Decode { url: String, detail: String },
    /// The underlying HTTP client could not be constructed.
    Init { detail: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code, url } => {
                write!(f, "HTTP {code} while accessing {url}")?;
                if (500..600).contains(code) {
                    write!(f, " (server may be temporarily down or overloaded)")?;
                } else if *code == 401 {
                    write!(f, " (unauthorized: check DHIS2 username/password)")?;
                }
                Ok(())
            }
            Self::Timeout { url } => {
                write!(f, "request to {url} timed out (server offline or slow to respond)")
            }
            Self::Connection { url } => {
                write!(f, "failed to connect to {url} (check the server is up and reachable)")
            }
            Self::Decode { url, detail } => write!(f, "invalid JSON from {url}: {detail}"),
            Self::Init { detail } => write!(f, "failed to build HTTP client: {detail}"),
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_field_matches_endpoint() {
        assert_eq!(NamedResource::DataSets.endpoint(), "api/dataSets");
        assert_eq!(NamedResource::DataSets.envelope_field(), "dataSets");
        assert_eq!(
            NamedResource::CategoryOptionCombos.endpoint(),
            "api/categoryOptionCombos"
        );
    }

    #[test]
    fn unwrap_envelope_reads_records() {
        let body = json!({
            "dataElements": [
                {"id": "abc123", "name": "Malaria Cases"},
                {"id": "def456", "name": "Under 5"},
            ]
        });
        let refs: Vec<NamedRef> = unwrap_envelope(&body, "dataElements").expect("should parse");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "abc123");
        assert_eq!(refs[1].name, "Under 5");
    }

    #[test]
    fn unwrap_envelope_missing_field_is_empty() {
        let body = json!({"pager": {"page": 1}});
        let refs: Vec<NamedRef> = unwrap_envelope(&body, "dataElements").expect("should parse");
        assert!(refs.is_empty());
    }

    #[test]
    fn data_values_parse_with_missing_fields() {
        let body = json!({
            "dataValues": [
                {"period": "202401", "dataElement": "abc123",
                 "categoryOptionCombo": "def456", "value": "10", "orgUnit": "ouA"},
                {"period": "202402"},
            ]
        });
        let values: Vec<DataValue> = unwrap_envelope(&body, "dataValues").expect("should parse");
        assert_eq!(values[0].data_element, "abc123");
        assert_eq!(values[1].value, "");
    }

    #[test]
    fn status_errors_carry_operator_hints() {
        let overloaded = ClientError::Status {
            code: 503,
            url: "https://dhis2.example.org/api/dataSets".to_string(),
        };
        assert!(overloaded.to_string().contains("overloaded"));

        let unauthorized = ClientError::Status {
            code: 401,
            url: "https://dhis2.example.org/api/dataSets".to_string(),
        };
        assert!(unauthorized.to_string().contains("username/password"));
    }
}
