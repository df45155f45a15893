//! Core domain types shared by the protocol client, the download manager and
//! the job orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Identifier of a job, assigned by the host
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a process execution as reported by the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Queued by the service, not started yet
    Accepted,
    /// Running
    Started,
    /// Suspended by the service
    Paused,
    /// Finished, output available
    Succeeded,
    /// Finished with an error
    Failed,
    /// Anything the lookup table does not know
    Unknown,
}

/// Wire tag names of the status elements, in lookup order
const STATUS_TAGS: [(&str, ProcessStatus); 5] = [
    ("ProcessAccepted", ProcessStatus::Accepted),
    ("ProcessStarted", ProcessStatus::Started),
    ("ProcessPaused", ProcessStatus::Paused),
    ("ProcessSucceeded", ProcessStatus::Succeeded),
    ("ProcessFailed", ProcessStatus::Failed),
];

impl ProcessStatus {
    /// Map a status element name to a status; unmatched names are `Unknown`
    pub fn from_tag(tag: &str) -> Self {
        STATUS_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, status)| *status)
            .unwrap_or(ProcessStatus::Unknown)
    }

    /// Wire tag name of this status, `None` for `Unknown`
    pub fn tag(&self) -> Option<&'static str> {
        STATUS_TAGS
            .iter()
            .find(|(_, status)| status == self)
            .map(|(name, _)| *name)
    }
}

/// Outcome of a successful submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteJobSubmission {
    /// Status declared in the execute response
    pub status: ProcessStatus,
    /// Creation time declared by the service
    pub creation_time: DateTime<Utc>,
    /// Location to poll for status; the only handle needed to resume polling
    pub monitoring_url: Url,
}

/// Snapshot of a running process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteJobStatus {
    /// Current status
    pub status: ProcessStatus,
    /// Completion percentage in `[0, 100]`, or -1 for failed/unknown processes
    pub progress: i32,
    /// Literal output location, present only when the process succeeded
    pub output: Option<String>,
}

/// Description of the processing service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service title
    pub label: String,
    /// Service abstract
    pub description: String,
    /// Protocol version, sent back on execute requests
    pub version: String,
    /// Identifiers of the processes offered by the service
    pub processes: Vec<String>,
}

/// Caller-facing state of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Remote processing or result download still in progress
    Running,
    /// Result available locally
    Completed,
    /// The service reported a failure
    Failed,
    /// The service reported a state that cannot be mapped (paused, unknown)
    Unknown,
}

/// The only externally visible representation of a job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    /// Current status
    pub status: JobStatus,
    /// Local result location, set once the job is completed
    pub result: Option<Url>,
    /// Opaque state the host must pass back on the next poll
    pub data: String,
}

impl JobView {
    /// A running job carrying `data` forward
    pub fn running(data: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Running,
            result: None,
            data: data.into(),
        }
    }

    /// A job in `status` without a result
    pub fn with_status(status: JobStatus, data: impl Into<String>) -> Self {
        Self {
            status,
            result: None,
            data: data.into(),
        }
    }

    /// A completed job
    pub fn completed(result: Url, data: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(result),
            data: data.into(),
        }
    }
}

/// Metadata of the source product, keyed by attribute name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductInfo {
    metadata: HashMap<String, String>,
}

impl ProductInfo {
    /// Wrap an attribute map
    pub fn new(metadata: HashMap<String, String>) -> Self {
        Self { metadata }
    }

    /// Value of an attribute
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.metadata.get(attribute).map(String::as_str)
    }

    /// Whether an attribute is present
    pub fn contains(&self, attribute: &str) -> bool {
        self.metadata.contains_key(attribute)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProductInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            metadata: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Job parameters supplied by the host
pub type Parameters = HashMap<String, String>;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tags_map_to_statuses() {
        assert_eq!(
            ProcessStatus::from_tag("ProcessAccepted"),
            ProcessStatus::Accepted
        );
        assert_eq!(
            ProcessStatus::from_tag("ProcessStarted"),
            ProcessStatus::Started
        );
        assert_eq!(
            ProcessStatus::from_tag("ProcessPaused"),
            ProcessStatus::Paused
        );
        assert_eq!(
            ProcessStatus::from_tag("ProcessSucceeded"),
            ProcessStatus::Succeeded
        );
        assert_eq!(
            ProcessStatus::from_tag("ProcessFailed"),
            ProcessStatus::Failed
        );
    }

    #[test]
    fn unmatched_tags_are_unknown() {
        assert_eq!(ProcessStatus::from_tag("ProcessExploded"), ProcessStatus::Unknown);
        assert_eq!(ProcessStatus::from_tag(""), ProcessStatus::Unknown);
        // lookup is case sensitive
        assert_eq!(ProcessStatus::from_tag("processstarted"), ProcessStatus::Unknown);
        assert_eq!(ProcessStatus::Unknown.tag(), None);
    }

    #[test]
    fn product_info_collects_from_pairs() {
        let product: ProductInfo = [("Satellite name", "Sentinel-2")].into_iter().collect();
        assert_eq!(product.get("Satellite name"), Some("Sentinel-2"));
        assert!(!product.contains("Product type"));
    }

    #[test]
    fn job_view_serializes_status_in_snake_case() {
        let view = JobView::running("http://host/status?Id=1");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json["result"].is_null());
    }
}
