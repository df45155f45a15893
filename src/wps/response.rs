//! Response decoding
//!
//! Bodies are deserialized with `quick-xml` into the typed documents below.
//! Field names match local names, so namespace prefixes (`wps:`, `ows:`) do not
//! matter. The status element of a document is read as a `StatusElement`
//! choice; tags outside the known set land in its catch-all variant.

use crate::error::{Error, ProtocolError, Result};
use crate::types::{ProcessStatus, RemoteJobStatus, RemoteJobSubmission, ServiceDescriptor};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

type Decoded<T> = std::result::Result<T, ProtocolError>;

fn decode<T: DeserializeOwned>(body: &str) -> Decoded<T> {
    quick_xml::de::from_str(body).map_err(|e| ProtocolError::MalformedXml(e.to_string()))
}

/// Text content of an element, whatever its attributes
#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

impl Text {
    fn trimmed(&self) -> String {
        self.value.trim().to_string()
    }
}

#[derive(Debug, Deserialize)]
struct Capabilities {
    #[serde(rename = "ServiceIdentification")]
    identification: Option<ServiceIdentification>,
    #[serde(rename = "ProcessOfferings")]
    offerings: Option<ProcessOfferings>,
}

#[derive(Debug, Deserialize)]
struct ServiceIdentification {
    #[serde(rename = "Title")]
    title: Option<Text>,
    #[serde(rename = "Abstract")]
    summary: Option<Text>,
    #[serde(rename = "ServiceTypeVersion")]
    version: Option<Text>,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessOfferings {
    #[serde(rename = "Process", default)]
    processes: Vec<OfferedProcess>,
}

#[derive(Debug, Deserialize)]
struct OfferedProcess {
    #[serde(rename = "Identifier")]
    identifier: Option<Text>,
    #[serde(rename = "Title")]
    title: Option<Text>,
}

/// Answer to an execute request, and status document of a running process
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(rename = "@statusLocation")]
    status_location: Option<String>,
    #[serde(rename = "Status")]
    status: Option<Status>,
    #[serde(rename = "ProcessOutputs")]
    outputs: Option<ProcessOutputs>,
}

impl ExecuteResponse {
    fn status(&self) -> Decoded<&Status> {
        self.status.as_ref().ok_or(ProtocolError::Missing("Status"))
    }

    /// Literal value of the first output
    fn literal_output(&self) -> Option<String> {
        self.outputs
            .as_ref()?
            .outputs
            .first()?
            .data
            .as_ref()?
            .literal
            .as_ref()
            .map(Text::trimmed)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(rename = "@creationTime")]
    creation_time: Option<String>,
    #[serde(rename = "$value")]
    state: Option<StatusElement>,
}

/// The single child of a `Status` element
#[derive(Debug, Deserialize)]
enum StatusElement {
    ProcessAccepted,
    ProcessStarted(Progress),
    ProcessPaused(Progress),
    ProcessSucceeded,
    ProcessFailed(Failure),
    #[serde(other)]
    Unrecognized,
}

impl StatusElement {
    fn status(&self) -> ProcessStatus {
        match self {
            StatusElement::ProcessAccepted => ProcessStatus::Accepted,
            StatusElement::ProcessStarted(_) => ProcessStatus::Started,
            StatusElement::ProcessPaused(_) => ProcessStatus::Paused,
            StatusElement::ProcessSucceeded => ProcessStatus::Succeeded,
            StatusElement::ProcessFailed(_) => ProcessStatus::Failed,
            StatusElement::Unrecognized => ProcessStatus::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Progress {
    #[serde(rename = "@percentCompleted")]
    percent_completed: Option<String>,
}

impl Progress {
    fn percent(&self) -> Decoded<i32> {
        let raw = self
            .percent_completed
            .as_deref()
            .ok_or(ProtocolError::Missing("percentCompleted"))?;
        raw.trim()
            .parse::<i32>()
            .ok()
            .filter(|p| (0..=100).contains(p))
            .ok_or_else(|| ProtocolError::InvalidValue {
                field: "percentCompleted",
                value: raw.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct Failure {
    #[serde(rename = "$text", default)]
    message: String,
    #[serde(rename = "ExceptionReport")]
    report: Option<ExceptionReport>,
}

#[derive(Debug, Deserialize)]
struct ExceptionReport {
    #[serde(rename = "Exception", default)]
    exceptions: Vec<Exception>,
}

#[derive(Debug, Deserialize)]
struct Exception {
    #[serde(rename = "@exceptionCode", default)]
    code: String,
    #[serde(rename = "ExceptionText")]
    text: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct ProcessOutputs {
    #[serde(rename = "Output", default)]
    outputs: Vec<Output>,
}

#[derive(Debug, Deserialize)]
struct Output {
    #[serde(rename = "Data")]
    data: Option<OutputData>,
}

#[derive(Debug, Deserialize)]
struct OutputData {
    #[serde(rename = "LiteralData")]
    literal: Option<Text>,
}

fn required(text: Option<&Text>, name: &'static str) -> Decoded<String> {
    text.map(Text::trimmed).ok_or(ProtocolError::Missing(name))
}

/// Decode a capabilities document
pub(crate) fn parse_capabilities(body: &str) -> Decoded<ServiceDescriptor> {
    let document: Capabilities = decode(body)?;

    let identification = document
        .identification
        .ok_or(ProtocolError::Missing("ServiceIdentification"))?;
    let label = required(identification.title.as_ref(), "Title")?;
    let description = required(identification.summary.as_ref(), "Abstract")?;
    let version = required(identification.version.as_ref(), "ServiceTypeVersion")?;
    if version.is_empty() {
        return Err(ProtocolError::InvalidValue {
            field: "ServiceTypeVersion",
            value: version,
        });
    }

    let processes = document
        .offerings
        .unwrap_or_default()
        .processes
        .iter()
        .filter_map(|process| process.identifier.as_ref().or(process.title.as_ref()))
        .map(Text::trimmed)
        .collect();

    Ok(ServiceDescriptor {
        label,
        description,
        version,
        processes,
    })
}

/// Decode the answer to an execute request
///
/// Relative status locations are resolved against `base`.
pub(crate) fn parse_execute_response(body: &str, base: &Url) -> Result<RemoteJobSubmission> {
    let document: ExecuteResponse = decode(body)?;
    let status = document.status()?;

    match &status.state {
        Some(StatusElement::ProcessAccepted) => {
            let creation = status
                .creation_time
                .as_deref()
                .ok_or(ProtocolError::Missing("creationTime"))?;
            let creation_time = DateTime::parse_from_rfc3339(creation.trim())
                .map(|date| date.with_timezone(&Utc))
                .map_err(|_| ProtocolError::InvalidValue {
                    field: "creationTime",
                    value: creation.to_string(),
                })?;

            let location = document
                .status_location
                .as_deref()
                .ok_or(ProtocolError::Missing("statusLocation"))?;
            let monitoring_url = base
                .join(location.trim())
                .map_err(|e| ProtocolError::InvalidUrl {
                    url: location.to_string(),
                    reason: e.to_string(),
                })?;

            Ok(RemoteJobSubmission {
                status: ProcessStatus::Accepted,
                creation_time,
                monitoring_url,
            })
        }
        Some(StatusElement::ProcessFailed(failure)) => {
            let exception = failure
                .report
                .as_ref()
                .and_then(|report| report.exceptions.first());
            match exception {
                Some(exception) => Err(Error::RemoteProcess {
                    code: exception.code.clone(),
                    message: exception
                        .text
                        .as_ref()
                        .map(Text::trimmed)
                        .unwrap_or_default(),
                }),
                None => Err(ProtocolError::UnexpectedSubmissionStatus(
                    "ProcessFailed without exception report".to_string(),
                )
                .into()),
            }
        }
        Some(other) => {
            let found = other.status().tag().unwrap_or("unrecognized status");
            Err(ProtocolError::UnexpectedSubmissionStatus(found.to_string()).into())
        }
        None => Err(ProtocolError::UnexpectedSubmissionStatus("empty Status".to_string()).into()),
    }
}

/// Decode a status document fetched from a monitoring location
pub(crate) fn parse_status_response(body: &str) -> Decoded<RemoteJobStatus> {
    let document: ExecuteResponse = decode(body)?;
    let state = document
        .status()?
        .state
        .as_ref()
        .ok_or(ProtocolError::Missing("Status child"))?;

    let status = state.status();
    match state {
        StatusElement::ProcessAccepted => Ok(RemoteJobStatus {
            status,
            progress: 0,
            output: None,
        }),
        StatusElement::ProcessStarted(progress) | StatusElement::ProcessPaused(progress) => {
            Ok(RemoteJobStatus {
                status,
                progress: progress.percent()?,
                output: None,
            })
        }
        StatusElement::ProcessSucceeded => {
            let literal = document
                .literal_output()
                .ok_or(ProtocolError::Missing("ProcessOutputs/Output/Data/LiteralData"))?;
            Ok(RemoteJobStatus {
                status,
                progress: 100,
                output: Some(literal),
            })
        }
        StatusElement::ProcessFailed(failure) => {
            tracing::info!(reason = %failure.message.trim(), "Service reported process failure");
            Ok(RemoteJobStatus {
                status,
                progress: -1,
                output: None,
            })
        }
        StatusElement::Unrecognized => {
            tracing::warn!("Service reported an unknown process status");
            Ok(RemoteJobStatus {
                status,
                progress: -1,
                output: None,
            })
        }
    }
}
