//! Client for the processing service
//!
//! The service speaks a WPS-style protocol: HTTP GET requests with query
//! parameters, XML answers. This module is split into:
//! - [`request`] - query parameters and process-specific data inputs
//! - [`response`] - XML decoding into domain values
//!
//! Every request goes through the same retry policy: gateway timeouts and
//! network timeouts are retried up to `retry.max_attempts` times, anything else
//! fails immediately.

mod request;
mod response;


pub use request::Process;

use crate::config::Config;
use crate::error::{Error, ProtocolError, Result};
use crate::retry::{IsRetryable, request_with_retry};
use crate::types::{RemoteJobStatus, RemoteJobSubmission, ServiceDescriptor};
use request::Disambiguator;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Stateless request builder/parser for the processing service
///
/// The only state kept is the service descriptor loaded at connection time and
/// the counter used to make order identifiers unique.
#[derive(Debug)]
pub struct WpsClient {
    http: reqwest::Client,
    config: Arc<Config>,
    service: ServiceDescriptor,
    stamps: Disambiguator,
}

impl WpsClient {
    /// Build the HTTP client and load the service capabilities
    pub async fn connect(config: Arc<Config>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.http.connect_timeout)
            .read_timeout(config.http.read_timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: Some("http".to_string()),
            })?;

        debug!(endpoint = %config.endpoint, "Loading web process service");
        let service = load_capabilities(&http, &config).await?;
        info!(
            endpoint = %config.endpoint,
            label = %service.label,
            version = %service.version,
            processes = ?service.processes,
            "Web process service loaded"
        );

        Ok(Self {
            http,
            config,
            service,
            stamps: Disambiguator::default(),
        })
    }

    /// Descriptor of the connected service
    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// Whether the service advertises `process`
    pub fn offers(&self, process: Process) -> bool {
        self.service
            .processes
            .iter()
            .any(|p| p == process.identifier())
    }

    /// Submit an asynchronous execution of `process` on one input tile
    ///
    /// Returns the accepted submission, or `RemoteProcess` if the service
    /// refused the order with an exception report.
    pub async fn execute(&self, process: Process, tile_id: &str) -> Result<RemoteJobSubmission> {
        let data_inputs = request::data_inputs(process, &self.config, tile_id, self.stamps.next());
        let url = request::execute_url(
            &self.config.endpoint,
            &self.service.version,
            process,
            &data_inputs,
        );

        let body = fetch(&self.http, &self.config, &url).await?;
        let submission = response::parse_execute_response(&body, &self.config.endpoint)?;

        info!(
            %process,
            tile_id,
            monitoring_url = %submission.monitoring_url,
            creation_time = %submission.creation_time,
            "Process execution accepted"
        );
        Ok(submission)
    }

    /// Query the status of an execution at its monitoring location
    pub async fn query_status(&self, monitoring_url: &Url) -> Result<RemoteJobStatus> {
        let body = fetch(&self.http, &self.config, monitoring_url).await?;
        let status = response::parse_status_response(&body)?;
        debug!(
            %monitoring_url,
            status = ?status.status,
            progress = status.progress,
            "Process status retrieved"
        );
        Ok(status)
    }
}

async fn load_capabilities(http: &reqwest::Client, config: &Config) -> Result<ServiceDescriptor> {
    let url = request::capabilities_url(&config.endpoint);
    let body = fetch(http, config, &url).await?;
    Ok(response::parse_capabilities(&body)?)
}

/// GET `url` under the retry policy and return the body
///
/// Transient failures that outlive the attempt budget become
/// `ServiceUnavailable`; fatal ones are returned as they are.
async fn fetch(http: &reqwest::Client, config: &Config, url: &Url) -> Result<String> {
    request_with_retry(&config.retry, || fetch_once(http, url))
        .await
        .map_err(|e| {
            if e.is_retryable() {
                Error::ServiceUnavailable {
                    url: url.to_string(),
                    attempts: config.retry.max_attempts.max(1),
                }
            } else {
                e
            }
        })
}

/// One attempt: any non-success status is an error, 504 being the transient one
async fn fetch_once(http: &reqwest::Client, url: &Url) -> Result<String> {
    debug!(%url, "Performing service request");
    let response = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify(e, url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProtocolError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        }
        .into());
    }

    response.text().await.map_err(|e| classify(e, url))
}

/// Keep timeouts as network errors (retried), turn everything else into a
/// fatal protocol error
fn classify(e: reqwest::Error, url: &Url) -> Error {
    if e.is_timeout() {
        Error::Network(e)
    } else {
        ProtocolError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        }
        .into()
    }
}
