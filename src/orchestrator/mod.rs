//! Job lifecycle for on-demand Level-2A reprocessing
//!
//! A job goes through three phases, all driven by host polls:
//! 1. submission of the reprocessing order (returns the monitoring URL as job data)
//! 2. status queries until the service reports success or failure
//! 3. background download of the result, observed until it completes
//!
//! Once a download is registered for a job, polls only look at the download and
//! never query the service again, so a completed job stays completed.

pub mod eligibility;
mod traits;


pub use traits::Transformer;

use crate::config::Config;
use crate::download::DownloadManager;
use crate::error::{DownloadError, Error, ProtocolError, Rejection, Result};
use crate::types::{
    JobId, JobStatus, JobView, Parameters, ProcessStatus, ProductInfo, RemoteJobStatus,
    ServiceDescriptor,
};
use crate::wps::{Process, WpsClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eligibility::PDI_IDENTIFIER;
use std::sync::Arc;
use url::Url;

const NAME: &str = "L2AOnDemand";
const DESCRIPTION: &str = "Generate a new product Sentinel-2 L2A from a Sentinel-2 L1C";

/// Sentinel-2 Level-1C to Level-2A reprocessing job type
#[derive(Debug)]
pub struct L2aTransformer {
    config: Arc<Config>,
    client: WpsClient,
    downloads: Arc<DownloadManager>,
}

impl L2aTransformer {
    /// Validate the configuration, prepare the scratch directory and connect to
    /// the processing service
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        config.validate()?;
        let downloads = Arc::new(DownloadManager::new(&config)?);
        Self::with_downloads(config, downloads).await
    }

    /// Same as [`L2aTransformer::new`], registering result downloads in
    /// `downloads` instead of a registry of its own
    pub async fn with_downloads(
        config: Arc<Config>,
        downloads: Arc<DownloadManager>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.scratch_dir)
            .await
            .map_err(|e| {
                Error::config(
                    "scratch_dir",
                    format!("cannot create {}: {e}", config.scratch_dir.display()),
                )
            })?;

        let client = WpsClient::connect(Arc::clone(&config)).await?;
        if !client.offers(Process::L2a) {
            tracing::warn!(
                endpoint = %config.endpoint,
                process = %Process::L2a,
                offered = ?client.service().processes,
                "Service does not advertise the reprocessing process"
            );
        }

        Ok(Self {
            config,
            client,
            downloads,
        })
    }

    /// Descriptor of the connected service
    pub fn service(&self) -> &ServiceDescriptor {
        self.client.service()
    }

    /// Registry of the result downloads
    pub fn downloads(&self) -> &Arc<DownloadManager> {
        &self.downloads
    }

    /// Eligibility against the admission window as it stands at `now`
    pub fn check_eligible_at(
        &self,
        product: &ProductInfo,
        parameters: &Parameters,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), Rejection> {
        eligibility::check_product(product, parameters, &self.config.admission, now)
    }

    async fn poll_download(&self, job_id: &JobId, data: &str) -> Result<JobView> {
        if !self.downloads.is_done(job_id) {
            return Ok(JobView::running(data));
        }

        match self.downloads.result(job_id).await {
            Ok(location) => Ok(JobView::completed(location, data)),
            Err(Error::Download(DownloadError::Interrupted { .. })) => {
                self.downloads.remove(job_id);
                tracing::warn!(
                    job_id = %job_id,
                    "Result download lost, the service will be queried again"
                );
                Ok(JobView::running(data))
            }
            // terminated between the two lookups
            Err(Error::Download(DownloadError::NotFound { .. })) => Ok(JobView::running(data)),
            Err(e) => Err(e),
        }
    }

    async fn poll_service(&self, job_id: &JobId, data: &str) -> Result<JobView> {
        let monitoring_url = Url::parse(data).map_err(|e| ProtocolError::InvalidUrl {
            url: data.to_string(),
            reason: e.to_string(),
        })?;

        match self.client.query_status(&monitoring_url).await {
            Ok(status) => self.apply_status(job_id, data, status),
            Err(Error::ServiceUnavailable { url, attempts }) => {
                tracing::warn!(
                    job_id = %job_id,
                    %url,
                    attempts,
                    "Service unavailable, job status left unchanged"
                );
                Ok(JobView::running(data))
            }
            Err(e) => Err(e),
        }
    }

    fn apply_status(&self, job_id: &JobId, data: &str, remote: RemoteJobStatus) -> Result<JobView> {
        let status = match remote.status {
            ProcessStatus::Accepted | ProcessStatus::Started => JobStatus::Running,
            ProcessStatus::Succeeded => {
                let output = remote
                    .output
                    .ok_or(ProtocolError::Missing("LiteralData"))?;
                let source = Url::parse(output.trim()).map_err(|e| ProtocolError::InvalidUrl {
                    url: output.clone(),
                    reason: e.to_string(),
                })?;
                tracing::info!(job_id = %job_id, %source, "Remote process succeeded");
                self.downloads.start(job_id, source);
                JobStatus::Running
            }
            ProcessStatus::Failed => {
                tracing::info!(job_id = %job_id, "Remote process failed");
                JobStatus::Failed
            }
            ProcessStatus::Paused | ProcessStatus::Unknown => JobStatus::Unknown,
        };

        tracing::debug!(
            job_id = %job_id,
            remote_status = ?remote.status,
            progress = remote.progress,
            ?status,
            "Job polled"
        );
        Ok(JobView::with_status(status, data))
    }
}

#[async_trait]
impl Transformer for L2aTransformer {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn check_eligible(
        &self,
        product: &ProductInfo,
        parameters: &Parameters,
    ) -> std::result::Result<(), Rejection> {
        self.check_eligible_at(product, parameters, Utc::now())
    }

    async fn submit(
        &self,
        job_id: &JobId,
        product: &ProductInfo,
        parameters: &Parameters,
    ) -> Result<JobView> {
        self.check_eligible(product, parameters)?;
        let tile_id = product
            .get(PDI_IDENTIFIER)
            .ok_or(Rejection::MissingAttribute(PDI_IDENTIFIER))?;

        let submission = self.client.execute(Process::L2a, tile_id).await?;
        tracing::info!(
            job_id = %job_id,
            tile_id,
            monitoring_url = %submission.monitoring_url,
            "Reprocessing order submitted"
        );
        Ok(JobView::running(submission.monitoring_url.as_str()))
    }

    async fn poll(&self, job_id: &JobId, data: &str) -> Result<JobView> {
        if self.downloads.has(job_id) {
            self.poll_download(job_id, data).await
        } else {
            self.poll_service(job_id, data).await
        }
    }

    async fn terminate(&self, job_id: &JobId) {
        if self.downloads.remove(job_id) {
            tracing::info!(job_id = %job_id, "Job terminated, download no longer tracked");
        }
    }
}
