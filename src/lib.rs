//! # reprocess-wps
//!
//! On-demand Sentinel-2 Level-2A reprocessing through a WPS-style processing
//! service.
//!
//! ## Design Philosophy
//!
//! reprocess-wps is designed to be:
//! - **Host-driven** - The hosting platform schedules polls and persists job data
//! - **Non-blocking** - Result downloads run in the background, polls never wait on them
//! - **Resilient** - Gateway and network timeouts are retried, an unavailable
//!   service never fails a running job
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use reprocess_wps::{Config, JobId, JobStatus, L2aTransformer, ProductInfo, Transformer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json_str(
//!         r#"{
//!             "endpoint": "https://wps.example.com/cgi-bin/pywps.cgi",
//!             "user_id": "user",
//!             "processor_version": "0.0.7",
//!             "resolution": "60",
//!             "admission": { "start": "now-P30D", "end": "now-PT12H" }
//!         }"#,
//!     )?;
//!     let transformer = L2aTransformer::new(Arc::new(config)).await?;
//!
//!     let job = JobId::new("job-1");
//!     let product: ProductInfo = [
//!         ("Satellite name", "Sentinel-2"),
//!         ("Product type", "S2MSI1C"),
//!         ("Level-1C PDI Identifier", "S2A_OPER_MSI_L1C_TL_SGS__20180305T101021_A014040_T32TQM_N02.06"),
//!         ("Sensing stop", "2018-03-05T10:10:21.024Z"),
//!     ]
//!     .into_iter()
//!     .collect();
//!
//!     let mut view = transformer.submit(&job, &product, &Default::default()).await?;
//!     while view.status == JobStatus::Running {
//!         tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!         view = transformer.poll(&job, &view.data).await?;
//!     }
//!     println!("{:?}: {:?}", view.status, view.result);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Background result downloads
pub mod download;
/// Error types
pub mod error;
/// Job lifecycle and host contract
pub mod orchestrator;
/// Retry logic for transient service failures
pub mod retry;
/// Core domain types
pub mod types;
/// Processing service client
pub mod wps;

// Re-export commonly used types
pub use config::{AdmissionWindow, Config, DateBound, DownloadConfig, HttpConfig, RetryConfig};
pub use download::DownloadManager;
pub use error::{DownloadError, DownloadFailure, Error, ProtocolError, Rejection, Result};
pub use orchestrator::{L2aTransformer, Transformer};
pub use types::{
    JobId, JobStatus, JobView, Parameters, ProcessStatus, ProductInfo, RemoteJobStatus,
    RemoteJobSubmission, ServiceDescriptor,
};
pub use wps::{Process, WpsClient};
