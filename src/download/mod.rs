//! Background retrieval of job results
//!
//! Each completed job gets at most one download task, registered under its job
//! id. The task streams the result archive, extracts the payload into the
//! scratch directory and publishes either the local file URL or a failure.
//!
//! Registration is an atomic insert-if-absent on a concurrent map, so two
//! polls racing on the same job never spawn two tasks. The number of transfers
//! running at once is capped by a semaphore; tasks above the cap wait for a
//! permit.

mod unpack;


use crate::config::Config;
use crate::error::{DownloadError, DownloadFailure, Error, Result};
use crate::types::JobId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::TryStreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Semaphore, watch};
use tokio_util::io::{StreamReader, SyncIoBridge};
use url::Url;

/// Outcome published by a download task
type Outcome = std::result::Result<Url, DownloadFailure>;

/// Registered download: the source and the channel its outcome arrives on
#[derive(Debug)]
struct DownloadTask {
    source: Url,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl DownloadTask {
    /// Finished with an outcome, or the task is gone without one
    fn is_done(&self) -> bool {
        self.outcome.borrow().is_some() || self.outcome.has_changed().is_err()
    }
}

/// Registry of background result downloads, keyed by job id
#[derive(Debug)]
pub struct DownloadManager {
    tasks: DashMap<JobId, DownloadTask>,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    settings: Arc<FetchSettings>,
    spawned: AtomicU64,
}

/// Everything a task needs besides its own job and source
#[derive(Debug)]
struct FetchSettings {
    scratch_dir: PathBuf,
    skip_entries: usize,
    packaging_marker: String,
}

impl DownloadManager {
    /// Create an empty registry writing into `config.scratch_dir`
    ///
    /// The scratch directory must exist by the time a download finishes; it is
    /// made absolute here so the published file URLs are valid.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.download.connect_timeout)
            .build()
            .map_err(|e| {
                Error::config("download", format!("failed to create HTTP client: {e}"))
            })?;

        let scratch_dir = std::path::absolute(&config.scratch_dir)?;

        Ok(Self {
            tasks: DashMap::new(),
            http,
            permits: Arc::new(Semaphore::new(config.download.max_concurrent_downloads.max(1))),
            settings: Arc::new(FetchSettings {
                scratch_dir,
                skip_entries: config.download.skip_entries,
                packaging_marker: config.download.packaging_marker.clone(),
            }),
            spawned: AtomicU64::new(0),
        })
    }

    /// Register and spawn a download for `job_id` unless one already exists
    ///
    /// Returns `true` if a new task was created. Must be called from within a
    /// tokio runtime.
    pub fn start(&self, job_id: &JobId, source: Url) -> bool {
        let created = match self.tasks.entry(job_id.clone()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    job_id = %job_id,
                    source = %existing.get().source,
                    "Download already registered"
                );
                false
            }
            Entry::Vacant(slot) => {
                let (sender, receiver) = watch::channel(None);
                let fetch = Fetch {
                    job_id: job_id.clone(),
                    source: source.clone(),
                    http: self.http.clone(),
                    permits: Arc::clone(&self.permits),
                    settings: Arc::clone(&self.settings),
                };
                slot.insert(DownloadTask {
                    source: source.clone(),
                    outcome: receiver,
                });
                self.spawned.fetch_add(1, Ordering::Relaxed);

                tokio::spawn(async move {
                    let outcome = fetch.run().await;
                    // nobody listening means the job was terminated
                    let _ = sender.send(Some(outcome));
                });
                true
            }
        };

        if created {
            tracing::info!(
                job_id = %job_id,
                %source,
                active = self.active(),
                "Result download started"
            );
        }
        created
    }

    /// Whether a download is registered for `job_id`
    pub fn has(&self, job_id: &JobId) -> bool {
        self.tasks.contains_key(job_id)
    }

    /// Whether the download for `job_id` has finished; `false` if none exists
    pub fn is_done(&self, job_id: &JobId) -> bool {
        self.tasks.get(job_id).is_some_and(|task| task.is_done())
    }

    /// Wait for the download of `job_id` and return the local file URL
    ///
    /// A failed task yields `DownloadError::Failed`; a task that vanished
    /// without an outcome yields `DownloadError::Interrupted`.
    pub async fn result(&self, job_id: &JobId) -> Result<Url> {
        let mut outcome = self
            .tasks
            .get(job_id)
            .map(|task| task.outcome.clone())
            .ok_or_else(|| DownloadError::NotFound {
                job_id: job_id.clone(),
            })?;

        let published = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };

        match published {
            Some(Ok(url)) => {
                tracing::info!(job_id = %job_id, %url, "Result download finished");
                Ok(url)
            }
            Some(Err(failure)) => {
                tracing::error!(job_id = %job_id, error = %failure, "Result download failed");
                Err(DownloadError::Failed {
                    job_id: job_id.clone(),
                    failure,
                }
                .into())
            }
            None => {
                tracing::warn!(job_id = %job_id, "Result download interrupted");
                Err(DownloadError::Interrupted {
                    job_id: job_id.clone(),
                }
                .into())
            }
        }
    }

    /// Forget the download of `job_id`; returns whether one was registered
    ///
    /// A running task is not cancelled, it finishes on its own and its outcome
    /// is dropped.
    pub fn remove(&self, job_id: &JobId) -> bool {
        let removed = self.tasks.remove(job_id).is_some();
        if removed {
            tracing::debug!(job_id = %job_id, "Download registration removed");
        }
        removed
    }

    /// Number of registered downloads that have not finished yet
    pub fn active(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_done()).count()
    }

    /// Total number of tasks spawned since creation
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

/// One download task, moved into its spawned future
struct Fetch {
    job_id: JobId,
    source: Url,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    settings: Arc<FetchSettings>,
}

impl Fetch {
    async fn run(self) -> Outcome {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| self.failure("download pool closed"))?;

        tracing::debug!(job_id = %self.job_id, source = %self.source, "Fetching result archive");
        let response = self
            .http
            .get(self.source.clone())
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failure(format!("unexpected status {status}")));
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let reader = SyncIoBridge::new(StreamReader::new(Box::pin(body)));
        let settings = Arc::clone(&self.settings);

        let path = tokio::task::spawn_blocking(move || {
            unpack::unpack_payload(
                reader,
                &settings.scratch_dir,
                settings.skip_entries,
                &settings.packaging_marker,
            )
        })
        .await
        .map_err(|e| self.failure(format!("unpack task aborted: {e}")))?
        .map_err(|e| self.failure(format!("unpack failed: {e}")))?;

        Url::from_file_path(&path)
            .map_err(|()| self.failure(format!("cannot express {} as a URL", path.display())))
    }

    fn failure(&self, reason: impl Into<String>) -> DownloadFailure {
        DownloadFailure {
            source_url: self.source.to_string(),
            reason: reason.into(),
        }
    }
}
