//! Polling helpers for integration tests

use reprocess_wps::{JobId, JobStatus, JobView, Result, Transformer};
use std::time::Duration;

/// Interval between two polls while waiting
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Poll until the job leaves `Running` or the poll fails
///
/// Panics if `timeout` elapses first. Every intermediate view must carry the
/// same job data.
pub async fn poll_until_settled(
    transformer: &dyn Transformer,
    job_id: &JobId,
    data: &str,
    timeout: Duration,
) -> Result<JobView> {
    let outcome = tokio::time::timeout(timeout, async {
        loop {
            let view = transformer.poll(job_id, data).await?;
            assert_eq!(view.data, data, "job data must be carried unchanged");
            if view.status != JobStatus::Running {
                return Ok(view);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => panic!("job {job_id} still running after {timeout:?}"),
    }
}
