//! Contract between the hosting platform and a job type

use crate::error::{Rejection, Result};
use crate::types::{JobId, JobView, Parameters, ProductInfo};
use async_trait::async_trait;

/// A job type the host can submit, poll and terminate
///
/// The host owns scheduling and persistence: it stores the `data` of every
/// returned [`JobView`] and hands it back on the next [`poll`](Self::poll).
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Short identifier of the job type
    fn name(&self) -> &str;

    /// Human-readable description of the job type
    fn description(&self) -> &str;

    /// Decide whether `product` can be processed with `parameters`
    fn check_eligible(&self, product: &ProductInfo, parameters: &Parameters)
    -> std::result::Result<(), Rejection>;

    /// Start a job for `product`
    async fn submit(
        &self,
        job_id: &JobId,
        product: &ProductInfo,
        parameters: &Parameters,
    ) -> Result<JobView>;

    /// Refresh the state of a job from the `data` returned by the previous call
    async fn poll(&self, job_id: &JobId, data: &str) -> Result<JobView>;

    /// Stop tracking a job. Idempotent.
    async fn terminate(&self, job_id: &JobId);
}
