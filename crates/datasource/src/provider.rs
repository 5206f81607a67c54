//! The `DataSource` trait: the only way the assistant reaches the
//! CI/release-management data service.

use async_trait::async_trait;
use pa_domain::error::Result;
use pa_routing::{BoundSlots, OperationDescriptor};

/// Executes catalogue operations.
///
/// Implementations may talk to the real REST service, return simulated
/// data, or be a test double. Failures are typed:
/// [`pa_domain::Error::UpstreamUnavailable`] once transient failures
/// exhaust the retry ceiling, [`pa_domain::Error::UpstreamRejected`] for
/// validation failures reported by the service.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short name for logs and traces (`rest`, `simulated`, ...).
    fn name(&self) -> &'static str;

    async fn invoke(
        &self,
        descriptor: &'static OperationDescriptor,
        bound: &BoundSlots,
    ) -> Result<serde_json::Value>;
}
