//! Offline [`DataSource`] returning deterministic placeholder payloads.
//! Useful for demos and for running the assistant without network access
//! to the data service.

use async_trait::async_trait;
use pa_domain::error::{Error, Result};
use pa_routing::{BoundSlots, OperationDescriptor};
use serde_json::json;

use crate::provider::DataSource;

#[derive(Debug, Clone, Default)]
pub struct SimulatedDataSource;

#[async_trait]
impl DataSource for SimulatedDataSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn invoke(
        &self,
        descriptor: &'static OperationDescriptor,
        bound: &BoundSlots,
    ) -> Result<serde_json::Value> {
        let payload = descriptor.payload(bound).map_err(|param| {
            Error::Other(format!(
                "{} called without {}",
                descriptor.name,
                param.as_str()
            ))
        })?;
        tracing::debug!(operation = descriptor.name, "simulated data service call");
        Ok(json!({
            "simulated": true,
            "status": "success",
            "operation": descriptor.name,
            "endpoint": descriptor.endpoint,
            "request": payload,
            "data": format!("simulated result of {}", descriptor.summary.to_lowercase()),
        }))
    }
}
