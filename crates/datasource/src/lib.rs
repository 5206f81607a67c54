//! `pa-datasource`: the Operation Invoker.
//!
//! | Mode        | Implementation         | Behavior |
//! |-------------|------------------------|----------|
//! | `rest`      | [`RestDataSource`]      | POST to the data service with bounded retry |
//! | `simulated` | [`SimulatedDataSource`] | deterministic placeholder payloads |

pub mod provider;
pub mod rest;
pub mod simulated;

pub use provider::DataSource;
pub use rest::{from_reqwest, RestDataSource};
pub use simulated::SimulatedDataSource;

use std::sync::Arc;

use pa_domain::config::{DataServiceConfig, DataServiceMode};
use pa_domain::error::Result;

/// Build the [`DataSource`] selected by `data_service.mode`.
pub fn create_data_source(cfg: &DataServiceConfig) -> Result<Arc<dyn DataSource>> {
    match cfg.mode {
        DataServiceMode::Rest => {
            let client = RestDataSource::new(cfg)?;
            tracing::info!(
                base_url = %cfg.base_url,
                max_attempts = client.max_attempts(),
                timeout_ms = cfg.timeout_ms,
                "using REST data service"
            );
            Ok(Arc::new(client))
        }
        DataServiceMode::Simulated => {
            tracing::warn!("data service is simulated; answers are placeholders");
            Ok(Arc::new(SimulatedDataSource))
        }
    }
}
