use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Data service (CI / release-management backend)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hard ceiling on attempts per invocation, whatever `max_retries` says.
pub const MAX_ATTEMPTS_CEILING: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataServiceMode {
    /// POST every operation to `base_url`.
    #[default]
    Rest,
    /// Answer every operation with a deterministic placeholder payload.
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataServiceConfig {
    #[serde(default)]
    pub mode: DataServiceMode,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Per-attempt request timeout.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt on transient failures.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Optional env var holding a bearer token for the data service.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl DataServiceConfig {
    /// Total attempts per invocation, clamped to [`MAX_ATTEMPTS_CEILING`].
    pub fn max_attempts(&self) -> u32 {
        (self.max_retries + 1).min(MAX_ATTEMPTS_CEILING)
    }
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self {
            mode: DataServiceMode::default(),
            base_url: d_base_url(),
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            api_key_env: None,
        }
    }
}

fn d_base_url() -> String {
    "http://cid-service.huawei.com/service-puo/continuous_delivery".into()
}
fn d_timeout_ms() -> u64 {
    10_000
}
fn d_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg: DataServiceConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.mode, DataServiceMode::Rest);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.max_attempts(), 4);
        assert!(cfg.base_url.ends_with("/continuous_delivery"));
    }

    #[test]
    fn attempts_are_clamped() {
        let cfg: DataServiceConfig = toml::from_str("max_retries = 20").unwrap();
        assert_eq!(cfg.max_attempts(), MAX_ATTEMPTS_CEILING);
    }

    #[test]
    fn simulated_mode_parses() {
        let cfg: DataServiceConfig = toml::from_str(r#"mode = "simulated""#).unwrap();
        assert_eq!(cfg.mode, DataServiceMode::Simulated);
    }
}
