mod data_service;
mod llm;
mod observability;
mod routing;
mod server;
mod sessions;

pub use data_service::*;
pub use llm::*;
pub use observability::*;
pub use routing::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub data_service: DataServiceConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, the `/ops` endpoints are open (dev mode).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "PA_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: String| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message,
            })
        };

        if self.server.port == 0 {
            push(
                ConfigSeverity::Error,
                "server.port",
                "port must be greater than 0".into(),
            );
        }
        if self.server.host.is_empty() {
            push(
                ConfigSeverity::Error,
                "server.host",
                "host must not be empty".into(),
            );
        }
        if self.server.max_concurrent_requests == 0 {
            push(
                ConfigSeverity::Error,
                "server.max_concurrent_requests",
                "must be greater than 0".into(),
            );
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)".into(),
            );
        }

        if self.data_service.mode == DataServiceMode::Rest {
            if self.data_service.base_url.is_empty() {
                push(
                    ConfigSeverity::Error,
                    "data_service.base_url",
                    "base_url must not be empty in rest mode".into(),
                );
            } else if !self.data_service.base_url.starts_with("http://")
                && !self.data_service.base_url.starts_with("https://")
            {
                push(
                    ConfigSeverity::Error,
                    "data_service.base_url",
                    format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        self.data_service.base_url
                    ),
                );
            }
        }
        if self.data_service.timeout_ms == 0 {
            push(
                ConfigSeverity::Error,
                "data_service.timeout_ms",
                "timeout must be greater than 0".into(),
            );
        }
        if self.data_service.max_retries + 1 > MAX_ATTEMPTS_CEILING {
            push(
                ConfigSeverity::Warning,
                "data_service.max_retries",
                format!(
                    "{} retries exceed the ceiling; capped at {} attempts",
                    self.data_service.max_retries, MAX_ATTEMPTS_CEILING
                ),
            );
        }

        if let Some(version) = &self.routing.default_major_version {
            if !is_major_version_shape(version) {
                push(
                    ConfigSeverity::Error,
                    "routing.default_major_version",
                    format!("\"{version}\" is not two digits followed by a lowercase letter"),
                );
            }
        }
        if self.routing.node_id_min_len == 0 || self.routing.node_id_min_len > 40 {
            push(
                ConfigSeverity::Error,
                "routing.node_id_min_len",
                "must be between 1 and 40".into(),
            );
        }

        if self.llm.max_title_chars == 0 {
            push(
                ConfigSeverity::Error,
                "llm.max_title_chars",
                "must be greater than 0".into(),
            );
        }
        if self.llm.max_concurrent_titles == 0 {
            push(
                ConfigSeverity::Warning,
                "llm.max_concurrent_titles",
                "0 disables background title generation".into(),
            );
        }

        if self.sessions.trace_capacity == 0 {
            push(
                ConfigSeverity::Error,
                "sessions.trace_capacity",
                "must be greater than 0".into(),
            );
        }
        if self.sessions.idle_evict_secs == 0 {
            push(
                ConfigSeverity::Error,
                "sessions.idle_evict_secs",
                "must be greater than 0".into(),
            );
        }

        errors
    }
}

fn is_major_version_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 3 && b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[2].is_ascii_lowercase()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], field: &str) -> bool {
        errors
            .iter()
            .any(|e| e.field == field && e.severity == ConfigSeverity::Error)
    }

    #[test]
    fn default_config_is_valid() {
        let errors = Config::default().validate();
        assert!(
            errors.iter().all(|e| e.severity != ConfigSeverity::Error),
            "unexpected errors: {errors:?}"
        );
    }

    #[test]
    fn rejects_bad_default_major_version() {
        let mut cfg = Config::default();
        cfg.routing.default_major_version = Some("2024a".into());
        assert!(has_error(&cfg.validate(), "routing.default_major_version"));
    }

    #[test]
    fn no_default_major_version_is_allowed() {
        let mut cfg = Config::default();
        cfg.routing.default_major_version = None;
        assert!(!has_error(&cfg.validate(), "routing.default_major_version"));
    }

    #[test]
    fn simulated_mode_ignores_base_url() {
        let mut cfg = Config::default();
        cfg.data_service.mode = DataServiceMode::Simulated;
        cfg.data_service.base_url = String::new();
        assert!(!has_error(&cfg.validate(), "data_service.base_url"));
    }

    #[test]
    fn rest_mode_requires_http_scheme() {
        let mut cfg = Config::default();
        cfg.data_service.base_url = "cid-service/continuous_delivery".into();
        assert!(has_error(&cfg.validate(), "data_service.base_url"));
    }

    #[test]
    fn excessive_retries_only_warn() {
        let mut cfg = Config::default();
        cfg.data_service.max_retries = 9;
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "data_service.max_retries"
                && e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn display_includes_severity_tag() {
        let e = ConfigError {
            severity: ConfigSeverity::Warning,
            field: "a.b".into(),
            message: "msg".into(),
        };
        assert_eq!(e.to_string(), "[WARN] a.b: msg");
    }
}
