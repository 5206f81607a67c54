pub mod chat;
pub mod config;
pub mod inspect;
pub mod run;

use clap::{Parser, Subcommand};

/// puo-assist: conversational query assistant for release data.
#[derive(Debug, Parser)]
#[command(name = "puo-assist", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Ask a single question and print the answer.
    Run {
        /// The question.
        message: String,
        /// Session id; slot memory carries over between runs on the same id.
        #[arg(long, default_value = "cli")]
        session: String,
        /// Major version you are working in (e.g. 24a).
        #[arg(long)]
        context_version: Option<String>,
        /// Print the full turn outcome as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Interactive question/answer loop.
    Chat {
        /// Resume an existing session instead of creating a new one.
        #[arg(long)]
        session: Option<String>,
    },
    /// Classify identifier tokens and show how they would route.
    Classify {
        /// Tokens or a free-text question.
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// List the data-service operations and entity enumerations.
    Catalogue {
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `PA_CONFIG` (or `config.toml`). A missing
/// file yields the defaults. Returns the config and the path that was used.
pub fn load_config() -> anyhow::Result<(pa_domain::config::Config, String)> {
    let config_path = std::env::var("PA_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        pa_domain::config::Config::default()
    };

    Ok((config, config_path))
}
