//! Top-level argument parsing for the `serialagent` binary — the thin,
//! out-of-core wrapper around the C1-C10 core (spec §6: "top-level CLI
//! wrapper, out of core").
//!
//! Grounded on `crates/gateway/src/cli/mod.rs`'s `Cli`/`Command` shape,
//! trimmed to the subcommands this core actually needs (no `serve`/HTTP,
//! no `systemd`, no `import` — all out of scope per §1).

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "serialagent", version, about = "Intent resolution and action orchestration core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive REPL session (default when no subcommand is given).
    Chat {
        /// Session key; a fresh session is created if unseen.
        #[arg(long, default_value = "cli:chat")]
        session: String,
    },
    /// Send a single utterance through the pipeline and print the response.
    Run {
        /// The utterance to classify and act on.
        message: String,
        #[arg(long, default_value = "cli:run")]
        session: String,
        /// Emit the full `ConversationResponse` as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any validation issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path named by `SA_CONFIG` (or
/// `config.toml` by default), falling back to built-in defaults when the
/// file doesn't exist — config-file I/O itself is an external collaborator
/// per spec §1, so this loader is intentionally minimal.
pub fn load_config() -> anyhow::Result<(sa_domain::config::Config, String)> {
    let config_path = std::env::var("SA_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        sa_domain::config::Config::default()
    };

    Ok((config, config_path))
}
