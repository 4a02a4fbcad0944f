use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Declarative registry files (IntentCatalog, ToolRegistry, jury roster)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Paths to the three declarative registry files consumed at startup and
/// on hot-reload. Reload is driven externally (filesystem watcher or admin
/// operation, both out of scope) — this config only names where to look.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistriesConfig {
    #[serde(default = "d_intent_registry_path")]
    pub intent_registry_path: PathBuf,
    #[serde(default = "d_tool_registry_path")]
    pub tool_registry_path: PathBuf,
    #[serde(default = "d_jury_registry_path")]
    pub jury_registry_path: PathBuf,
    /// Interval at which the registries check their source files for
    /// changes, in seconds. `0` disables automatic reload.
    #[serde(default = "d_hot_reload_interval")]
    pub hot_reload_interval_seconds: u64,
}

impl Default for RegistriesConfig {
    fn default() -> Self {
        Self {
            intent_registry_path: d_intent_registry_path(),
            tool_registry_path: d_tool_registry_path(),
            jury_registry_path: d_jury_registry_path(),
            hot_reload_interval_seconds: d_hot_reload_interval(),
        }
    }
}

fn d_intent_registry_path() -> PathBuf {
    PathBuf::from("./registry/intents.toml")
}
fn d_tool_registry_path() -> PathBuf {
    PathBuf::from("./registry/tools.toml")
}
fn d_jury_registry_path() -> PathBuf {
    PathBuf::from("./registry/jury.toml")
}
fn d_hot_reload_interval() -> u64 {
    30
}
