use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sa_domain::error::Result;
use sa_domain::model::ToolAction;
use sa_domain::trace::TraceEvent;

use crate::loader;

/// Hot-reloadable index of declared [`ToolAction`]s, addressed by their
/// `"plugin.action"` name. This is the declarative half of the tool
/// registry — it only answers "what does this action look like", not
/// "dispatch this action"; the dispatcher lives in `sa-tools`.
pub struct ToolRegistry {
    entries: RwLock<Vec<ToolAction>>,
    source_path: PathBuf,
}

impl ToolRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let entries = loader::load_tools(path)?;
        tracing::info!(tool_count = entries.len(), path = %path.display(), "tool registry loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            source_path: path.to_path_buf(),
        })
    }

    pub fn from_entries(entries: Vec<ToolAction>) -> Self {
        Self {
            entries: RwLock::new(entries),
            source_path: PathBuf::new(),
        }
    }

    pub fn empty() -> Self {
        Self::from_entries(Vec::new())
    }

    pub fn lookup(&self, name: &str) -> Option<ToolAction> {
        self.entries.read().iter().find(|t| t.name == name).cloned()
    }

    pub fn all(&self) -> Vec<ToolAction> {
        self.entries.read().clone()
    }

    pub fn by_plugin(&self, plugin: &str) -> Vec<ToolAction> {
        self.entries
            .read()
            .iter()
            .filter(|t| t.plugin() == plugin)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn reload(&self) -> Result<usize> {
        let entries = loader::load_tools(&self.source_path)?;
        let count = entries.len();
        *self.entries.write() = entries;
        TraceEvent::RegistryReloaded {
            registry: "tools".to_string(),
            entry_count: count,
        }
        .emit();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::{RetryPolicy, ToolTransport};
    use serde_json::json;

    fn sample_tool(name: &str) -> ToolAction {
        ToolAction {
            name: name.to_string(),
            transport: ToolTransport::Stdio,
            endpoint: None,
            method: None,
            input_schema: json!({}),
            output_schema: json!({}),
            timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            auth: None,
            compensate: None,
            idempotent: false,
        }
    }

    #[test]
    fn lookup_by_full_name() {
        let registry = ToolRegistry::from_entries(vec![sample_tool("weather.get")]);
        assert!(registry.lookup("weather.get").is_some());
    }

    #[test]
    fn by_plugin_filters_to_matching_prefix() {
        let registry =
            ToolRegistry::from_entries(vec![sample_tool("weather.get"), sample_tool("alarm.set")]);
        assert_eq!(registry.by_plugin("weather").len(), 1);
    }

    #[test]
    fn malformed_action_name_without_dot_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.toml");
        std::fs::write(
            &path,
            r#"
[[tool]]
name = "notdotted"
transport = "stdio"
input_schema = {}
output_schema = {}
"#,
        )
        .unwrap();
        assert!(ToolRegistry::load(&path).is_err());
    }
}
