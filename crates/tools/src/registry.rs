//! Resolves a `"plugin.action"` name to its declared [`ToolAction`] and the
//! transport handle needed to dispatch it.
//!
//! The declarative half — "what does this action look like" — lives in
//! `sa_catalog::ToolRegistry`; this module is the dispatch-facing wrapper
//! `sa-tools::router` resolves through, adding the shared `reqwest::Client`
//! and optional MCP manager that HTTP/stdio dispatch need.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sa_catalog::ToolRegistry as CatalogToolRegistry;
use sa_domain::config::{ExecSecurityConfig, ToolsConfig};
use sa_domain::error::{Error, Result};
use sa_domain::model::ToolAction;
use sa_mcp_client::McpManager;

use crate::manager::ProcessManager;

/// Dispatch-facing view over the declared tool catalog.
pub struct ToolRegistry {
    catalog: Arc<CatalogToolRegistry>,
    http_client: reqwest::Client,
    mcp: Option<Arc<McpManager>>,
    process_manager: Arc<ProcessManager>,
    workspace_root: PathBuf,
    exec_security: ExecSecurityConfig,
}

impl ToolRegistry {
    pub fn new(catalog: Arc<CatalogToolRegistry>, mcp: Option<Arc<McpManager>>) -> Self {
        Self::with_tools_config(catalog, mcp, &ToolsConfig::default())
    }

    /// Builds the dispatch registry wiring the built-in `Local` transport
    /// (exec/file-ops) through `tools_config`, in addition to the HTTP and
    /// stdio (MCP) transports every registry carries.
    pub fn with_tools_config(
        catalog: Arc<CatalogToolRegistry>,
        mcp: Option<Arc<McpManager>>,
        tools_config: &ToolsConfig,
    ) -> Self {
        Self {
            catalog,
            http_client: reqwest::Client::new(),
            mcp,
            process_manager: Arc::new(ProcessManager::new(tools_config.exec.clone())),
            workspace_root: tools_config.workspace_root.clone(),
            exec_security: tools_config.exec_security.clone(),
        }
    }

    /// Resolve `name` (`"plugin.action"`) to its declaration, erroring if
    /// the action isn't registered.
    pub fn resolve(&self, name: &str) -> Result<ToolAction> {
        self.catalog
            .lookup(name)
            .ok_or_else(|| Error::Dependency(format!("unknown tool action '{name}'")))
    }

    pub fn all(&self) -> Vec<ToolAction> {
        self.catalog.all()
    }

    pub fn by_plugin(&self, plugin: &str) -> Vec<ToolAction> {
        self.catalog.by_plugin(plugin)
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub(crate) fn mcp(&self) -> Option<&Arc<McpManager>> {
        self.mcp.as_ref()
    }

    pub(crate) fn process_manager(&self) -> &Arc<ProcessManager> {
        &self.process_manager
    }

    pub(crate) fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub(crate) fn exec_security(&self) -> &ExecSecurityConfig {
        &self.exec_security
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::{RetryPolicy, ToolTransport};
    use serde_json::json;

    fn sample(name: &str) -> ToolAction {
        ToolAction {
            name: name.to_string(),
            transport: ToolTransport::Http,
            endpoint: Some("https://example.invalid/run".into()),
            method: Some("POST".into()),
            input_schema: json!({}),
            output_schema: json!({}),
            timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            auth: None,
            compensate: None,
            idempotent: false,
        }
    }

    #[test]
    fn resolve_finds_registered_action() {
        let catalog = Arc::new(CatalogToolRegistry::from_entries(vec![sample("weather.query")]));
        let registry = ToolRegistry::new(catalog, None);
        assert_eq!(registry.resolve("weather.query").unwrap().name, "weather.query");
    }

    #[test]
    fn resolve_errors_on_unknown_action() {
        let catalog = Arc::new(CatalogToolRegistry::empty());
        let registry = ToolRegistry::new(catalog, None);
        assert!(matches!(
            registry.resolve("nope.run"),
            Err(Error::Dependency(_))
        ));
    }
}
