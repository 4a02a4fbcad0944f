//! Dispatches a resolved [`ToolAction`] over HTTP, stdio (MCP), or the
//! in-process `Local` transport (the built-in `exec`/`file` plugins), with
//! schema validation, per-attempt timeout, retry/backoff, and a circuit
//! breaker guarding each `"plugin.action"` pair.
//!
//! Grounded on `crates/providers/src/router.rs`'s "try, classify the
//! error, back off, try again" control flow — the same shape, generalized
//! from LLM fallback-by-role to tool retry-by-policy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use sa_domain::error::{Error, Result};
use sa_domain::model::{BackoffKind, ToolAction, ToolResponse, ToolResponseKind, ToolTransport};

use crate::circuit_breaker::{Admission, CircuitBreakerRegistry};
use crate::registry::ToolRegistry;

/// Dispatches declared tool actions through their transport, with retry,
/// timeout, and circuit-breaker admission control.
pub struct ToolRouter {
    registry: Arc<ToolRegistry>,
    breakers: CircuitBreakerRegistry,
}

impl ToolRouter {
    pub fn new(
        registry: Arc<ToolRegistry>,
        circuit_breaker_config: sa_domain::config::CircuitBreakerConfig,
    ) -> Self {
        Self {
            registry,
            breakers: CircuitBreakerRegistry::new(circuit_breaker_config),
        }
    }

    /// The declared-action registry this router dispatches through, so
    /// callers (e.g. `sa-orchestrator`'s rollback step) can resolve an
    /// action's metadata without re-deriving their own registry handle.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Resolve `name`, validate `arguments` against its input schema, and
    /// dispatch it with retry/backoff through the breaker.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolResponse> {
        let action = self.registry.resolve(name)?;
        validate_against_schema(&action.input_schema, &arguments)?;

        let breaker_key = action.name.as_str();
        if self.breakers.admit(breaker_key) == Admission::Reject {
            return Err(Error::Dependency(format!(
                "circuit breaker open for '{breaker_key}'"
            )));
        }

        let mut attempt: u32 = 0;
        loop {
            let result = self.dispatch_once(&action, &arguments).await;
            match result {
                Ok(response) => {
                    self.breakers.record_success(breaker_key);
                    return Ok(response);
                }
                Err(e) => {
                    let retriable = e.is_retriable() && action.idempotent;
                    self.breakers.record_failure(breaker_key);

                    if !retriable || attempt >= action.retry.max {
                        return Err(e);
                    }

                    let delay = backoff_delay(&action.retry, attempt);
                    tracing::warn!(
                        tool = %action.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "tool dispatch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn dispatch_once(&self, action: &ToolAction, arguments: &Value) -> Result<ToolResponse> {
        let timeout = Duration::from_millis(action.timeout_ms);
        let call = async {
            match action.transport {
                ToolTransport::Http => self.dispatch_http(action, arguments).await,
                ToolTransport::Stdio => self.dispatch_stdio(action, arguments).await,
                ToolTransport::Local => self.dispatch_local(action, arguments).await,
            }
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: format!("tool:{}", action.name),
                elapsed_ms: action.timeout_ms,
            }),
        }
    }

    async fn dispatch_http(&self, action: &ToolAction, arguments: &Value) -> Result<ToolResponse> {
        let endpoint = action
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::Configuration(format!("tool '{}' has no endpoint", action.name)))?;
        let method = action.method.as_deref().unwrap_or("POST");

        let mut builder = self
            .registry
            .http_client()
            .request(
                method.parse().map_err(|_| {
                    Error::Configuration(format!("tool '{}' has invalid method '{method}'", action.name))
                })?,
                endpoint,
            )
            .json(arguments);

        if let Some(auth) = &action.auth {
            let token = std::env::var(&auth.env).map_err(|_| {
                Error::Configuration(format!(
                    "tool '{}' requires env var '{}' which is unset",
                    action.name, auth.env
                ))
            })?;
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::provider_from_status(action.name.clone(), 0, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provider_from_status(
                action.name.clone(),
                status.as_u16(),
                body,
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::ProviderPermanent {
                provider: action.name.clone(),
                message: format!("malformed JSON response: {e}"),
            })?;

        validate_against_schema(&action.output_schema, &body)?;

        Ok(ToolResponse {
            kind: ToolResponseKind::ToolResult,
            content: body,
            mime_type: Some("application/json".into()),
            metadata: Default::default(),
            stream: false,
        })
    }

    async fn dispatch_stdio(&self, action: &ToolAction, arguments: &Value) -> Result<ToolResponse> {
        let mcp = self.registry.mcp().ok_or_else(|| {
            Error::Configuration(format!(
                "tool '{}' declares stdio transport but no MCP manager is configured",
                action.name
            ))
        })?;

        let result = mcp
            .call_tool(action.plugin(), action.action(), arguments.clone())
            .await
            .map_err(|e| Error::ProviderTransient {
                provider: action.name.clone(),
                message: e.to_string(),
            })?;

        let content = serde_json::to_value(&result.content).unwrap_or(Value::Null);
        if result.is_error {
            return Err(Error::ProviderPermanent {
                provider: action.name.clone(),
                message: format!("tool reported an error: {content}"),
            });
        }

        Ok(ToolResponse {
            kind: ToolResponseKind::ToolResult,
            content,
            mime_type: None,
            metadata: Default::default(),
            stream: false,
        })
    }

    /// Dispatches the in-process exec/file-ops plugins by the action's
    /// `action()` half of its `"plugin.action"` name (e.g. `"exec.run"`
    /// dispatches to `exec::exec`, `"file.read"` to `file_ops::file_read`).
    async fn dispatch_local(&self, action: &ToolAction, arguments: &Value) -> Result<ToolResponse> {
        let content = match action.action() {
            "run" if action.plugin() == "exec" => {
                let req: crate::exec::ExecRequest = serde_json::from_value(arguments.clone())
                    .map_err(|e| Error::Validation(format!("invalid exec.run arguments: {e}")))?;
                reject_denied_command(self.registry.exec_security(), &req.command)?;
                let response = crate::exec::exec(self.registry.process_manager(), req).await;
                serde_json::to_value(response).unwrap_or(Value::Null)
            }
            "read" | "write" | "append" | "move" | "delete" | "list" if action.plugin() == "file" => {
                self.dispatch_file_op(action.action(), arguments).await?
            }
            other => {
                return Err(Error::Configuration(format!(
                    "tool '{}' declares local transport but '{other}' is not a registered built-in action",
                    action.name
                )));
            }
        };

        Ok(ToolResponse {
            kind: ToolResponseKind::ToolResult,
            content,
            mime_type: Some("application/json".into()),
            metadata: Default::default(),
            stream: false,
        })
    }

    async fn dispatch_file_op(&self, op: &str, arguments: &Value) -> Result<Value> {
        use crate::file_ops::{
            file_append, file_delete, file_list, file_move, file_read, file_write,
            FileAppendRequest, FileDeleteRequest, FileListRequest, FileMoveRequest,
            FileReadRequest, FileWriteRequest,
        };

        let root = self.registry.workspace_root();
        let invalid = |e: serde_json::Error| Error::Validation(format!("invalid file.{op} arguments: {e}"));
        let failed = |e: String| Error::ProviderPermanent {
            provider: format!("file.{op}"),
            message: e,
        };

        match op {
            "read" => {
                let req: FileReadRequest = serde_json::from_value(arguments.clone()).map_err(invalid)?;
                file_read(root, req).await.map_err(failed)
            }
            "write" => {
                let req: FileWriteRequest = serde_json::from_value(arguments.clone()).map_err(invalid)?;
                file_write(root, req).await.map_err(failed)
            }
            "append" => {
                let req: FileAppendRequest = serde_json::from_value(arguments.clone()).map_err(invalid)?;
                file_append(root, req).await.map_err(failed)
            }
            "move" => {
                let req: FileMoveRequest = serde_json::from_value(arguments.clone()).map_err(invalid)?;
                file_move(root, req).await.map_err(failed)
            }
            "delete" => {
                let req: FileDeleteRequest = serde_json::from_value(arguments.clone()).map_err(invalid)?;
                file_delete(root, req).await.map_err(failed)
            }
            "list" => {
                let req: FileListRequest = serde_json::from_value(arguments.clone()).map_err(invalid)?;
                file_list(root, req).await.map_err(failed)
            }
            _ => unreachable!("filtered by dispatch_local's match arm"),
        }
    }
}

/// Rejects a command matching any of `exec_security.denied_patterns`,
/// independent of the generic schema validation above — the denylist is a
/// security control, not an input-shape check.
fn reject_denied_command(exec_security: &sa_domain::config::ExecSecurityConfig, command: &str) -> Result<()> {
    for pattern in &exec_security.denied_patterns {
        let re = regex::Regex::new(pattern)
            .map_err(|e| Error::Configuration(format!("invalid exec denylist pattern '{pattern}': {e}")))?;
        if re.is_match(command) {
            if exec_security.audit_log {
                tracing::warn!(command = %command, pattern = %pattern, "exec command rejected by denylist");
            }
            return Err(Error::Validation(format!(
                "command rejected: matches denied pattern '{pattern}'"
            )));
        }
    }
    if exec_security.audit_log {
        tracing::info!(command = %command, "exec command admitted");
    }
    Ok(())
}

/// Structural check that every required property the schema names is
/// present in `value`. Not a full JSON Schema validator — the corpus this
/// crate is grounded on has no schema-validation dependency, so this stays
/// within what `serde_json` alone can express.
fn validate_against_schema(schema: &Value, value: &Value) -> Result<()> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let obj = value.as_object();
    for field in required {
        let Some(field) = field.as_str() else { continue };
        let present = obj.map(|o| o.contains_key(field)).unwrap_or(false);
        if !present {
            return Err(Error::Validation(format!("missing required field '{field}'")));
        }
    }
    Ok(())
}

fn backoff_delay(policy: &sa_domain::model::RetryPolicy, attempt: u32) -> Duration {
    let ms = match policy.backoff {
        BackoffKind::Fixed => policy.min_ms,
        BackoffKind::Exponential => policy.min_ms.saturating_mul(1u64 << attempt.min(16)),
    };
    Duration::from_millis(ms.min(policy.max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::RetryPolicy;
    use serde_json::json;

    #[test]
    fn validate_rejects_missing_required_field() {
        let schema = json!({"required": ["city"]});
        let err = validate_against_schema(&schema, &json!({})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn validate_passes_when_field_present() {
        let schema = json!({"required": ["city"]});
        assert!(validate_against_schema(&schema, &json!({"city": "NYC"})).is_ok());
    }

    #[test]
    fn validate_noop_without_required_list() {
        assert!(validate_against_schema(&json!({}), &json!({"anything": 1})).is_ok());
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max: 5,
            backoff: BackoffKind::Exponential,
            min_ms: 100,
            max_ms: 1_000,
        };
        assert_eq!(backoff_delay(&policy, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&policy, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(&policy, 10), Duration::from_millis(1_000));
    }

    #[test]
    fn fixed_backoff_stays_constant() {
        let policy = RetryPolicy {
            max: 5,
            backoff: BackoffKind::Fixed,
            min_ms: 250,
            max_ms: 5_000,
        };
        assert_eq!(backoff_delay(&policy, 0), Duration::from_millis(250));
        assert_eq!(backoff_delay(&policy, 4), Duration::from_millis(250));
    }

    #[test]
    fn denylist_rejects_matching_command() {
        let cfg = sa_domain::config::ExecSecurityConfig::default();
        let err = reject_denied_command(&cfg, "rm -rf /").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn denylist_admits_harmless_command() {
        let cfg = sa_domain::config::ExecSecurityConfig::default();
        assert!(reject_denied_command(&cfg, "ls -la").is_ok());
    }

    #[tokio::test]
    async fn local_transport_dispatches_file_write_and_read() {
        use sa_catalog::ToolRegistry as CatalogToolRegistry;
        use sa_domain::config::ToolsConfig;
        use sa_domain::model::ToolTransport;

        let dir = tempfile::tempdir().unwrap();
        let mut tools_config = ToolsConfig::default();
        tools_config.workspace_root = dir.path().to_path_buf();

        let local_action = |name: &str| ToolAction {
            name: name.to_string(),
            transport: ToolTransport::Local,
            endpoint: None,
            method: None,
            input_schema: json!({}),
            output_schema: json!({}),
            timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            auth: None,
            compensate: None,
            idempotent: false,
        };

        let catalog = std::sync::Arc::new(CatalogToolRegistry::from_entries(vec![
            local_action("file.write"),
            local_action("file.read"),
        ]));
        let registry = std::sync::Arc::new(ToolRegistry::with_tools_config(catalog, None, &tools_config));
        let router = ToolRouter::new(registry, sa_domain::config::CircuitBreakerConfig::default());

        router
            .dispatch("file.write", json!({"path": "hello.txt", "content": "hi there"}))
            .await
            .unwrap();

        let response = router.dispatch("file.read", json!({"path": "hello.txt"})).await.unwrap();
        assert_eq!(response.content["content"], json!("hi there"));
    }
}
