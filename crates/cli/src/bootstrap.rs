//! Builds the full C1-C10 pipeline from a [`Config`], the way
//! `crates/gateway/src/main.rs::run_server` builds `AppState` — one field
//! at a time, logging as each piece comes up, except this core has no
//! HTTP router or background axum server at the end.

use std::sync::Arc;

use anyhow::Context;
use sa_catalog::{IntentCatalog, ToolRegistry as CatalogToolRegistry};
use sa_decompose::SubtaskDecomposer;
use sa_domain::config::Config;
use sa_domain::DecisionLog;
use sa_embedding::EmbeddingStore;
use sa_mcp_client::McpManager;
use sa_orchestrator::{Orchestrator, ProgressTracker};
use sa_providers::LlmRouter;
use sa_rag::classifier::RagClassifier;
use sa_sessions::SessionStore;
use sa_slotfill::SlotFiller;
use sa_tools::{ToolRegistry as DispatchToolRegistry, ToolRouter};
use sa_voting::engine::VotingEngine;
use sa_voting::roster::JuryRoster;

/// Capacity of the in-process classification/consensus audit log.
const DECISION_LOG_CAPACITY: usize = 500;

/// Everything a turn needs, built once at startup and shared across the
/// REPL loop and every `run`/`chat` invocation.
pub struct App {
    pub config: Arc<Config>,
    pub intents: Arc<IntentCatalog>,
    pub tools: Arc<CatalogToolRegistry>,
    pub sessions: Arc<SessionStore>,
    pub embeddings: Arc<EmbeddingStore>,
    pub llm: Arc<LlmRouter>,
    pub classifier: Arc<RagClassifier>,
    pub voting: Arc<VotingEngine>,
    pub slotfill: Arc<SlotFiller>,
    pub decomposer: Arc<SubtaskDecomposer>,
    pub orchestrator: Arc<Orchestrator>,
    pub decisions: Arc<DecisionLog>,
}

impl App {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let issues = config.validate();
        for issue in &issues {
            match issue.severity {
                sa_domain::config::ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
                sa_domain::config::ConfigSeverity::Error => tracing::error!("config: {issue}"),
            }
        }
        if issues.iter().any(|i| i.severity == sa_domain::config::ConfigSeverity::Error) {
            anyhow::bail!(
                "config validation failed with {} error(s)",
                issues.iter().filter(|i| i.severity == sa_domain::config::ConfigSeverity::Error).count()
            );
        }

        let intents = Arc::new(load_or_empty_intents(&config)?);
        tracing::info!(count = intents.len(), "intent catalog ready");

        let tools = Arc::new(load_or_empty_tools(&config)?);
        tracing::info!(count = tools.len(), "tool registry ready");

        let sessions = Arc::new(SessionStore::new(
            config.sessions.cache_size,
            config.sessions.version_buffer_size,
            config.sessions.ttl_seconds,
        ));
        tracing::info!("session store ready");

        let embeddings = Arc::new(EmbeddingStore::new(
            config.embedding.similarity,
            config.embedding.hybrid_embedding_weight,
            config.embedding.diversity_threshold,
            config.embedding.max_cluster_size,
            config.embedding.semantic_boost,
        ));
        tracing::info!("embedding store ready");

        let llm = Arc::new(LlmRouter::from_config(&config.llm).context("initializing LLM router")?);
        tracing::info!(providers = llm.registry().len(), "LLM router ready");

        let classifier = Arc::new(RagClassifier::new(
            embeddings.clone(),
            intents.clone(),
            llm.clone(),
            config.rag.clone(),
            config.embedding.default_min_similarity,
            config.llm.default_timeout_ms,
            config.llm.default_timeout_ms,
        ));

        let roster = Arc::new(JuryRoster::from_entries(config.voting.jurors.clone()));
        let voting = Arc::new(VotingEngine::new(llm.clone(), roster, config.voting.clone()));
        tracing::info!(jurors = config.voting.jurors.len(), moe_enabled = config.voting.enabled, "voting engine ready");

        let slotfill = Arc::new(SlotFiller::new(llm.clone(), config.slotfill.clone()));

        let decomposer = Arc::new(SubtaskDecomposer::new(llm.clone(), tools.clone(), config.decomposer.clone()));

        let mcp = if config.mcp.servers.is_empty() {
            tracing::info!("no MCP servers configured");
            Arc::new(McpManager::empty())
        } else {
            tracing::info!(count = config.mcp.servers.len(), "initializing MCP servers");
            Arc::new(McpManager::from_config(&config.mcp).await)
        };

        let dispatch_registry =
            Arc::new(DispatchToolRegistry::with_tools_config(tools.clone(), Some(mcp), &config.tools));
        let router = Arc::new(ToolRouter::new(dispatch_registry, config.orchestrator.circuit_breaker.clone()));
        let tracker = Arc::new(ProgressTracker::new(i64::try_from(config.sessions.ttl_seconds).unwrap_or(3_600)));
        let orchestrator = Arc::new(Orchestrator::new(router, tracker, config.orchestrator.clone()));
        tracing::info!(max_parallel_tasks = config.orchestrator.max_parallel_tasks, "orchestrator ready");

        let decisions = Arc::new(DecisionLog::new(DECISION_LOG_CAPACITY));

        Ok(Self {
            config,
            intents,
            tools,
            sessions,
            embeddings,
            llm,
            classifier,
            voting,
            slotfill,
            decomposer,
            orchestrator,
            decisions,
        })
    }
}

fn load_or_empty_intents(config: &Config) -> anyhow::Result<IntentCatalog> {
    let path = &config.registries.intent_registry_path;
    if path.exists() {
        IntentCatalog::load(path).map_err(|e| anyhow::anyhow!("loading intent registry {}: {e}", path.display()))
    } else {
        tracing::warn!(path = %path.display(), "intent registry not found, starting with an empty catalog");
        Ok(IntentCatalog::empty())
    }
}

fn load_or_empty_tools(config: &Config) -> anyhow::Result<CatalogToolRegistry> {
    let path = &config.registries.tool_registry_path;
    if path.exists() {
        CatalogToolRegistry::load(path).map_err(|e| anyhow::anyhow!("loading tool registry {}: {e}", path.display()))
    } else {
        tracing::warn!(
            path = %path.display(),
            "tool registry not found, starting with only the built-in local actions"
        );
        Ok(CatalogToolRegistry::from_entries(builtin_local_actions()))
    }
}

/// The `exec`/`file` local actions `sa-tools` ships with, registered so a
/// deployment with no tool registry file still has a working set of
/// `"plugin.action"` entries to decompose subtasks against.
fn builtin_local_actions() -> Vec<sa_domain::model::ToolAction> {
    use sa_domain::model::{RetryPolicy, ToolAction, ToolTransport};

    let local = |name: &str, idempotent: bool, required: &[&str]| ToolAction {
        name: name.to_string(),
        transport: ToolTransport::Local,
        endpoint: None,
        method: None,
        input_schema: serde_json::json!({"required": required}),
        output_schema: serde_json::json!({}),
        timeout_ms: 30_000,
        retry: RetryPolicy::default(),
        auth: None,
        compensate: None,
        idempotent,
    };

    vec![
        local("exec.run", false, &["command"]),
        local("file.read", true, &["path"]),
        local("file.write", false, &["path", "content"]),
        local("file.append", false, &["path", "content"]),
        local("file.move", false, &["source", "destination"]),
        local("file.delete", false, &["path"]),
        local("file.list", true, &["path"]),
    ]
}
