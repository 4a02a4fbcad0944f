mod decompose;
mod embedding;
mod llm;
mod mcp;
mod orchestrator;
mod rag;
mod registries;
mod sessions;
mod slotfill;
mod tools;
mod voting;

pub use decompose::*;
pub use embedding::*;
pub use llm::*;
pub use mcp::*;
pub use orchestrator::*;
pub use rag::*;
pub use registries::*;
pub use sessions::*;
pub use slotfill::*;
pub use tools::*;
pub use voting::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub registries: RegistriesConfig,
    #[serde(default)]
    pub embedding: EmbeddingStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub voting: VotingConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub slotfill: SlotFillConfig,
    #[serde(default)]
    pub decomposer: DecomposerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

impl Config {
    /// Load from a TOML string, falling back to defaults on a missing file
    /// at the call site (config-file I/O itself is out of scope here).
    pub fn load_or_default(toml_str: Option<&str>) -> Result<Self, toml::de::Error> {
        match toml_str {
            Some(s) => toml::from_str(s),
            None => Ok(Self::default()),
        }
    }
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
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; any `Error`-severity issue should
    /// block startup (ConfigurationError, §7 — fatal at load/reload, prior
    /// snapshot retained).
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.llm.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }

            let needs_credentials =
                matches!(provider.auth.mode, AuthMode::ApiKey | AuthMode::QueryParam);
            if needs_credentials {
                let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
                let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
                let has_keys = !provider.auth.keys.is_empty();
                if !has_env && !has_key && !has_keys {
                    issues.push(ConfigIssue {
                        severity: ConfigSeverity::Error,
                        field: format!("llm.providers[{i}].auth"),
                        message: format!(
                            "provider \"{}\" uses {:?} auth mode but has no auth.env, auth.key, or auth.keys configured",
                            provider.id, provider.auth.mode
                        ),
                    });
                }
            }
        }

        // Confidence weights should sum to ~1 (normalised on load elsewhere,
        // but surfaced here so a misconfigured file is visible before that).
        let weight_sum = self.rag.confidence_weights.sum();
        if (weight_sum - 1.0).abs() > 0.01 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "rag.confidence_weights".into(),
                message: format!("weights sum to {weight_sum:.3}, expected 1.0 — will be normalised"),
            });
        }

        if self.voting.enabled && self.voting.jurors.len() < self.voting.min_votes {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "voting.jurors".into(),
                message: format!(
                    "roster has {} jurors, fewer than min_votes={} — consensus will fail unless the roster grows",
                    self.voting.jurors.len(),
                    self.voting.min_votes
                ),
            });
        }

        if let Some(primary) = &self.voting.primary_juror_id {
            if !self.voting.jurors.iter().any(|j| &j.id == primary) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "voting.primary_juror_id".into(),
                    message: format!("\"{primary}\" does not match any configured juror id"),
                });
            }
        }

        if self.sessions.compression_threshold <= self.sessions.keep_last_turns {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "sessions.compression_threshold".into(),
                message: "compression_threshold must be greater than keep_last_turns".into(),
            });
        }

        for (i, pattern) in self.tools.exec_security.denied_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("tools.exec_security.denied_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }

        let mut seen_mcp_ids: HashSet<&str> = HashSet::new();
        for (i, server) in self.mcp.servers.iter().enumerate() {
            if server.id.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].id"),
                    message: "server id must not be empty".into(),
                });
            }
            if server.id.contains(':') {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].id"),
                    message: "server id must not contain ':' (used as tool name delimiter)".into(),
                });
            }
            if server.transport == McpTransportKind::Stdio && server.command.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].command"),
                    message: "stdio transport requires a non-empty command".into(),
                });
            }
            if !server.id.is_empty() && !seen_mcp_ids.insert(&server.id) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].id"),
                    message: format!("duplicate MCP server id \"{}\"", server.id),
                });
            }
        }

        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config {
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        mode: AuthMode::ApiKey,
                        env: Some("OPENAI_API_KEY".into()),
                        ..AuthConfig::default()
                    },
                    default_model: None,
                }],
                ..LlmConfig::default()
            },
            ..Config::default()
        };
        cfg.voting.jurors = vec![
            JurorConfig {
                id: "a".into(),
                provider: "openai".into(),
                model: "gpt-4o".into(),
                role: "default".into(),
                weight: 1.0,
                temperature: 0.2,
                max_tokens: 256,
                prompt_template: None,
            },
            JurorConfig {
                id: "b".into(),
                provider: "openai".into(),
                model: "gpt-4o-mini".into(),
                role: "default".into(),
                weight: 1.0,
                temperature: 0.2,
                max_tokens: 256,
                prompt_template: None,
            },
        ];
        cfg
    }

    fn find_issue<'a>(issues: &'a [ConfigIssue], field_prefix: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn no_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.providers.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn too_few_jurors_is_warning() {
        let mut cfg = valid_config();
        cfg.voting.jurors.truncate(1);
        cfg.voting.min_votes = 2;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "voting.jurors").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn unknown_primary_juror_is_error() {
        let mut cfg = valid_config();
        cfg.voting.primary_juror_id = Some("nope".into());
        let issues = cfg.validate();
        let issue = find_issue(&issues, "voting.primary_juror_id").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn compression_threshold_must_exceed_keep_last_turns() {
        let mut cfg = valid_config();
        cfg.sessions.compression_threshold = 5;
        cfg.sessions.keep_last_turns = 10;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "sessions.compression_threshold").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn invalid_denied_pattern_is_error() {
        let mut cfg = valid_config();
        cfg.tools.exec_security.denied_patterns = vec![r"[invalid".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "tools.exec_security.denied_patterns[0]")
            .expect("expected regex error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn config_issue_display_format() {
        let err = ConfigIssue {
            severity: ConfigSeverity::Error,
            field: "voting.min_votes".into(),
            message: "must be >= 1".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] voting.min_votes: must be >= 1");
    }
}
