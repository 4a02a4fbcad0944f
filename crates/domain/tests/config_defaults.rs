use sa_domain::config::{AuthMode, Config, ProviderKind};

#[test]
fn default_ttl_is_thirty_minutes() {
    let config = Config::default();
    assert_eq!(config.sessions.ttl_seconds, 1_800);
}

#[test]
fn default_has_no_llm_providers() {
    let config = Config::default();
    assert!(config.llm.providers.is_empty());
}

#[test]
fn explicit_provider_parses() {
    let toml_str = r#"
[[llm.providers]]
id = "openai"
kind = "openai_compat"
base_url = "https://api.openai.com/v1"

[llm.providers.auth]
mode = "api_key"
env = "OPENAI_API_KEY"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.llm.providers.len(), 1);
    assert_eq!(config.llm.providers[0].kind, ProviderKind::OpenaiCompat);
    assert_eq!(config.llm.providers[0].auth.mode, AuthMode::ApiKey);
}

#[test]
fn validate_flags_missing_providers_as_warning_only() {
    let config = Config::default();
    let issues = config.validate();
    assert!(issues.iter().any(|i| i.field == "llm.providers"));
}
