//! `serialagent doctor` — diagnostic checks against the current config and
//! the components it wires up.
//!
//! Grounded on `crates/gateway/src/cli/doctor.rs`'s `check_*`/`print_check`
//! pattern, adapted to this core's components (no SerialMemory or workspace
//! checks — those belonged to the teacher's agent-memory layer, which this
//! core doesn't have).

use sa_domain::config::Config;

use crate::bootstrap::App;

fn print_check(name: &str, passed: bool, detail: &str) {
    let mark = if passed { "OK" } else { "FAIL" };
    println!("[{mark}] {name}: {detail}");
}

fn check_config_file(config_path: &str) -> bool {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "config file",
        true,
        if exists { &format!("found {config_path}") } else { &format!("{config_path} not found, using defaults") },
    );
    true
}

fn check_config_validation(config: &Config) -> bool {
    let issues = config.validate();
    let errors = issues.iter().filter(|i| i.severity == sa_domain::config::ConfigSeverity::Error).count();
    print_check("config validation", errors == 0, &format!("{} issue(s), {errors} error(s)", issues.len()));
    errors == 0
}

fn check_intent_registry(config: &Config, app: &App) -> bool {
    let path = &config.registries.intent_registry_path;
    let passed = !app.intents.is_empty();
    print_check(
        "intent registry",
        passed,
        &format!("{} intent(s) loaded from {}", app.intents.len(), path.display()),
    );
    passed
}

fn check_tool_registry(config: &Config, app: &App) -> bool {
    let path = &config.registries.tool_registry_path;
    let passed = !app.tools.is_empty();
    print_check("tool registry", passed, &format!("{} action(s) loaded from {}", app.tools.len(), path.display()));
    passed
}

fn check_llm_providers(app: &App) -> bool {
    let count = app.llm.registry().len();
    print_check("LLM providers", count > 0, &format!("{count} provider(s) configured"));
    count > 0
}

fn check_voting(config: &Config) -> bool {
    let jurors = config.voting.jurors.len();
    let passed = !config.voting.enabled || jurors > 0;
    print_check(
        "voting jury",
        passed,
        &if config.voting.enabled {
            format!("{jurors} juror(s) configured")
        } else {
            "voting disabled, classifier result used directly".to_string()
        },
    );
    passed
}

/// Runs every check, printing `[OK]`/`[FAIL]` lines, and returns `true` only
/// if all of them passed.
pub fn doctor(config: &Config, config_path: &str, app: &App) -> bool {
    let mut all_ok = true;
    all_ok &= check_config_file(config_path);
    all_ok &= check_config_validation(config);
    all_ok &= check_intent_registry(config, app);
    all_ok &= check_tool_registry(config, app);
    all_ok &= check_llm_providers(app);
    all_ok &= check_voting(config);
    all_ok
}
