use std::path::Path;

use sa_domain::error::{Error, Result};
use sa_domain::model::{IntentDefinition, ToolAction};

#[derive(serde::Deserialize)]
struct IntentFile {
    #[serde(default)]
    intent: Vec<IntentDefinition>,
}

#[derive(serde::Deserialize)]
struct ToolFile {
    #[serde(default)]
    tool: Vec<ToolAction>,
}

pub fn load_intents(path: &Path) -> Result<Vec<IntentDefinition>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
    let file: IntentFile = toml::from_str(&raw)
        .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))?;
    for intent in &file.intent {
        if !intent.slots_disjoint() {
            return Err(Error::Configuration(format!(
                "intent '{}' has a slot name in both required_slots and optional_slots",
                intent.id
            )));
        }
    }
    Ok(file.intent)
}

pub fn load_tools(path: &Path) -> Result<Vec<ToolAction>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
    let file: ToolFile = toml::from_str(&raw)
        .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))?;
    for tool in &file.tool {
        if tool.plugin().is_empty() || tool.action().is_empty() {
            return Err(Error::Configuration(format!(
                "tool action '{}' must be addressed as 'plugin.action'",
                tool.name
            )));
        }
    }
    Ok(file.tool)
}
