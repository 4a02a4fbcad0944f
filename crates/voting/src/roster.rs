//! Hot-reloadable jury roster (`[[juror]]` entries), mirroring
//! `crates/catalog/src/intent_catalog.rs` and `crates/catalog/src/loader.rs`:
//! the same atomic-swap-under-one-write-lock registry shape, generalized
//! from `IntentDefinition`/`ToolAction` rows to `JurorConfig` rows.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sa_domain::config::JurorConfig;
use sa_domain::error::{Error, Result};
use sa_domain::trace::TraceEvent;

#[derive(serde::Deserialize)]
struct JuryFile {
    #[serde(default)]
    juror: Vec<JurorConfig>,
}

fn load_jurors(path: &Path) -> Result<Vec<JurorConfig>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
    let file: JuryFile = toml::from_str(&raw)
        .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))?;
    for juror in &file.juror {
        if juror.id.is_empty() {
            return Err(Error::Configuration("juror entry missing an id".to_string()));
        }
        if juror.provider.is_empty() {
            return Err(Error::Configuration(format!("juror '{}' missing a provider", juror.id)));
        }
    }
    Ok(file.juror)
}

pub struct JuryRoster {
    entries: RwLock<Vec<JurorConfig>>,
    source_path: PathBuf,
}

impl JuryRoster {
    pub fn load(path: &Path) -> Result<Self> {
        let entries = load_jurors(path)?;
        tracing::info!(juror_count = entries.len(), path = %path.display(), "jury roster loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            source_path: path.to_path_buf(),
        })
    }

    pub fn from_entries(entries: Vec<JurorConfig>) -> Self {
        Self {
            entries: RwLock::new(entries),
            source_path: PathBuf::new(),
        }
    }

    pub fn empty() -> Self {
        Self::from_entries(Vec::new())
    }

    pub fn all(&self) -> Vec<JurorConfig> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn reload(&self) -> Result<usize> {
        let entries = load_jurors(&self.source_path)?;
        let count = entries.len();
        *self.entries.write() = entries;
        TraceEvent::RegistryReloaded {
            registry: "jury".to_string(),
            entry_count: count,
        }
        .emit();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn juror(id: &str) -> JurorConfig {
        JurorConfig {
            id: id.to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            role: String::new(),
            weight: 1.0,
            temperature: 0.2,
            max_tokens: 512,
            prompt_template: None,
        }
    }

    #[test]
    fn all_returns_full_snapshot() {
        let roster = JuryRoster::from_entries(vec![juror("a"), juror("b")]);
        assert_eq!(roster.all().len(), 2);
    }

    #[test]
    fn load_parses_toml_array_of_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jury.toml");
        std::fs::write(
            &path,
            r#"
[[juror]]
id = "a"
provider = "openai"
model = "gpt-4o"
weight = 1.0

[[juror]]
id = "b"
provider = "anthropic"
model = "claude-3-5-sonnet"
weight = 0.8
"#,
        )
        .unwrap();
        let roster = JuryRoster::load(&path).unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn missing_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jury.toml");
        std::fs::write(&path, "[[juror]]\nprovider = \"openai\"\nmodel = \"gpt-4o\"\n").unwrap();
        assert!(JuryRoster::load(&path).is_err());
    }

    #[test]
    fn reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jury.toml");
        std::fs::write(&path, "[[juror]]\nid = \"a\"\nprovider = \"openai\"\nmodel = \"gpt-4o\"\n").unwrap();
        let roster = JuryRoster::load(&path).unwrap();
        assert_eq!(roster.len(), 1);
        std::fs::write(
            &path,
            "[[juror]]\nid = \"a\"\nprovider = \"openai\"\nmodel = \"gpt-4o\"\n[[juror]]\nid = \"b\"\nprovider = \"anthropic\"\nmodel = \"claude\"\n",
        )
        .unwrap();
        assert_eq!(roster.reload().unwrap(), 2);
    }
}
