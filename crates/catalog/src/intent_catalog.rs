use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sa_domain::error::Result;
use sa_domain::model::IntentDefinition;
use sa_domain::trace::TraceEvent;

use crate::loader;

/// Hot-reloadable, in-memory index of [`IntentDefinition`]s. Readers take a
/// clone of the entry they need; `reload` swaps the whole snapshot under a
/// single write lock so a lookup never observes a half-updated catalog.
pub struct IntentCatalog {
    entries: RwLock<Vec<IntentDefinition>>,
    source_path: PathBuf,
}

impl IntentCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let entries = loader::load_intents(path)?;
        tracing::info!(intent_count = entries.len(), path = %path.display(), "intent catalog loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            source_path: path.to_path_buf(),
        })
    }

    pub fn from_entries(entries: Vec<IntentDefinition>) -> Self {
        Self {
            entries: RwLock::new(entries),
            source_path: PathBuf::new(),
        }
    }

    pub fn empty() -> Self {
        Self::from_entries(Vec::new())
    }

    pub fn lookup(&self, id: &str) -> Option<IntentDefinition> {
        self.entries.read().iter().find(|i| i.id == id).cloned()
    }

    pub fn all(&self) -> Vec<IntentDefinition> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Re-reads the backing file and swaps the snapshot atomically.
    /// Leaves the previous snapshot in place if the file fails to parse.
    pub fn reload(&self) -> Result<usize> {
        let entries = loader::load_intents(&self.source_path)?;
        let count = entries.len();
        *self.entries.write() = entries;
        TraceEvent::RegistryReloaded {
            registry: "intents".to_string(),
            entry_count: count,
        }
        .emit();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_intent(id: &str) -> IntentDefinition {
        IntentDefinition {
            id: id.to_string(),
            description: "test intent".to_string(),
            examples: vec!["hello".to_string()],
            required_slots: vec![],
            optional_slots: vec![],
            tool_action: None,
            expert_domain: None,
            confidence_threshold: 0.6,
            max_rag_examples: 5,
            slot_questions: Default::default(),
        }
    }

    #[test]
    fn lookup_finds_existing_id() {
        let catalog = IntentCatalog::from_entries(vec![sample_intent("weather.get")]);
        assert!(catalog.lookup("weather.get").is_some());
        assert!(catalog.lookup("ghost").is_none());
    }

    #[test]
    fn all_returns_full_snapshot() {
        let catalog = IntentCatalog::from_entries(vec![sample_intent("a"), sample_intent("b")]);
        assert_eq!(catalog.all().len(), 2);
    }

    #[test]
    fn reload_swaps_in_new_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.toml");
        std::fs::write(
            &path,
            r#"
[[intent]]
id = "weather.get"
description = "check weather"
examples = ["what's the weather"]
"#,
        )
        .unwrap();
        let catalog = IntentCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);

        std::fs::write(
            &path,
            r#"
[[intent]]
id = "weather.get"
description = "check weather"
examples = ["what's the weather"]

[[intent]]
id = "alarm.set"
description = "set an alarm"
examples = ["wake me up at 7"]
"#,
        )
        .unwrap();
        let count = catalog.reload().unwrap();
        assert_eq!(count, 2);
        assert!(catalog.lookup("alarm.set").is_some());
    }

    #[test]
    fn slot_name_collision_between_required_and_optional_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.toml");
        std::fs::write(
            &path,
            r#"
[[intent]]
id = "bad.intent"
description = "broken"
examples = ["x"]
[[intent.required_slots]]
name = "city"
[[intent.optional_slots]]
name = "city"
"#,
        )
        .unwrap();
        assert!(IntentCatalog::load(&path).is_err());
    }
}
