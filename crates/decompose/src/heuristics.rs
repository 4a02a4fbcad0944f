//! Connector/conditional detection (spec §4.8 "Heuristics (design-level)").
//!
//! These hints never decide the plan themselves — they are folded into the
//! LLM prompt as ordering cues, the way `sa-rag`'s prompt builder folds
//! session hints into the classification prompt. The only code-level
//! decision heuristics make on their own is the single-subtask fallback in
//! [`crate::decomposer`] when the LLM returns nothing parseable.

use sa_domain::config::DecomposerConfig;

/// Connector/conditional words detected in an utterance, case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorHints {
    pub sequence_matches: Vec<String>,
    pub conditional_matches: Vec<String>,
}

impl ConnectorHints {
    pub fn suggests_ordering(&self) -> bool {
        !self.sequence_matches.is_empty() || !self.conditional_matches.is_empty()
    }

    /// A short natural-language hint folded into the decomposition prompt.
    pub fn as_prompt_hint(&self) -> Option<String> {
        if !self.suggests_ordering() {
            return None;
        }
        let mut parts = Vec::new();
        if !self.sequence_matches.is_empty() {
            parts.push(format!(
                "sequencing connectors detected ({}) — later clauses likely depend on earlier ones",
                self.sequence_matches.join(", ")
            ));
        }
        if !self.conditional_matches.is_empty() {
            parts.push(format!(
                "conditional connectors detected ({}) — the consequent clause likely depends on the \
                 condition clause's subtask result",
                self.conditional_matches.join(", ")
            ));
        }
        Some(parts.join("; "))
    }
}

/// Scans `text` for the configured connector keywords. Matching is whole-word,
/// case-insensitive, and tries every configured language's keyword list
/// (spec's examples mix Spanish and English connectors in the same pass).
pub fn detect_connectors(text: &str, config: &DecomposerConfig) -> ConnectorHints {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let sequence_matches = config
        .sequence_connectors
        .iter()
        .filter(|kw| words.contains(&kw.to_lowercase().as_str()))
        .cloned()
        .collect();
    let conditional_matches = config
        .conditional_connectors
        .iter()
        .filter(|kw| words.contains(&kw.to_lowercase().as_str()))
        .cloned()
        .collect();

    ConnectorHints { sequence_matches, conditional_matches }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_spanish_conditional_connector() {
        let hints = detect_connectors(
            "consulta el tiempo de Madrid y programa una alarma si va a llover",
            &DecomposerConfig::default(),
        );
        assert!(hints.sequence_matches.contains(&"y".to_string()));
        assert!(hints.conditional_matches.contains(&"si".to_string()));
        assert!(hints.suggests_ordering());
    }

    #[test]
    fn no_connectors_means_no_hint() {
        let hints = detect_connectors("set a timer for five minutes", &DecomposerConfig::default());
        assert!(!hints.suggests_ordering());
        assert!(hints.as_prompt_hint().is_none());
    }

    #[test]
    fn word_boundary_avoids_substring_false_positive() {
        // "and" inside "android" should not count as the connector "and".
        let mut cfg = DecomposerConfig::default();
        cfg.sequence_connectors = vec!["and".to_string()];
        let hints = detect_connectors("open the android settings app", &cfg);
        assert!(hints.sequence_matches.is_empty());
    }
}
