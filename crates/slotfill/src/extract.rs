//! Per-slot value extraction: regex patterns first, then an LLM call, then
//! the session entity cache — the cheapest and most deterministic source
//! wins, the entity cache is consulted last since a stale cached value is
//! worse than asking the user once.

use regex::Regex;
use sa_domain::model::{SlotDefinition, SlotType};
use unicode_normalization::UnicodeNormalization;

/// Lowercases and strips combining diacritical marks (NFD decompose, drop
/// combining marks) so `"café"` and `"cafe"` normalise to the same key.
fn fold(s: &str) -> String {
    s.nfd().filter(|c| !unicode_normalization::char::is_combining_mark(*c)).collect::<String>().to_lowercase()
}

/// Tries each of `slot.extraction_patterns` against `utterance` in order,
/// returning the first capture (group 1 if present, else the whole match)
/// coerced to the slot's declared type.
pub fn extract_via_regex(slot: &SlotDefinition, utterance: &str) -> Option<serde_json::Value> {
    for pattern in &slot.extraction_patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(slot = %slot.name, pattern = %pattern, error = %e, "invalid slot extraction pattern, skipping");
                continue;
            }
        };
        if let Some(caps) = re.captures(utterance) {
            let raw = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
            if let Some(raw) = raw {
                if let Some(value) = coerce(slot, raw) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Coerces a raw matched string into the slot's declared type, rejecting
/// the match rather than guessing if coercion fails (a failed `Number`
/// parse, or an `Enum` value outside the declared set).
pub fn coerce(slot: &SlotDefinition, raw: &str) -> Option<serde_json::Value> {
    let raw = raw.trim();
    match slot.slot_type {
        SlotType::Text | SlotType::Date | SlotType::Location => {
            Some(serde_json::Value::String(raw.to_string()))
        }
        SlotType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number),
        SlotType::Enum => {
            let folded_raw = fold(raw);
            slot.enumeration
                .iter()
                .find(|v| fold(v) == folded_raw)
                .cloned()
                .map(serde_json::Value::String)
        }
        SlotType::Boolean => match raw.to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(serde_json::Value::Bool(true)),
            "false" | "no" | "n" | "0" => Some(serde_json::Value::Bool(false)),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(slot_type: SlotType, patterns: Vec<&str>) -> SlotDefinition {
        SlotDefinition {
            name: "city".to_string(),
            slot_type,
            extraction_patterns: patterns.into_iter().map(String::from).collect(),
            enumeration: vec!["celsius".to_string(), "fahrenheit".to_string()],
            priority: 0,
        }
    }

    #[test]
    fn regex_extracts_capture_group() {
        let s = slot(SlotType::Text, vec![r"in (\w+)"]);
        assert_eq!(
            extract_via_regex(&s, "what's the weather in boston"),
            Some(serde_json::Value::String("boston".to_string()))
        );
    }

    #[test]
    fn number_coercion_rejects_non_numeric() {
        let s = slot(SlotType::Number, vec![r"(\w+)"]);
        assert_eq!(extract_via_regex(&s, "abc"), None);
    }

    #[test]
    fn enum_coercion_rejects_values_outside_set() {
        let s = slot(SlotType::Enum, vec![r"(\w+)"]);
        assert_eq!(extract_via_regex(&s, "kelvin"), None);
        assert!(extract_via_regex(&s, "Celsius").is_some());
    }

    #[test]
    fn enum_coercion_returns_canonical_variant_case_insensitively() {
        let s = slot(SlotType::Enum, vec![r"(\w+)"]);
        assert_eq!(extract_via_regex(&s, "CELSIUS"), Some(serde_json::Value::String("celsius".to_string())));
    }

    #[test]
    fn enum_coercion_folds_diacritics() {
        let mut s = slot(SlotType::Enum, vec![r"(\w+)"]);
        s.enumeration = vec!["café".to_string()];
        assert_eq!(
            coerce(&s, "cafe"),
            Some(serde_json::Value::String("café".to_string()))
        );
    }

    #[test]
    fn boolean_coercion_accepts_common_phrasings() {
        let s = slot(SlotType::Boolean, vec![r"(\w+)"]);
        assert_eq!(extract_via_regex(&s, "yes"), Some(serde_json::Value::Bool(true)));
        assert_eq!(extract_via_regex(&s, "no"), Some(serde_json::Value::Bool(false)));
    }

    #[test]
    fn no_pattern_matches_returns_none() {
        let s = slot(SlotType::Text, vec![r"in (\w+)"]);
        assert_eq!(extract_via_regex(&s, "hello there"), None);
    }
}
