//! DAG validation for a decomposed subtask list (spec §4.8 invariants i–iii).
//!
//! Subtasks are a value object — dependencies are stored as an adjacency
//! list indexed by subtask id (per design note §9: "prefer an adjacency
//! representation... rather than pointer graphs"), not as owned references
//! between `Subtask`s.

use std::collections::{HashMap, HashSet};

use sa_domain::error::{Error, Result};
use sa_domain::model::{Subtask, ToolAction};
use uuid::Uuid;

/// Validates and repairs a raw subtask list against the three invariants:
///
/// 1. every `action` resolves in the tool registry — unresolvable subtasks
///    are dropped (logged), never silently kept;
/// 2. every dependency id must name another subtask in the same list —
///    dangling dependency references are dropped, the subtask itself is
///    kept;
/// 3. the resulting graph must be acyclic — a cycle is not repairable by
///    dropping a single edge without guessing intent, so it surfaces as
///    `Error::Dependency` and the caller gets no partial plan.
pub fn validate(mut subtasks: Vec<Subtask>, resolve: impl Fn(&str) -> Option<ToolAction>) -> Result<Vec<Subtask>> {
    let before = subtasks.len();
    subtasks.retain(|s| {
        let ok = resolve(&s.action).is_some();
        if !ok {
            tracing::warn!(action = %s.action, subtask_id = %s.id, "dropping subtask with unresolvable action");
        }
        ok
    });
    if subtasks.len() != before {
        tracing::info!(dropped = before - subtasks.len(), "dropped subtasks with unknown tool actions");
    }

    let known_ids: HashSet<Uuid> = subtasks.iter().map(|s| s.id).collect();
    for s in subtasks.iter_mut() {
        let before_deps = s.dependencies.len();
        s.dependencies.retain(|d| known_ids.contains(d));
        if s.dependencies.len() != before_deps {
            tracing::warn!(subtask_id = %s.id, "dropped dangling dependency reference(s)");
        }
    }

    detect_cycle(&subtasks)?;
    Ok(subtasks)
}

/// DFS-based cycle detection over the id-indexed adjacency list.
fn detect_cycle(subtasks: &[Subtask]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let adjacency: HashMap<Uuid, &[Uuid]> = subtasks.iter().map(|s| (s.id, s.dependencies.as_slice())).collect();
    let mut marks: HashMap<Uuid, Mark> = subtasks.iter().map(|s| (s.id, Mark::Unvisited)).collect();

    fn visit(
        node: Uuid,
        adjacency: &HashMap<Uuid, &[Uuid]>,
        marks: &mut HashMap<Uuid, Mark>,
    ) -> Result<()> {
        match marks.get(&node) {
            Some(Mark::InProgress) => {
                return Err(Error::Dependency(format!("cycle detected involving subtask {node}")));
            }
            Some(Mark::Done) => return Ok(()),
            _ => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(deps) = adjacency.get(&node) {
            for &dep in *deps {
                visit(dep, adjacency, marks)?;
            }
        }
        marks.insert(node, Mark::Done);
        Ok(())
    }

    for &id in adjacency.keys() {
        visit(id, &adjacency, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::{RetryPolicy, ToolTransport};
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn tool(name: &str) -> ToolAction {
        ToolAction {
            name: name.to_string(),
            transport: ToolTransport::Http,
            endpoint: Some("https://example.test".into()),
            method: Some("POST".into()),
            input_schema: json!({}),
            output_schema: json!({}),
            timeout_ms: 1000,
            retry: RetryPolicy::default(),
            auth: None,
            compensate: None,
            idempotent: true,
        }
    }

    #[test]
    fn drops_subtask_with_unknown_action() {
        let known = vec![tool("weather.query")];
        let s1 = Subtask::new("weather.query", Map::new());
        let s2 = Subtask::new("unknown.action", Map::new());
        let result = validate(vec![s1.clone(), s2], |name| known.iter().find(|t| t.name == name).cloned()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, s1.id);
    }

    #[test]
    fn drops_dangling_dependency_but_keeps_subtask() {
        let known = vec![tool("weather.query")];
        let mut s1 = Subtask::new("weather.query", Map::new());
        s1.dependencies.push(Uuid::new_v4());
        let result = validate(vec![s1], |name| known.iter().find(|t| t.name == name).cloned()).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].dependencies.is_empty());
    }

    #[test]
    fn cycle_is_rejected() {
        let known = vec![tool("a.x"), tool("b.x")];
        let mut s1 = Subtask::new("a.x", Map::new());
        let mut s2 = Subtask::new("b.x", Map::new());
        s1.dependencies.push(s2.id);
        s2.dependencies.push(s1.id);
        let err = validate(vec![s1, s2], |name| known.iter().find(|t| t.name == name).cloned()).unwrap_err();
        assert!(matches!(err, Error::Dependency(_)));
    }

    #[test]
    fn acyclic_chain_passes() {
        let known = vec![tool("a.x"), tool("b.x")];
        let s1 = Subtask::new("a.x", Map::new());
        let mut s2 = Subtask::new("b.x", Map::new());
        s2.dependencies.push(s1.id);
        let result = validate(vec![s1, s2], |name| known.iter().find(|t| t.name == name).cloned()).unwrap();
        assert_eq!(result.len(), 2);
    }
}
