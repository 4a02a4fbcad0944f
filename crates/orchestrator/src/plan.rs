//! Topological planning: partitions a subtask list into `ExecutionPlan`
//! levels (spec §4.9). Level `k` depends only on levels `< k`; a level is a
//! parallel batch.
//!
//! Kahn's algorithm over the same `Uuid`-indexed adjacency representation
//! `sa-decompose::graph` validates against — a cycle here is a validation
//! bug upstream (the decomposer should already have rejected it), so this
//! is defense in depth, not the primary cycle check.

use std::collections::{HashMap, HashSet};

use sa_domain::error::{Error, Result};
use sa_domain::model::{ExecutionPlan, Subtask};
use uuid::Uuid;

/// Builds the level partition and a critical-path length hint (the number
/// of levels on the longest dependency chain), used only to bound
/// parallelism — never to reorder levels, which are always strictly
/// sequential.
pub fn build(subtasks: Vec<Subtask>) -> Result<(ExecutionPlan, usize)> {
    if subtasks.is_empty() {
        return Ok((ExecutionPlan::default(), 0));
    }

    let by_id: HashMap<Uuid, Subtask> = subtasks.into_iter().map(|s| (s.id, s)).collect();
    let mut remaining_deps: HashMap<Uuid, HashSet<Uuid>> = by_id
        .iter()
        .map(|(id, s)| (*id, s.dependencies.iter().copied().collect()))
        .collect();

    let mut levels: Vec<Vec<Subtask>> = Vec::new();
    let mut placed: HashSet<Uuid> = HashSet::new();

    while placed.len() < by_id.len() {
        let ready: Vec<Uuid> = remaining_deps
            .iter()
            .filter(|(id, deps)| !placed.contains(*id) && deps.is_empty())
            .map(|(id, _)| *id)
            .collect();

        if ready.is_empty() {
            return Err(Error::Dependency(
                "cycle or dangling dependency detected while building execution plan".into(),
            ));
        }

        let mut level: Vec<Subtask> = ready
            .iter()
            .map(|id| by_id.get(id).cloned().expect("id came from remaining_deps keys"))
            .collect();
        level.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        for id in &ready {
            placed.insert(*id);
            remaining_deps.remove(id);
        }
        for deps in remaining_deps.values_mut() {
            for id in &ready {
                deps.remove(id);
            }
        }

        levels.push(level);
    }

    let critical_path = levels.len();
    Ok((ExecutionPlan { levels }, critical_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[test]
    fn independent_subtasks_share_one_level() {
        let a = Subtask::new("a.x", Map::new());
        let b = Subtask::new("b.x", Map::new());
        let (plan, critical_path) = build(vec![a, b]).unwrap();
        assert_eq!(plan.levels.len(), 1);
        assert_eq!(plan.levels[0].len(), 2);
        assert_eq!(critical_path, 1);
    }

    #[test]
    fn dependent_subtask_lands_in_next_level() {
        let a = Subtask::new("a.x", Map::new());
        let mut b = Subtask::new("b.x", Map::new());
        b.dependencies.push(a.id);
        let (plan, critical_path) = build(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[0][0].id, a.id);
        assert_eq!(plan.levels[1][0].id, b.id);
        assert_eq!(critical_path, 2);
    }

    #[test]
    fn every_dependency_of_level_k_is_in_an_earlier_level() {
        let a = Subtask::new("a.x", Map::new());
        let mut b = Subtask::new("b.x", Map::new());
        b.dependencies.push(a.id);
        let mut c = Subtask::new("c.x", Map::new());
        c.dependencies.push(b.id);
        let (plan, _) = build(vec![c, a, b]).unwrap();
        let level_of = |id: Uuid| plan.levels.iter().position(|l| l.iter().any(|s| s.id == id)).unwrap();
        for (k, level) in plan.levels.iter().enumerate() {
            for s in level {
                for dep in &s.dependencies {
                    assert!(level_of(*dep) < k);
                }
            }
        }
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let mut a = Subtask::new("a.x", Map::new());
        a.dependencies.push(Uuid::new_v4());
        assert!(build(vec![a]).is_err());
    }

    #[test]
    fn empty_input_yields_empty_plan() {
        let (plan, critical_path) = build(vec![]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(critical_path, 0);
    }
}
