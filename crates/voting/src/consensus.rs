//! Pluggable consensus algorithms (spec §4.4), dispatched by
//! [`ConsensusAlgorithm`] tag. Each takes the same `&[Vote]` input and
//! produces a `Consensus` — callers never branch on the algorithm
//! themselves, matching the teacher's tagged-enum dispatch convention
//! (`ToolTransport`, `SimilarityMethod`) used throughout the domain model.

use std::collections::HashMap;

use sa_domain::config::ConsensusAlgorithm;
use sa_domain::model::{Agreement, Consensus, Subtask, Vote};

/// A vote counts as "approving" its intent under the approval algorithm
/// once its self-reported confidence clears this bar.
const APPROVAL_THRESHOLD: f32 = 0.5;

pub fn compute(votes: &[Vote], algorithm: ConsensusAlgorithm) -> Consensus {
    if votes.is_empty() {
        return Consensus {
            intent: String::new(),
            confidence: 0.0,
            agreement: Agreement::Failed,
            method: algorithm_name(algorithm).to_string(),
            merged_entities: HashMap::new(),
            merged_subtasks: Vec::new(),
            rationale: Some("no valid votes".to_string()),
        };
    }

    let tally = match algorithm {
        ConsensusAlgorithm::WeightedMajority => tally_weighted_majority(votes),
        ConsensusAlgorithm::Plurality => tally_plurality(votes),
        ConsensusAlgorithm::ConfidenceWeighted => tally_confidence_weighted(votes),
        ConsensusAlgorithm::BordaCount => tally_borda_count(votes),
        ConsensusAlgorithm::Condorcet => tally_weighted_majority(votes),
        ConsensusAlgorithm::Approval => tally_approval(votes),
    };

    // `tally` preserves first-occurrence order of intents across `votes`, so
    // a strict `>` comparison here keeps the earliest-seen intent on an exact
    // score tie — the "first by total weight, then by insertion order"
    // tie-break spec demands, rather than whatever order a hash map iterates.
    let (winner, winner_score) = tally
        .iter()
        .fold(None, |best: Option<(&String, f32)>, (intent, score)| match best {
            Some((_, best_score)) if *score <= best_score => best,
            _ => Some((intent, *score)),
        })
        .map(|(intent, score)| (intent.clone(), score))
        .unwrap_or_default();

    let tally_map: HashMap<String, f32> = tally.iter().cloned().collect();
    let agreement = classify_agreement(votes, &tally_map, &winner);
    let winning_votes: Vec<&Vote> = votes.iter().filter(|v| v.intent == winner).collect();
    let confidence = if winning_votes.is_empty() {
        0.0
    } else {
        winning_votes.iter().map(|v| v.confidence).sum::<f32>() / winning_votes.len() as f32
    };

    Consensus {
        intent: winner,
        confidence,
        agreement,
        method: algorithm_name(algorithm).to_string(),
        merged_entities: merge_entities(&winning_votes),
        merged_subtasks: merge_subtasks(&winning_votes),
        rationale: Some(format!("{:?} tally score {:.3}", algorithm, winner_score)),
    }
}

/// An ordered tally: intents appear in first-occurrence order across the
/// vote list, so downstream winner-selection can tie-break on insertion
/// order deterministically instead of relying on hash map iteration order.
type OrderedTally = Vec<(String, f32)>;

fn add_score(tally: &mut OrderedTally, intent: &str, score: f32) {
    match tally.iter_mut().find(|(i, _)| i == intent) {
        Some((_, s)) => *s += score,
        None => tally.push((intent.to_string(), score)),
    }
}

fn tally_weighted_majority(votes: &[Vote]) -> OrderedTally {
    let mut tally = OrderedTally::new();
    for v in votes {
        add_score(&mut tally, &v.intent, v.weight);
    }
    tally
}

fn tally_plurality(votes: &[Vote]) -> OrderedTally {
    let mut tally = OrderedTally::new();
    for v in votes {
        add_score(&mut tally, &v.intent, 1.0);
    }
    tally
}

fn tally_confidence_weighted(votes: &[Vote]) -> OrderedTally {
    let mut tally = OrderedTally::new();
    for v in votes {
        add_score(&mut tally, &v.intent, v.weight * v.confidence);
    }
    tally
}

/// Each ballot carries a single top choice rather than a ranked list, so
/// Borda points are assigned by the ballot's position when all votes are
/// sorted by confidence descending: the most confident ballot contributes
/// `n - 1` points to its intent, the least confident contributes `0`.
fn tally_borda_count(votes: &[Vote]) -> OrderedTally {
    let mut ranked: Vec<&Vote> = votes.iter().collect();
    ranked.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    let n = ranked.len();
    let mut tally = OrderedTally::new();
    for (rank, v) in ranked.into_iter().enumerate() {
        let points = (n - 1 - rank) as f32;
        add_score(&mut tally, &v.intent, points * v.weight);
    }
    tally
}

/// Counts only votes whose confidence clears [`APPROVAL_THRESHOLD`].
fn tally_approval(votes: &[Vote]) -> OrderedTally {
    let mut tally = OrderedTally::new();
    for v in votes {
        if v.confidence >= APPROVAL_THRESHOLD {
            add_score(&mut tally, &v.intent, v.weight);
        }
    }
    if tally.is_empty() {
        tally_weighted_majority(votes)
    } else {
        tally
    }
}

fn classify_agreement(votes: &[Vote], tally: &HashMap<String, f32>, winner: &str) -> Agreement {
    let distinct_intents: std::collections::HashSet<&str> = votes.iter().map(|v| v.intent.as_str()).collect();
    if distinct_intents.len() == 1 {
        return Agreement::Unanimous;
    }
    let winner_score = tally.get(winner).copied().unwrap_or(0.0);
    let total: f32 = tally.values().sum();
    if total <= f32::EPSILON {
        return Agreement::Failed;
    }

    let tied_for_first = tally.values().filter(|s| (**s - winner_score).abs() < 1e-6).count();
    if tied_for_first > 1 {
        return Agreement::Split;
    }
    if winner_score / total > 0.5 {
        Agreement::Majority
    } else {
        Agreement::Plurality
    }
}

/// Later (lower-priority) votes fill gaps left by earlier ones; within the
/// winning set, votes are processed in descending weight order so the most
/// trusted juror's entities win a key collision.
fn merge_entities(winning_votes: &[&Vote]) -> HashMap<String, serde_json::Value> {
    let mut sorted = winning_votes.to_vec();
    sorted.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    let mut merged = HashMap::new();
    for v in sorted {
        for (k, val) in &v.entities {
            merged.entry(k.clone()).or_insert_with(|| val.clone());
        }
    }
    merged
}

/// Deduplicates proposed subtasks across the winning votes by
/// `Subtask::merge_key`, keeping the first occurrence.
fn merge_subtasks(winning_votes: &[&Vote]) -> Vec<Subtask> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for v in winning_votes {
        for st in &v.subtasks {
            if seen.insert(st.merge_key()) {
                merged.push(st.clone());
            }
        }
    }
    merged
}

fn algorithm_name(algorithm: ConsensusAlgorithm) -> &'static str {
    match algorithm {
        ConsensusAlgorithm::WeightedMajority => "weighted-majority",
        ConsensusAlgorithm::Plurality => "plurality",
        ConsensusAlgorithm::ConfidenceWeighted => "confidence-weighted",
        ConsensusAlgorithm::BordaCount => "borda-count",
        ConsensusAlgorithm::Condorcet => "condorcet",
        ConsensusAlgorithm::Approval => "approval",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vote(intent: &str, confidence: f32, weight: f32) -> Vote {
        Vote {
            juror_id: format!("juror-{intent}"),
            intent: intent.to_string(),
            confidence,
            entities: HashMap::new(),
            subtasks: Vec::new(),
            raw_text: String::new(),
            weight,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_votes_is_failed_agreement() {
        let consensus = compute(&[], ConsensusAlgorithm::WeightedMajority);
        assert_eq!(consensus.agreement, Agreement::Failed);
    }

    #[test]
    fn unanimous_when_all_votes_agree() {
        let votes = vec![vote("weather.get", 0.9, 1.0), vote("weather.get", 0.8, 1.0)];
        let consensus = compute(&votes, ConsensusAlgorithm::WeightedMajority);
        assert_eq!(consensus.agreement, Agreement::Unanimous);
        assert_eq!(consensus.intent, "weather.get");
    }

    #[test]
    fn weighted_majority_favours_heavier_weight() {
        let votes = vec![vote("a.a", 0.6, 3.0), vote("b.b", 0.9, 1.0)];
        let consensus = compute(&votes, ConsensusAlgorithm::WeightedMajority);
        assert_eq!(consensus.intent, "a.a");
        assert_eq!(consensus.agreement, Agreement::Majority);
    }

    #[test]
    fn confidence_weighted_favours_higher_confidence() {
        let votes = vec![vote("a.a", 0.2, 1.0), vote("b.b", 0.95, 1.0)];
        let consensus = compute(&votes, ConsensusAlgorithm::ConfidenceWeighted);
        assert_eq!(consensus.intent, "b.b");
    }

    #[test]
    fn split_agreement_on_exact_tie() {
        let votes = vec![vote("a.a", 0.9, 1.0), vote("b.b", 0.9, 1.0)];
        let consensus = compute(&votes, ConsensusAlgorithm::Plurality);
        assert_eq!(consensus.agreement, Agreement::Split);
    }

    #[test]
    fn approval_ignores_low_confidence_votes() {
        let votes = vec![vote("a.a", 0.3, 1.0), vote("b.b", 0.8, 1.0)];
        let consensus = compute(&votes, ConsensusAlgorithm::Approval);
        assert_eq!(consensus.intent, "b.b");
    }

    /// Spec §8: "ties break deterministically (first by total weight, then
    /// by insertion order)". With equal weighted-majority scores, the
    /// earliest-seen intent in the vote list must win, regardless of vote
    /// ordering tricks that would flip a hash-map iteration order.
    #[test]
    fn weighted_majority_tie_breaks_by_insertion_order() {
        let votes = vec![vote("b.b", 0.9, 1.0), vote("a.a", 0.9, 1.0)];
        let consensus = compute(&votes, ConsensusAlgorithm::WeightedMajority);
        assert_eq!(consensus.intent, "b.b");
        assert_eq!(consensus.agreement, Agreement::Split);

        let votes_reordered = vec![vote("a.a", 0.9, 1.0), vote("b.b", 0.9, 1.0)];
        let consensus2 = compute(&votes_reordered, ConsensusAlgorithm::WeightedMajority);
        assert_eq!(consensus2.intent, "a.a");
    }
}
