//! `VotingEngine` (C5): concurrent multi-juror fan-out, pluggable consensus,
//! multi-round debate, single-juror fallback.
//!
//! Grounded on `crates/providers/src/router.rs`'s fan-out-with-timeout shape
//! and `examples/other_examples/9d79b3dc_Exiv-ai-Exiv__crates-core-src-consensus.rs.rs`'s
//! collect-then-synthesize session pattern, generalized from a single
//! synthesizer call into a full consensus algorithm plus debate rounds.
//!
//! Open design note (RAG-seeds-voting, per the roster/config ledger): the
//! RAG classifier's best guess is accepted as a non-binding seed vote with
//! a configurable weight (defaulting to the lowest-weighted juror's
//! weight, so it can never outrank a genuine juror but still nudges a
//! close consensus). Debate rounds can override it exactly like any other
//! vote.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use sa_domain::config::{ConsensusAlgorithm, JurorConfig, VotingConfig};
use sa_domain::error::{Error, Result};
use sa_domain::model::{Consensus, Vote};
use sa_domain::tool::Message;
use sa_domain::trace::TraceEvent;
use sa_providers::{ChatRequest, LlmRouter};

use crate::consensus;
use crate::roster::JuryRoster;

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct JurorResponse {
    intent: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    entities: std::collections::HashMap<String, serde_json::Value>,
    #[serde(default)]
    rationale: Option<String>,
}

pub struct VotingEngine {
    router: Arc<LlmRouter>,
    roster: Arc<JuryRoster>,
    config: VotingConfig,
}

impl VotingEngine {
    pub fn new(router: Arc<LlmRouter>, roster: Arc<JuryRoster>, config: VotingConfig) -> Self {
        Self { router, roster, config }
    }

    /// Runs the jury over `utterance`, optionally seeded by the RAG
    /// classifier's best guess, and returns the final consensus once debate
    /// converges or `max_rounds` is exhausted.
    pub async fn run(&self, utterance: &str, rag_seed: Option<Vote>) -> Result<Consensus> {
        let jurors = self.roster.all();
        let seed_weight = rag_seed
            .as_ref()
            .map(|_| jurors.iter().map(|j| j.weight).fold(f32::INFINITY, f32::min));

        let mut prior_confidence = 0.0f32;
        let mut prior_summary: Option<String> = None;
        let mut last_consensus: Option<Consensus> = None;
        let mut last_valid_votes = 0usize;

        for round in 0..self.config.max_rounds.max(1) {
            let mut votes = self.dispatch_round(&jurors, utterance, round, prior_summary.as_deref()).await;

            if round == 0 {
                if let (Some(seed), Some(weight)) = (rag_seed.clone(), seed_weight) {
                    votes.push(Vote { weight, ..seed });
                }
            }

            let valid_votes = votes.len();
            if valid_votes < self.config.min_votes {
                return self.single_juror_fallback(utterance, valid_votes).await;
            }
            last_valid_votes = valid_votes;

            let consensus = consensus::compute(&votes, self.config.algorithm);
            TraceEvent::VotingRoundCompleted {
                round: round + 1,
                valid_votes,
                agreement: format!("{:?}", consensus.agreement),
            }
            .emit();

            let improvement = consensus.confidence - prior_confidence;
            let is_last_round = round + 1 >= self.config.max_rounds;
            let unanimous = consensus.agreement == sa_domain::model::Agreement::Unanimous;
            let converged = unanimous || (round > 0 && improvement < self.config.improvement_threshold);

            prior_confidence = consensus.confidence;
            prior_summary = Some(format!(
                "Round {} consensus leaned towards '{}' (confidence {:.2}, agreement {:?}).",
                round + 1,
                consensus.intent,
                consensus.confidence,
                consensus.agreement
            ));
            let done = is_last_round || converged;
            last_consensus = Some(consensus);
            if done {
                break;
            }
        }

        let consensus = last_consensus.expect("at least one round always runs");

        // Fallback (spec §4.4): failed agreement, sub-threshold confidence,
        // or an "unknown" winner all route to the single-juror path, same as
        // the too-few-valid-votes check above.
        if consensus.agreement == sa_domain::model::Agreement::Failed
            || consensus.confidence < self.config.consensus_threshold
            || consensus.intent == "unknown"
        {
            return self.single_juror_fallback(utterance, last_valid_votes).await;
        }

        TraceEvent::ConsensusReached {
            intent: consensus.intent.clone(),
            confidence: consensus.confidence,
            method: consensus.method.clone(),
            agreement: format!("{:?}", consensus.agreement),
        }
        .emit();
        Ok(consensus)
    }

    async fn dispatch_round(
        &self,
        jurors: &[JurorConfig],
        utterance: &str,
        round: u32,
        prior_summary: Option<&str>,
    ) -> Vec<Vote> {
        let futures = jurors.iter().map(|juror| self.poll_juror(juror, utterance, round, prior_summary));
        join_all(futures).await.into_iter().flatten().collect()
    }

    async fn poll_juror(
        &self,
        juror: &JurorConfig,
        utterance: &str,
        round: u32,
        prior_summary: Option<&str>,
    ) -> Option<Vote> {
        let start = Instant::now();
        let provider = match self.router.registry().get(&juror.provider) {
            Some(p) => p,
            None => {
                TraceEvent::JurorVoted {
                    juror_id: juror.id.clone(),
                    intent: None,
                    confidence: None,
                    skipped: true,
                    duration_ms: 0,
                }
                .emit();
                return None;
            }
        };

        let system_prompt = juror.prompt_template.clone().unwrap_or_else(|| {
            "You are one juror in a panel classifying user intent. Respond with a single JSON \
             object: {\"intent\": string, \"confidence\": number 0-1, \"entities\": object, \
             \"rationale\": string}."
                .to_string()
        });
        let mut messages = vec![Message::system(system_prompt)];
        if let Some(summary) = prior_summary {
            messages.push(Message::system(format!(
                "Debate context from the previous round: {summary} Reconsider your answer in light of this."
            )));
        }
        messages.push(Message::user(utterance.to_string()));

        let req = ChatRequest {
            messages,
            temperature: Some(juror.temperature),
            max_tokens: Some(juror.max_tokens),
            model: Some(juror.model.clone()),
            json_mode: true,
            ..ChatRequest::default()
        };

        let timeout = Duration::from_millis(self.config.round_timeout_ms);
        let result = tokio::time::timeout(timeout, provider.chat(&req)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(resp)) => match serde_json::from_str::<JurorResponse>(resp.content.trim()) {
                Ok(parsed) => {
                    TraceEvent::JurorVoted {
                        juror_id: juror.id.clone(),
                        intent: Some(parsed.intent.clone()),
                        confidence: Some(parsed.confidence),
                        skipped: false,
                        duration_ms,
                    }
                    .emit();
                    Some(Vote {
                        juror_id: juror.id.clone(),
                        intent: parsed.intent,
                        confidence: parsed.confidence.clamp(0.0, 1.0),
                        entities: parsed.entities,
                        subtasks: Vec::new(),
                        raw_text: resp.content,
                        weight: juror.weight,
                        timestamp: Utc::now(),
                    })
                }
                Err(_) => {
                    TraceEvent::JurorVoted {
                        juror_id: juror.id.clone(),
                        intent: None,
                        confidence: None,
                        skipped: true,
                        duration_ms,
                    }
                    .emit();
                    None
                }
            },
            _ => {
                TraceEvent::JurorVoted {
                    juror_id: juror.id.clone(),
                    intent: None,
                    confidence: None,
                    skipped: true,
                    duration_ms,
                }
                .emit();
                None
            }
        }
    }

    /// `method = single_llm_mode`: falls back to the configured primary
    /// juror alone. Triggered when too few valid respondents remain to run
    /// consensus, or (spec §4.4 *Fallback*) the jury did reach a consensus
    /// but it was `Agreement::Failed`, below `consensus_threshold`, or
    /// resolved to the `"unknown"` intent.
    async fn single_juror_fallback(&self, utterance: &str, valid_votes: usize) -> Result<Consensus> {
        let primary_id = self.config.primary_juror_id.as_ref().ok_or_else(|| {
            Error::ConsensusFailure(format!(
                "jury consensus fell back to single_llm_mode ({valid_votes} valid vote(s)), \
                 but no primary_juror_id configured"
            ))
        })?;
        let jurors = self.roster.all();
        let primary = jurors
            .iter()
            .find(|j| &j.id == primary_id)
            .ok_or_else(|| Error::Configuration(format!("primary_juror_id '{primary_id}' not in roster")))?;

        let vote = self
            .poll_juror(primary, utterance, 0, None)
            .await
            .ok_or_else(|| Error::ConsensusFailure(format!("primary juror '{primary_id}' also failed to vote")))?;

        let consensus = Consensus {
            intent: vote.intent,
            confidence: vote.confidence,
            agreement: sa_domain::model::Agreement::Unanimous,
            method: "single_llm_mode".to_string(),
            merged_entities: vote.entities,
            merged_subtasks: Vec::new(),
            rationale: Some(format!(
                "consensus fell back to single juror '{primary_id}' ({valid_votes} valid vote(s) in the last round)"
            )),
        };
        TraceEvent::ConsensusReached {
            intent: consensus.intent.clone(),
            confidence: consensus.confidence,
            method: consensus.method.clone(),
            agreement: format!("{:?}", consensus.agreement),
        }
        .emit();
        Ok(consensus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_from_name_still_defaults_unknown_to_weighted_majority() {
        assert_eq!(ConsensusAlgorithm::from_name("nope"), ConsensusAlgorithm::WeightedMajority);
    }
}
