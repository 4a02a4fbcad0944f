//! `RagClassifier` (C4): embed → retrieve → prompt → classify → score →
//! threshold → graded fallback (spec §4.3).
//!
//! Grounded on `crates/providers/src/classifier.rs` for the overall
//! retrieve-then-score shape and `crates/contextpack/src/builder.rs` for
//! prompt assembly; the ten-signal confidence mix lives in `confidence.rs`
//! and the fallback ladder in `fallback.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use sa_catalog::IntentCatalog;
use sa_contextpack::{ExampleHit, PromptBuilder, PromptStrategy, SessionHints};
use sa_domain::config::RagConfig;
use sa_domain::error::{Error, Result};
use sa_domain::interfaces::{ClassificationRequest, ClassificationResult, RankedCandidate};
use sa_domain::tool::Message;
use sa_domain::trace::TraceEvent;
use sa_domain::ModelRole;
use sa_embedding::EmbeddingStore;
use sa_providers::{ChatRequest, LlmRouter};

use crate::confidence::{self, ConfidenceSignals};
use crate::embedder::RoleEmbedder;
use crate::fallback;

/// Extra per-session context the caller supplies, since `sa-rag` has no
/// dependency on `sa-sessions` — the caller (orchestrator/CLI layer) reads
/// the session and hands over just what the classifier needs.
#[derive(Debug, Clone, Default)]
pub struct ClassifierContext {
    pub last_intent: Option<String>,
    pub cached_entities: Vec<(String, String)>,
    pub intent_frequency: HashMap<String, u32>,
}

/// Parsed shape of the LLM's classification response (spec §4.3 step 5).
#[derive(Debug, Clone, serde::Deserialize)]
struct LlmClassification {
    intent: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    entities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    rationale: Option<String>,
}

pub struct RagClassifier {
    store: Arc<EmbeddingStore>,
    catalog: Arc<IntentCatalog>,
    router: Arc<LlmRouter>,
    embedder: RoleEmbedder,
    prompt_builder: PromptBuilder,
    config: RagConfig,
    default_min_similarity: f32,
    temporal_budget_ms: u64,
}

impl RagClassifier {
    pub fn new(
        store: Arc<EmbeddingStore>,
        catalog: Arc<IntentCatalog>,
        router: Arc<LlmRouter>,
        config: RagConfig,
        default_min_similarity: f32,
        embedder_timeout_ms: u64,
        temporal_budget_ms: u64,
    ) -> Self {
        Self {
            store,
            catalog,
            router: router.clone(),
            embedder: RoleEmbedder::new(router, embedder_timeout_ms),
            prompt_builder: PromptBuilder::new(4_000, 16_000),
            config,
            default_min_similarity,
            temporal_budget_ms,
        }
    }

    pub async fn classify(
        &self,
        req: &ClassificationRequest,
        ctx: &ClassifierContext,
    ) -> Result<ClassificationResult> {
        let start = Instant::now();
        if req.text.trim().is_empty() {
            return Err(Error::Validation("classification request text is empty".into()));
        }

        let query_vec = self.embedder.embed(&req.text).await?;
        let max_examples = req.max_examples.unwrap_or(self.config.max_examples);
        let hits = self
            .store
            .search(&query_vec, &req.text, max_examples, self.default_min_similarity, None);

        let catalog_snapshot = self.catalog.all();
        let examples: Vec<ExampleHit> = hits
            .iter()
            .map(|h| ExampleHit {
                text: h.document.text.clone(),
                intent_id: h.document.intent_id.clone(),
                score: h.score,
                expert_domain: catalog_snapshot
                    .iter()
                    .find(|i| i.id == h.document.intent_id)
                    .and_then(|i| i.expert_domain.clone()),
            })
            .collect();

        let admissible_intents: Vec<String> = catalog_snapshot.iter().map(|i| i.id.clone()).collect();
        let hints = SessionHints {
            last_intent: ctx.last_intent.clone(),
            cached_entities: ctx.cached_entities.clone(),
        };

        let (prompt, report) = self.prompt_builder.build(
            &req.text,
            PromptStrategy::Adaptive,
            &examples,
            &hints,
            &admissible_intents,
        );

        let chat_req = ChatRequest {
            messages: vec![
                Message::system(
                    "You are an intent classifier. Respond with a single JSON object: \
                     {\"intent\": string, \"confidence\": number 0-1, \"entities\": object, \"rationale\": string}.",
                ),
                Message::user(prompt.clone()),
            ],
            json_mode: true,
            temperature: Some(0.1),
            ..ChatRequest::default()
        };

        let response = self.router.chat_for_role("rag", ModelRole::Planner, chat_req).await?;
        let parsed: LlmClassification = serde_json::from_str(response.content.trim())
            .map_err(|e| Error::Validation(format!("classifier LLM response was not valid JSON: {e}")))?;

        let scores: Vec<f32> = examples.iter().map(|e| e.score).collect();
        let mean_example_similarity = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };

        let intent_consistency = self
            .store
            .intent_centroid(&parsed.intent)
            .map(|centroid| sa_embedding::similarity::cosine_similarity(&query_vec, &centroid))
            .unwrap_or(0.0);

        let semantic_diversity = pairwise_diversity(&hits);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let total_frequency: u32 = ctx.intent_frequency.values().sum();
        let contextual_factor = if total_frequency == 0 {
            0.0
        } else {
            ctx.intent_frequency.get(&parsed.intent).copied().unwrap_or(0) as f32 / total_frequency as f32
        };
        let prompt_robustness = if report.sections.iter().any(|s| s.truncated_per_section || s.truncated_total_cap) {
            0.5
        } else {
            1.0
        };

        let signals = ConfidenceSignals {
            llm_self_confidence: parsed.confidence.clamp(0.0, 1.0),
            mean_example_similarity,
            intent_consistency,
            example_count_factor: (examples.len() as f32 / self.config.max_examples.max(1) as f32).min(1.0),
            semantic_diversity,
            temporal_factor: confidence::temporal_factor(elapsed_ms, self.temporal_budget_ms),
            embedding_quality: confidence::embedding_quality(&scores),
            similarity_entropy: confidence::similarity_entropy(&scores),
            contextual_factor,
            prompt_robustness,
        };
        let final_conf = confidence::final_confidence(&signals, &self.config.confidence_weights);

        let intent_def = self.catalog.lookup(&parsed.intent);
        let threshold = req
            .confidence_threshold
            .or_else(|| intent_def.as_ref().map(|i| i.confidence_threshold))
            .unwrap_or(0.6);

        let ranked_candidates = rank_candidates(&examples);
        let fallback_allowed = req.enable_fallback.unwrap_or(self.config.enable_fallback);

        if intent_def.is_some() && final_conf >= threshold {
            TraceEvent::RagClassified {
                intent_id: parsed.intent.clone(),
                confidence: final_conf,
                fallback_used: false,
                fallback_level: None,
            }
            .emit();
            return Ok(ClassificationResult {
                intent_id: parsed.intent,
                confidence: final_conf,
                ranked_candidates,
                rag_examples_used: examples.iter().map(|e| e.text.clone()).collect(),
                prompt_used: prompt,
                llm_response: response.content,
                processing_time_ms: elapsed_ms,
                fallback_used: false,
                fallback_reason: None,
                metrics: metrics_map(&signals),
                entities: parsed.entities,
                rationale: parsed.rationale,
            });
        }

        if !fallback_allowed {
            return Ok(ClassificationResult {
                intent_id: parsed.intent,
                confidence: final_conf,
                ranked_candidates,
                rag_examples_used: examples.iter().map(|e| e.text.clone()).collect(),
                prompt_used: prompt,
                llm_response: response.content,
                processing_time_ms: elapsed_ms,
                fallback_used: false,
                fallback_reason: Some("below confidence threshold, fallback disabled".to_string()),
                metrics: metrics_map(&signals),
                entities: parsed.entities,
                rationale: parsed.rationale,
            });
        }

        let outcome = fallback::resolve(
            &self.store,
            &query_vec,
            &req.text,
            self.default_min_similarity,
            &ctx.intent_frequency,
            &self.config.fallback,
        )
        .expect("fallback::resolve always terminates at level 5");
        fallback::emit_trace(&outcome);

        Ok(ClassificationResult {
            intent_id: outcome.intent_id,
            confidence: outcome.confidence,
            ranked_candidates,
            rag_examples_used: examples.iter().map(|e| e.text.clone()).collect(),
            prompt_used: prompt,
            llm_response: response.content,
            processing_time_ms: elapsed_ms,
            fallback_used: true,
            fallback_reason: Some(outcome.reason),
            metrics: metrics_map(&signals),
            entities: parsed.entities,
            rationale: parsed.rationale,
        })
    }
}

fn pairwise_diversity(hits: &[sa_embedding::ScoredDocument]) -> f32 {
    if hits.len() < 2 {
        return 0.5;
    }
    let mut total = 0.0;
    let mut count = 0;
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            total += sa_embedding::similarity::cosine_similarity(&hits[i].document.vector, &hits[j].document.vector);
            count += 1;
        }
    }
    if count == 0 {
        return 0.5;
    }
    (1.0 - (total / count as f32)).clamp(0.0, 1.0)
}

fn rank_candidates(examples: &[ExampleHit]) -> Vec<RankedCandidate> {
    let mut sums: HashMap<String, (f32, u32)> = HashMap::new();
    for e in examples {
        let entry = sums.entry(e.intent_id.clone()).or_insert((0.0, 0));
        entry.0 += e.score;
        entry.1 += 1;
    }
    let mut ranked: Vec<RankedCandidate> = sums
        .into_iter()
        .map(|(intent_id, (sum, count))| RankedCandidate {
            intent_id,
            score: sum / count as f32,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

fn metrics_map(signals: &ConfidenceSignals) -> HashMap<String, f32> {
    let mut m = HashMap::new();
    m.insert("llm_self_confidence".to_string(), signals.llm_self_confidence);
    m.insert("mean_example_similarity".to_string(), signals.mean_example_similarity);
    m.insert("intent_consistency".to_string(), signals.intent_consistency);
    m.insert("example_count_factor".to_string(), signals.example_count_factor);
    m.insert("semantic_diversity".to_string(), signals.semantic_diversity);
    m.insert("temporal_factor".to_string(), signals.temporal_factor);
    m.insert("embedding_quality".to_string(), signals.embedding_quality);
    m.insert("similarity_entropy".to_string(), signals.similarity_entropy);
    m.insert("contextual_factor".to_string(), signals.contextual_factor);
    m.insert("prompt_robustness".to_string(), signals.prompt_robustness);
    m
}
