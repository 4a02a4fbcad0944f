use std::collections::HashMap;

use parking_lot::RwLock;
use sa_domain::config::SimilarityMethod;
use sa_domain::model::EmbeddingDocument;
use sa_domain::trace::TraceEvent;
use uuid::Uuid;

use crate::similarity::{
    compute_centroid, cosine_similarity, euclidean_score, hybrid_score, keyword_overlap, manhattan_score,
};

/// In-memory vector index: many concurrent readers (`search`), rare bulk
/// writers (`add`/`remove`/hot reload), backed by a single `RwLock<Vec<_>>`
/// rather than a sharded structure — the corpus this index serves is small
/// enough that a full scan per query is cheap and the lock stays short.
pub struct EmbeddingStore {
    docs: RwLock<Vec<EmbeddingDocument>>,
    similarity: SimilarityMethod,
    hybrid_embedding_weight: f32,
    diversity_threshold: f32,
    max_cluster_size: usize,
    semantic_boost: f32,
}

/// A single scored hit, the document paired with its similarity score in
/// the method's native scale (cosine in `[-1,1]`, the rest in `(0,1]`).
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: EmbeddingDocument,
    pub score: f32,
}

impl EmbeddingStore {
    pub fn new(
        similarity: SimilarityMethod,
        hybrid_embedding_weight: f32,
        diversity_threshold: f32,
        max_cluster_size: usize,
        semantic_boost: f32,
    ) -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            similarity,
            hybrid_embedding_weight,
            diversity_threshold,
            max_cluster_size,
            semantic_boost,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    pub fn add(&self, doc: EmbeddingDocument) {
        let mut docs = self.docs.write();
        if let Some(existing) = docs.iter_mut().find(|d| d.id == doc.id) {
            *existing = doc;
        } else {
            docs.push(doc);
        }
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| d.id != id);
        docs.len() != before
    }

    /// Replaces the whole index in one lock acquisition — the hot-reload
    /// path, mirroring the catalog's atomic snapshot swap.
    pub fn replace_all(&self, docs: Vec<EmbeddingDocument>) {
        *self.docs.write() = docs;
    }

    fn score_one(&self, query_vec: &[f32], query_text: &str, doc: &EmbeddingDocument) -> f32 {
        match self.similarity {
            SimilarityMethod::Cosine => cosine_similarity(query_vec, &doc.vector),
            SimilarityMethod::Euclidean => euclidean_score(query_vec, &doc.vector),
            SimilarityMethod::Manhattan => manhattan_score(query_vec, &doc.vector),
            SimilarityMethod::Hybrid => hybrid_score(
                query_vec,
                &doc.vector,
                query_text,
                &doc.text,
                self.hybrid_embedding_weight,
            ),
        }
    }

    /// Nearest-neighbour search with result shaping: similarity cutoff,
    /// greedy diversity filtering, per-intent clustering cap, then a small
    /// additive boost applied after ranking (so it cannot reorder ties
    /// produced by the shaping steps above it) to results whose doc text
    /// shares at least one keyword with the query.
    pub fn search(
        &self,
        query_vec: &[f32],
        query_text: &str,
        k: usize,
        min_similarity: f32,
        intent_filter: Option<&str>,
    ) -> Vec<ScoredDocument> {
        let docs = self.docs.read();
        if docs.is_empty() {
            TraceEvent::EmbeddingSearch {
                intent_filter: intent_filter.map(|s| s.to_string()),
                k,
                results: 0,
                empty_index: true,
            }
            .emit();
            return Vec::new();
        }

        let mut candidates: Vec<(usize, f32)> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| intent_filter.map(|f| d.intent_id == f).unwrap_or(true))
            .map(|(i, d)| (i, self.score_one(query_vec, query_text, d)))
            .filter(|(_, score)| *score >= min_similarity)
            .collect();

        // Stable order: highest score first, ties broken by original
        // insertion order (index), which also makes id order deterministic
        // since docs are appended in id-assignment order.
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let diverse = self.apply_diversity_filter(&docs, candidates);
        let capped = self.apply_cluster_cap(&docs, diverse);

        let results: Vec<ScoredDocument> = capped
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let boost =
                    if keyword_overlap(query_text, &docs[i].text) > 0.0 { self.semantic_boost } else { 0.0 };
                ScoredDocument { document: docs[i].clone(), score: (score + boost).min(1.0) }
            })
            .collect();

        TraceEvent::EmbeddingSearch {
            intent_filter: intent_filter.map(|s| s.to_string()),
            k,
            results: results.len(),
            empty_index: false,
        }
        .emit();

        results
    }

    /// Greedily drops a candidate whose vector is nearly identical
    /// (cosine >= `diversity_threshold`) to one already accepted, so a
    /// cluster of near-duplicate examples doesn't crowd out distinct ones.
    fn apply_diversity_filter(
        &self,
        docs: &[EmbeddingDocument],
        candidates: Vec<(usize, f32)>,
    ) -> Vec<(usize, f32)> {
        let mut accepted: Vec<(usize, f32)> = Vec::new();
        for (idx, score) in candidates {
            let too_similar = accepted.iter().any(|(accepted_idx, _)| {
                cosine_similarity(&docs[idx].vector, &docs[*accepted_idx].vector) >= self.diversity_threshold
            });
            if !too_similar {
                accepted.push((idx, score));
            }
        }
        accepted
    }

    /// Caps how many results may share the same `intent_id`, so one
    /// intent's dense example set cannot monopolise the top-k.
    fn apply_cluster_cap(
        &self,
        docs: &[EmbeddingDocument],
        candidates: Vec<(usize, f32)>,
    ) -> Vec<(usize, f32)> {
        if self.max_cluster_size == 0 {
            return candidates;
        }
        let mut per_intent: HashMap<String, usize> = HashMap::new();
        let mut out = Vec::with_capacity(candidates.len());
        for (idx, score) in candidates {
            let count = per_intent.entry(docs[idx].intent_id.clone()).or_insert(0);
            if *count < self.max_cluster_size {
                *count += 1;
                out.push((idx, score));
            }
        }
        out
    }

    /// The centroid of all vectors currently tagged with `intent_id`,
    /// used by the RAG classifier's intent-consistency signal. `None` if
    /// the intent has no examples indexed.
    pub fn intent_centroid(&self, intent_id: &str) -> Option<Vec<f32>> {
        let docs = self.docs.read();
        let vectors: Vec<Vec<f32>> = docs
            .iter()
            .filter(|d| d.intent_id == intent_id)
            .map(|d| d.vector.clone())
            .collect();
        if vectors.is_empty() {
            None
        } else {
            Some(compute_centroid(&vectors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(intent: &str, vec: Vec<f32>, text: &str) -> EmbeddingDocument {
        EmbeddingDocument {
            id: Uuid::new_v4(),
            text: text.to_string(),
            vector: vec,
            intent_id: intent.to_string(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    fn store() -> EmbeddingStore {
        EmbeddingStore::new(SimilarityMethod::Cosine, 0.7, 0.92, 3, 0.0)
    }

    #[test]
    fn empty_store_reports_empty_index() {
        let store = store();
        let results = store.search(&[1.0, 0.0], "hi", 5, 0.0, None);
        assert!(results.is_empty());
    }

    #[test]
    fn search_ranks_by_similarity_descending() {
        let store = store();
        store.add(doc("weather", vec![1.0, 0.0], "close"));
        store.add(doc("weather", vec![0.0, 1.0], "far"));
        let results = store.search(&[1.0, 0.0], "close", 5, 0.0, None);
        assert_eq!(results[0].document.text, "close");
    }

    #[test]
    fn min_similarity_filters_weak_matches() {
        let store = store();
        store.add(doc("weather", vec![0.0, 1.0], "orthogonal"));
        let results = store.search(&[1.0, 0.0], "q", 5, 0.5, None);
        assert!(results.is_empty());
    }

    #[test]
    fn intent_filter_excludes_other_intents() {
        let store = store();
        store.add(doc("weather", vec![1.0, 0.0], "a"));
        store.add(doc("alarm", vec![1.0, 0.0], "b"));
        let results = store.search(&[1.0, 0.0], "q", 5, 0.0, Some("alarm"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.intent_id, "alarm");
    }

    #[test]
    fn diversity_filter_drops_near_duplicate_vectors() {
        let store = store();
        store.add(doc("weather", vec![1.0, 0.0], "a"));
        store.add(doc("weather", vec![0.999, 0.001], "near-duplicate"));
        let results = store.search(&[1.0, 0.0], "q", 5, 0.0, None);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn cluster_cap_limits_results_per_intent() {
        let store = EmbeddingStore::new(SimilarityMethod::Cosine, 0.7, 2.0, 1, 0.0);
        store.add(doc("weather", vec![1.0, 0.0], "a"));
        store.add(doc("weather", vec![0.9, 0.1], "b"));
        let results = store.search(&[1.0, 0.0], "q", 5, 0.0, None);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn semantic_boost_applies_only_on_keyword_overlap() {
        let store = EmbeddingStore::new(SimilarityMethod::Cosine, 0.7, 0.92, 3, 0.2);
        store.add(doc("weather", vec![1.0, 0.0], "sunny forecast"));
        store.add(doc("weather", vec![1.0, 0.0], "unrelated words"));
        let results = store.search(&[1.0, 0.0], "sunny forecast today", 5, 0.0, None);
        let boosted = results.iter().find(|r| r.document.text == "sunny forecast").unwrap();
        let unboosted = results.iter().find(|r| r.document.text == "unrelated words").unwrap();
        assert!(boosted.score > unboosted.score);
    }

    #[test]
    fn remove_drops_document() {
        let store = store();
        let d = doc("weather", vec![1.0, 0.0], "a");
        let id = d.id;
        store.add(d);
        assert!(store.remove(id));
        assert!(store.is_empty());
    }

    #[test]
    fn intent_centroid_averages_vectors() {
        let store = store();
        store.add(doc("weather", vec![0.0, 0.0], "a"));
        store.add(doc("weather", vec![2.0, 4.0], "b"));
        let centroid = store.intent_centroid("weather").unwrap();
        assert_eq!(centroid, vec![1.0, 2.0]);
    }

    #[test]
    fn intent_centroid_none_for_unknown_intent() {
        let store = store();
        assert!(store.intent_centroid("ghost").is_none());
    }
}
