//! Role-resolved embedding lookup for the RAG classifier.
//!
//! Grounded on `crates/providers/src/router.rs`'s `chat_for_role`: the same
//! role-resolution idea (`ProviderRegistry::for_role`), generalised to the
//! one call the router itself doesn't expose — `embeddings` has no
//! fallback-on-failure requirement here, so a thin wrapper suffices rather
//! than widening `LlmRouter`'s public surface for a single caller.

use std::sync::Arc;
use std::time::Duration;

use sa_domain::error::{Error, Result};
use sa_providers::{EmbeddingsRequest, LlmRouter};

/// Resolves the `"embedder"` role via the shared router and embeds a single
/// piece of text, under its own timeout.
pub struct RoleEmbedder {
    router: Arc<LlmRouter>,
    timeout_ms: u64,
}

impl RoleEmbedder {
    pub fn new(router: Arc<LlmRouter>, timeout_ms: u64) -> Self {
        Self { router, timeout_ms }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.router.registry().for_role("embedder").ok_or_else(|| {
            Error::Configuration("no provider assigned to the 'embedder' role".into())
        })?;

        let req = EmbeddingsRequest {
            input: vec![text.to_string()],
            model: self.router.registry().model_for_role("embedder").map(|m| {
                // Role spec is "provider_id/model_name"; strip the provider prefix.
                m.split_once('/').map(|(_, model)| model).unwrap_or(m).to_string()
            }),
        };

        let timeout = Duration::from_millis(self.timeout_ms);
        let resp = match tokio::time::timeout(timeout, provider.embeddings(req)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    operation: "embeddings".to_string(),
                    elapsed_ms: self.timeout_ms,
                })
            }
        };

        resp.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProviderPermanent {
                provider: "embedder".into(),
                message: "embeddings response contained no vectors".into(),
            })
    }
}
