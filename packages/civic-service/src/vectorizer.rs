//! Text to [`EmbeddingVector`].
//!
//! Empty or whitespace-only text never reaches the model; it maps to the all-zero sentinel of the
//! configured dimension. Everything else is encoded and L2-normalized.

use std::sync::Arc;

use civic_config::EmbeddingBackend;
use civic_domain::vector::EmbeddingVector;
use civic_providers::{EmbeddingProvider, embedding::HttpEmbedder, local::LocalModel};

use crate::{Error, Result};

#[derive(Clone)]
pub struct Vectorizer {
	provider: Arc<dyn EmbeddingProvider>,
	dim: usize,
}
impl Vectorizer {
	pub fn new(provider: Arc<dyn EmbeddingProvider>, dim: usize) -> Self {
		Self { provider, dim }
	}

	/// Builds the configured backend. Loading a local model blocks for seconds; call this once at
	/// startup from a blocking context.
	pub fn from_config(cfg: &civic_config::Embedding) -> Result<Self> {
		let provider: Arc<dyn EmbeddingProvider> = match cfg.backend {
			EmbeddingBackend::Local => Arc::new(LocalModel::load(cfg)?),
			EmbeddingBackend::Http => Arc::new(HttpEmbedder::new(cfg)?),
		};

		Ok(Self::new(provider, cfg.dimensions as usize))
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
		let mut vectors = self.embed_batch(&[text.to_string()]).await?;

		vectors.pop().ok_or_else(|| Error::ModelUnavailable {
			message: "Embedding model returned no vectors.".to_string(),
		})
	}

	/// One vector per input, in input order.
	pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
		let mut out: Vec<Option<EmbeddingVector>> = vec![None; texts.len()];
		let mut positions = Vec::new();
		let mut inputs = Vec::new();

		for (idx, text) in texts.iter().enumerate() {
			let trimmed = text.trim();

			if trimmed.is_empty() {
				out[idx] = Some(EmbeddingVector::sentinel(self.dim));
			} else {
				positions.push(idx);
				inputs.push(trimmed.to_string());
			}
		}

		if !inputs.is_empty() {
			let raw = self.provider.embed(&inputs).await?;

			if raw.len() != inputs.len() {
				return Err(Error::ModelUnavailable {
					message: format!(
						"Embedding model returned {} vectors for {} inputs.",
						raw.len(),
						inputs.len()
					),
				});
			}

			for (idx, vec) in positions.into_iter().zip(raw) {
				out[idx] = Some(EmbeddingVector::normalized(vec, self.dim)?);
			}
		}

		Ok(out.into_iter().flatten().collect())
	}

	/// Cosine similarity of two texts. `None` when either side has no semantic content.
	pub async fn compute_similarity(&self, text_a: &str, text_b: &str) -> Result<Option<f32>> {
		let vectors = self.embed_batch(&[text_a.to_string(), text_b.to_string()]).await?;
		let [a, b] = vectors.as_slice() else {
			return Err(Error::ModelUnavailable {
				message: "Embedding model returned the wrong number of vectors.".to_string(),
			});
		};

		Ok(a.similarity(b))
	}
}
