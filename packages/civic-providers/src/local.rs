//! In-process sentence-embedding model.
//!
//! Loading downloads (on first use) and initializes ONNX weights, which takes seconds; do it
//! once at startup. Inference is CPU-bound and runs on the blocking pool. The session sits
//! behind a mutex because the runtime's encode call takes `&mut self`.

use std::{
	path::PathBuf,
	sync::{Arc, Mutex},
	time::Instant,
};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::{Error, Result};

pub struct LocalModel {
	model: Arc<Mutex<TextEmbedding>>,
	batch_size: usize,
}
impl LocalModel {
	/// Blocks the calling thread until the model is ready.
	pub fn load(cfg: &civic_config::Embedding) -> Result<Self> {
		let kind = model_kind(&cfg.model)?;
		let mut options = InitOptions::new(kind).with_show_download_progress(false);

		if let Some(dir) = cfg.cache_dir.as_deref() {
			options = options.with_cache_dir(PathBuf::from(dir));
		}

		let started = Instant::now();
		let model = TextEmbedding::try_new(options).map_err(|err| Error::ModelLoad {
			model: cfg.model.clone(),
			message: err.to_string(),
		})?;

		tracing::info!(
			model = %cfg.model,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Embedding model loaded."
		);

		Ok(Self { model: Arc::new(Mutex::new(model)), batch_size: cfg.batch_size as usize })
	}

	pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let model = self.model.clone();
		let batch_size = self.batch_size;

		tokio::task::spawn_blocking(move || {
			let mut model = model.lock().unwrap_or_else(|err| err.into_inner());

			model
				.embed(texts, Some(batch_size))
				.map_err(|err| Error::Inference { message: err.to_string() })
		})
		.await?
	}
}

fn model_kind(name: &str) -> Result<EmbeddingModel> {
	match name.trim().to_ascii_lowercase().as_str() {
		"all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" =>
			Ok(EmbeddingModel::AllMiniLML6V2),
		"bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
		other => Err(Error::InvalidConfig {
			message: format!("Unsupported local embedding model {other:?}."),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_supported_model_names() {
		assert!(matches!(model_kind("all-MiniLM-L6-v2"), Ok(EmbeddingModel::AllMiniLML6V2)));
		assert!(matches!(
			model_kind("sentence-transformers/all-MiniLM-L6-v2"),
			Ok(EmbeddingModel::AllMiniLML6V2)
		));
		assert!(matches!(model_kind("bge-small-en-v1.5"), Ok(EmbeddingModel::BGESmallENV15)));
		assert!(matches!(model_kind("gpt-2"), Err(Error::InvalidConfig { .. })));
	}
}
