use std::sync::Arc;

use color_eyre::eyre::WrapErr;

use civic_service::{CivicService, Vectorizer};
use civic_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<CivicService>,
}
impl AppState {
	/// Connects the store and loads the embedding model. A model that fails to load aborts
	/// startup.
	pub async fn new(config: civic_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.embedding.dimensions).await?;

		let embedding = config.embedding.clone();
		let vectorizer = tokio::task::spawn_blocking(move || Vectorizer::from_config(&embedding))
			.await?
			.wrap_err("Failed to load the embedding model.")?;
		let service = CivicService::new(config, Arc::new(db), vectorizer);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: CivicService) -> Self {
		Self { service: Arc::new(service) }
	}

	pub fn api_auth_token(&self) -> Option<&str> {
		self.service.cfg.security.api_auth_token.as_deref()
	}
}
