//! Free-text similarity search under the caller's visibility.

use serde::{Deserialize, Serialize};

use civic_domain::{
	principal::Principal,
	ranking::{self, RankedResult},
	record::Collection,
};
use civic_storage::models::NearestQuery;

use crate::{CivicService, Error, RankedItem, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub ward: Option<i32>,
	#[serde(default)]
	pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub collection: Collection,
	pub query: String,
	pub items: Vec<RankedItem>,
}

impl CivicService {
	/// Ranks `collection` against `query_text`.
	///
	/// `ward_filter` is intersected with the caller's visibility, so it can only narrow what the
	/// caller sees. The combined filter is pushed into the store query, ahead of the limit.
	pub async fn build_search(
		&self,
		collection: Collection,
		principal: &Principal,
		query_text: &str,
		ward_filter: Option<i32>,
		limit: Option<i64>,
	) -> Result<Vec<RankedResult>> {
		let limit = self.resolve_limit(limit)?;

		if query_text.trim().is_empty() {
			return Err(Error::InvalidQuery { message: "Query text must not be empty.".to_string() });
		}

		let visibility = self.visibility(principal)?;
		let filter = visibility.restrict(collection, ward_filter)?;
		let vector = self.vectorizer.embed(query_text).await?;
		let candidates = self
			.store
			.nearest(NearestQuery { collection, vector: &vector, filter: &filter, limit })
			.await?;
		let ranked =
			ranking::rank(collection, candidates, self.cfg.search.min_score, limit as usize);

		tracing::debug!(
			%collection,
			role = visibility.role().as_str(),
			limit,
			%filter,
			returned = ranked.len(),
			"Search ranked."
		);

		Ok(ranked)
	}

	pub async fn search(
		&self,
		collection: Collection,
		principal: &Principal,
		req: SearchRequest,
	) -> Result<SearchResponse> {
		let ranked =
			self.build_search(collection, principal, &req.query, req.ward, req.limit).await?;
		let items = self
			.hydrate(collection, &ranked)
			.await?
			.into_iter()
			.map(|(ranked, record)| RankedItem::new(&ranked, record))
			.collect();

		Ok(SearchResponse { collection, query: req.query, items })
	}
}
