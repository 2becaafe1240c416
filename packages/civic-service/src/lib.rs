pub mod backfill;
pub mod related;
pub mod search;
pub mod submit;
pub mod vectorizer;
pub mod views;

mod error;

pub use backfill::BackfillReport;
pub use error::{Error, Result};
pub use related::RelatedResponse;
pub use search::{SearchRequest, SearchResponse};
pub use submit::{
	AddAnnouncementRequest, AddRecordResponse, AddReportRequest, SubmitComplaintRequest,
	SubmitComplaintResponse, UpdateStatusRequest, UpdateStatusResponse,
};
pub use vectorizer::Vectorizer;
pub use views::{RankedItem, RecordView};

use std::{collections::HashMap, sync::Arc};

use civic_config::Config;
use civic_domain::{
	principal::Principal, ranking::RankedResult, record::Collection,
	visibility::VisibilityPredicate,
};
use civic_storage::{models::Record, store::RecordStore};

pub struct CivicService {
	pub cfg: Config,
	pub store: Arc<dyn RecordStore>,
	pub vectorizer: Vectorizer,
}
impl CivicService {
	pub fn new(cfg: Config, store: Arc<dyn RecordStore>, vectorizer: Vectorizer) -> Self {
		Self { cfg, store, vectorizer }
	}

	/// The caller's visibility, refusing principals it cannot be computed for.
	pub fn visibility(&self, principal: &Principal) -> Result<VisibilityPredicate> {
		Ok(VisibilityPredicate::for_principal(principal, &self.cfg.visibility.public_statuses)?)
	}

	/// `None` takes the configured default; values above the ceiling are clamped.
	pub(crate) fn resolve_limit(&self, requested: Option<i64>) -> Result<u32> {
		let search = &self.cfg.search;
		let Some(limit) = requested else {
			return Ok(search.default_limit.min(search.max_limit));
		};

		if limit <= 0 {
			return Err(Error::invalid_parameter(format!("limit must be positive, got {limit}.")));
		}

		Ok(u32::try_from(limit).unwrap_or(u32::MAX).min(search.max_limit))
	}

	/// Joins ranked results with their rows, keeping rank order. Rows deleted since ranking are
	/// skipped.
	pub(crate) async fn hydrate(
		&self,
		collection: Collection,
		ranked: &[RankedResult],
	) -> Result<Vec<(RankedResult, Record)>> {
		let ids: Vec<i64> = ranked.iter().map(|item| item.record.id).collect();
		let mut rows: HashMap<i64, Record> = self
			.store
			.fetch(collection, &ids)
			.await?
			.into_iter()
			.map(|record| (record.id(), record))
			.collect();

		Ok(ranked
			.iter()
			.filter_map(|item| rows.remove(&item.record.id).map(|record| (item.clone(), record)))
			.collect())
	}
}

/// Renumbers ranks 1..n after post-filtering.
pub(crate) fn renumber(items: &mut [RankedItem]) {
	for (idx, item) in items.iter_mut().enumerate() {
		item.rank = idx as u32 + 1;
	}
}
