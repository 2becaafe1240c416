//! Related-issue detection for complaints.

use serde::Serialize;

use civic_domain::{
	filter::{Field, FilterExpr},
	principal::Principal,
	ranking::{self, RankedResult},
	record::{Collection, RecordRef},
	vector::EmbeddingVector,
	visibility::ward_filter_expr,
};
use civic_storage::models::{NearestQuery, Record};

use crate::{CivicService, Error, RankedItem, Result};

#[derive(Debug, Clone, Serialize)]
pub struct RelatedResponse {
	pub complaint_id: i64,
	pub items: Vec<RankedItem>,
}

impl CivicService {
	/// Complaints in `ward` most similar to `text`, never including `exclude_id`.
	///
	/// Scoped to the ward alone, whoever asks.
	pub async fn find_related(
		&self,
		text: &str,
		ward: i32,
		exclude_id: Option<i64>,
		cap: u32,
	) -> Result<Vec<RankedResult>> {
		let vector = self.vectorizer.embed(text).await?;

		self.find_related_to_vector(&vector, ward, exclude_id, None, cap).await
	}

	/// `visible` is conjoined into the store query, so hidden complaints never take a slot
	/// within `cap`.
	pub(crate) async fn find_related_to_vector(
		&self,
		vector: &EmbeddingVector,
		ward: i32,
		exclude_id: Option<i64>,
		visible: Option<&FilterExpr>,
		cap: u32,
	) -> Result<Vec<RankedResult>> {
		if cap == 0 {
			return Err(Error::invalid_parameter("cap must be positive."));
		}
		// Nothing can be similar to text without semantic content.
		if vector.is_sentinel() {
			return Ok(Vec::new());
		}

		let collection = Collection::Complaints;
		let mut filter = ward_filter_expr(collection, ward);

		if let Some(id) = exclude_id {
			filter = filter.and(FilterExpr::ne(Field::Id, id));
		}
		if let Some(visible) = visible {
			filter = filter.and(visible.clone());
		}

		let candidates = self
			.store
			.nearest(NearestQuery { collection, vector, filter: &filter, limit: cap })
			.await?;

		Ok(ranking::rank(collection, candidates, self.cfg.search.min_score, cap as usize))
	}

	/// Complaints related to an existing complaint the caller can see.
	///
	/// A complaint outside the caller's visibility is reported as not found.
	pub async fn related_to(
		&self,
		principal: &Principal,
		complaint_id: i64,
	) -> Result<RelatedResponse> {
		let scope = self.visibility(principal)?.scope(Collection::Complaints)?;
		let reference = RecordRef { collection: Collection::Complaints, id: complaint_id };
		let not_found =
			|| Error::RecordNotFound { message: format!("Complaint {complaint_id} not found.") };
		let record = self.store.get(reference).await?.ok_or_else(not_found)?;
		let Record::Complaint(complaint) = &record else {
			return Err(not_found());
		};

		if !scope.matches(&record.meta()) {
			return Err(not_found());
		}

		let vector = match self.store.embedding(reference).await? {
			Some(values) => EmbeddingVector::from_stored(values, self.vectorizer.dim())
				.map_err(|err| Error::StoreUnavailable { message: err.to_string() })?,
			None => self.vectorizer.embed(&complaint.description).await?,
		};
		let ranked = self
			.find_related_to_vector(
				&vector,
				complaint.ward,
				Some(complaint.id),
				Some(&scope),
				self.cfg.related.internal_cap,
			)
			.await?;
		let items = self.ranked_items(Collection::Complaints, &ranked).await?;

		Ok(RelatedResponse { complaint_id, items })
	}

	/// Hydrates `ranked`, renumbering ranks over rows deleted since ranking.
	pub(crate) async fn ranked_items(
		&self,
		collection: Collection,
		ranked: &[RankedResult],
	) -> Result<Vec<RankedItem>> {
		let mut items: Vec<RankedItem> = self
			.hydrate(collection, ranked)
			.await?
			.into_iter()
			.map(|(ranked, record)| RankedItem::new(&ranked, record))
			.collect();

		crate::renumber(&mut items);

		Ok(items)
	}
}
