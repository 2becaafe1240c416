//! The record store seam the engine talks to.
//!
//! [`Db`] is the production implementation; tests substitute an in-memory one.

use std::{future::Future, pin::Pin};

use civic_domain::{
	ranking::Candidate,
	record::{Collection, ComplaintStatus, RecordRef},
	vector::EmbeddingVector,
};

use crate::{
	Result,
	db::Db,
	models::{
		Announcement, Complaint, NearestQuery, NewAnnouncement, NewComplaint, NewReport, Record,
		Report,
	},
	queries,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait RecordStore
where
	Self: Send + Sync,
{
	fn insert_complaint<'a>(
		&'a self,
		new: &'a NewComplaint,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Complaint>>;

	fn insert_announcement<'a>(
		&'a self,
		new: &'a NewAnnouncement,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Announcement>>;

	fn insert_report<'a>(
		&'a self,
		new: &'a NewReport,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Report>>;

	fn upsert_embedding<'a>(
		&'a self,
		record: RecordRef,
		vector: &'a EmbeddingVector,
	) -> BoxFuture<'a, Result<()>>;

	/// Similarity-descending candidates that have an embedding and satisfy the filter.
	fn nearest<'a>(&'a self, query: NearestQuery<'a>) -> BoxFuture<'a, Result<Vec<Candidate>>>;

	fn fetch<'a>(
		&'a self,
		collection: Collection,
		ids: &'a [i64],
	) -> BoxFuture<'a, Result<Vec<Record>>>;

	fn get(&self, record: RecordRef) -> BoxFuture<'_, Result<Option<Record>>>;

	/// Fails with `NotFound` for an unknown record; `None` means no embedding yet.
	fn embedding(&self, record: RecordRef) -> BoxFuture<'_, Result<Option<Vec<f32>>>>;

	fn set_complaint_status(
		&self,
		id: i64,
		status: ComplaintStatus,
	) -> BoxFuture<'_, Result<Complaint>>;

	/// Rows with no embedding that are due for an attempt, oldest first.
	fn missing_embeddings(
		&self,
		collection: Collection,
		limit: u32,
	) -> BoxFuture<'_, Result<Vec<Record>>>;

	/// Defers the next embedding attempt on `record`, backing off with each failure.
	fn mark_embedding_failed(&self, record: RecordRef) -> BoxFuture<'_, Result<()>>;
}

impl RecordStore for Db {
	fn insert_complaint<'a>(
		&'a self,
		new: &'a NewComplaint,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Complaint>> {
		Box::pin(queries::insert_complaint(self, new, embedding))
	}

	fn insert_announcement<'a>(
		&'a self,
		new: &'a NewAnnouncement,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Announcement>> {
		Box::pin(queries::insert_announcement(self, new, embedding))
	}

	fn insert_report<'a>(
		&'a self,
		new: &'a NewReport,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Report>> {
		Box::pin(queries::insert_report(self, new, embedding))
	}

	fn upsert_embedding<'a>(
		&'a self,
		record: RecordRef,
		vector: &'a EmbeddingVector,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(queries::upsert_embedding(self, record, vector))
	}

	fn nearest<'a>(&'a self, query: NearestQuery<'a>) -> BoxFuture<'a, Result<Vec<Candidate>>> {
		Box::pin(queries::nearest(self, query))
	}

	fn fetch<'a>(
		&'a self,
		collection: Collection,
		ids: &'a [i64],
	) -> BoxFuture<'a, Result<Vec<Record>>> {
		Box::pin(queries::fetch_records(self, collection, ids))
	}

	fn get(&self, record: RecordRef) -> BoxFuture<'_, Result<Option<Record>>> {
		Box::pin(queries::fetch_record(self, record))
	}

	fn embedding(&self, record: RecordRef) -> BoxFuture<'_, Result<Option<Vec<f32>>>> {
		Box::pin(queries::stored_embedding(self, record))
	}

	fn set_complaint_status(
		&self,
		id: i64,
		status: ComplaintStatus,
	) -> BoxFuture<'_, Result<Complaint>> {
		Box::pin(queries::set_complaint_status(self, id, status))
	}

	fn missing_embeddings(
		&self,
		collection: Collection,
		limit: u32,
	) -> BoxFuture<'_, Result<Vec<Record>>> {
		Box::pin(queries::missing_embeddings(self, collection, limit))
	}

	fn mark_embedding_failed(&self, record: RecordRef) -> BoxFuture<'_, Result<()>> {
		Box::pin(queries::mark_embedding_failed(self, record))
	}
}
