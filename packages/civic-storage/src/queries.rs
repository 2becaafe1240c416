use sqlx::{FromRow, Postgres, QueryBuilder};
use time::Duration;

use civic_config::HNSW_EF_SEARCH_MAX;
use civic_domain::{
	ranking::Candidate,
	record::{Collection, ComplaintStatus, RecordRef},
	vector::EmbeddingVector,
};

use crate::{
	Error, Result,
	db::Db,
	filter,
	models::{
		Announcement, Complaint, NearestQuery, NewAnnouncement, NewComplaint, NewReport, Record,
		Report,
	},
	vector::{parse_pg_vector, vector_to_pg},
};

const COMPLAINT_COLUMNS: &str = "id, user_id, ward, category, description, status, created_at";
const ANNOUNCEMENT_COLUMNS: &str = "id, ward, title, body, created_at";
const REPORT_COLUMNS: &str = "id, officer_id, ward, report_text, created_at";

const EMBED_RETRY_BASE_MS: i64 = 500;
const EMBED_RETRY_MAX_MS: i64 = 30_000;
const EMBED_RETRY_MAX_DOUBLINGS: i32 = 6;

#[derive(Debug, FromRow)]
struct NearestRow {
	id: i64,
	created_at: time::OffsetDateTime,
	score: f32,
}

pub fn table(collection: Collection) -> &'static str {
	match collection {
		Collection::Complaints => "complaints",
		Collection::Announcements => "announcements",
		Collection::Reports => "reports",
	}
}

fn columns(collection: Collection) -> &'static str {
	match collection {
		Collection::Complaints => COMPLAINT_COLUMNS,
		Collection::Announcements => ANNOUNCEMENT_COLUMNS,
		Collection::Reports => REPORT_COLUMNS,
	}
}

pub async fn insert_complaint(
	db: &Db,
	new: &NewComplaint,
	embedding: Option<&EmbeddingVector>,
) -> Result<Complaint> {
	let vec_text = embedding.map(|vec| vector_to_pg(vec.as_slice()));
	let row = sqlx::query_as::<_, Complaint>(
		"\
INSERT INTO complaints (user_id, ward, category, description, embedding)
VALUES ($1, $2, $3, $4, $5::text::vector)
RETURNING id, user_id, ward, category, description, status, created_at",
	)
	.bind(new.user_id)
	.bind(new.ward)
	.bind(new.category.as_str())
	.bind(new.description.as_str())
	.bind(vec_text)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

pub async fn insert_announcement(
	db: &Db,
	new: &NewAnnouncement,
	embedding: Option<&EmbeddingVector>,
) -> Result<Announcement> {
	let vec_text = embedding.map(|vec| vector_to_pg(vec.as_slice()));
	let row = sqlx::query_as::<_, Announcement>(
		"\
INSERT INTO announcements (ward, title, body, embedding)
VALUES ($1, $2, $3, $4::text::vector)
RETURNING id, ward, title, body, created_at",
	)
	.bind(new.ward)
	.bind(new.title.as_str())
	.bind(new.body.as_str())
	.bind(vec_text)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

pub async fn insert_report(
	db: &Db,
	new: &NewReport,
	embedding: Option<&EmbeddingVector>,
) -> Result<Report> {
	let vec_text = embedding.map(|vec| vector_to_pg(vec.as_slice()));
	let row = sqlx::query_as::<_, Report>(
		"\
INSERT INTO reports (officer_id, ward, report_text, embedding)
VALUES ($1, $2, $3, $4::text::vector)
RETURNING id, officer_id, ward, report_text, created_at",
	)
	.bind(new.officer_id)
	.bind(new.ward)
	.bind(new.report_text.as_str())
	.bind(vec_text)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

pub async fn upsert_embedding(db: &Db, record: RecordRef, vector: &EmbeddingVector) -> Result<()> {
	let sql = format!(
		"UPDATE {} SET embedding = $1::text::vector WHERE id = $2",
		table(record.collection)
	);
	let result = sqlx::query(&sql)
		.bind(vector_to_pg(vector.as_slice()))
		.bind(record.id)
		.execute(&db.pool)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("{} {}", record.collection, record.id)));
	}

	Ok(())
}

/// Nearest rows by cosine distance under `query.filter`.
///
/// The filter, the absent-embedding check, and the sentinel check all sit in the `WHERE` clause,
/// so they apply before `LIMIT`. HNSW is approximate: when the filter is very selective the
/// index scan can run out of candidates and return fewer than `limit` rows even though more
/// matching rows exist. Raising `hnsw.ef_search` to at least `limit` keeps that rare; it is
/// capped at [`HNSW_EF_SEARCH_MAX`], which pgvector enforces.
pub async fn nearest(db: &Db, query: NearestQuery<'_>) -> Result<Vec<Candidate>> {
	if query.limit == 0 {
		return Ok(Vec::new());
	}

	let ef_search = db.ef_search.max(query.limit).min(HNSW_EF_SEARCH_MAX);
	let vec_text = vector_to_pg(query.vector.as_slice());
	let mut tx = db.pool.begin().await?;

	sqlx::query("SELECT set_config('hnsw.ef_search', $1, true)")
		.bind(ef_search.to_string())
		.execute(&mut *tx)
		.await?;

	let mut builder = QueryBuilder::<Postgres>::new("SELECT id, created_at, (1 - (embedding <=> ");

	builder.push_bind(vec_text.clone());
	builder.push("::text::vector))::real AS score FROM ");
	builder.push(table(query.collection));
	builder.push(" WHERE embedding IS NOT NULL AND vector_norm(embedding) > 0 AND ");
	filter::push_filter(&mut builder, query.collection, query.filter);
	builder.push(" ORDER BY embedding <=> ");
	builder.push_bind(vec_text);
	builder.push("::text::vector LIMIT ");
	builder.push_bind(i64::from(query.limit));

	let rows: Vec<NearestRow> = builder.build_query_as().fetch_all(&mut *tx).await?;

	tx.commit().await?;

	tracing::debug!(
		collection = %query.collection,
		limit = query.limit,
		ef_search,
		returned = rows.len(),
		"Nearest-neighbour query finished."
	);

	Ok(rows
		.into_iter()
		.map(|row| Candidate { id: row.id, score: row.score, created_at: row.created_at })
		.collect())
}

/// Full rows for `ids`, in no particular order. Unknown ids are skipped.
pub async fn fetch_records(db: &Db, collection: Collection, ids: &[i64]) -> Result<Vec<Record>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!(
		"SELECT {} FROM {} WHERE id = ANY($1)",
		columns(collection),
		table(collection)
	);
	let records: Vec<Record> = match collection {
		Collection::Complaints => sqlx::query_as::<_, Complaint>(&sql)
			.bind(ids)
			.fetch_all(&db.pool)
			.await?
			.into_iter()
			.map(Record::Complaint)
			.collect(),
		Collection::Announcements => sqlx::query_as::<_, Announcement>(&sql)
			.bind(ids)
			.fetch_all(&db.pool)
			.await?
			.into_iter()
			.map(Record::Announcement)
			.collect(),
		Collection::Reports => sqlx::query_as::<_, Report>(&sql)
			.bind(ids)
			.fetch_all(&db.pool)
			.await?
			.into_iter()
			.map(Record::Report)
			.collect(),
	};

	Ok(records)
}

pub async fn fetch_record(db: &Db, record: RecordRef) -> Result<Option<Record>> {
	let mut records = fetch_records(db, record.collection, &[record.id]).await?;

	Ok(records.pop())
}

/// The stored embedding of `record`, `None` when it has not been computed yet.
pub async fn stored_embedding(db: &Db, record: RecordRef) -> Result<Option<Vec<f32>>> {
	let sql = format!("SELECT embedding::text FROM {} WHERE id = $1", table(record.collection));
	let row: Option<Option<String>> =
		sqlx::query_scalar(&sql).bind(record.id).fetch_optional(&db.pool).await?;
	let Some(text) = row else {
		return Err(Error::NotFound(format!("{} {}", record.collection, record.id)));
	};

	text.map(|text| parse_pg_vector(&text)).transpose()
}

pub async fn set_complaint_status(db: &Db, id: i64, status: ComplaintStatus) -> Result<Complaint> {
	sqlx::query_as::<_, Complaint>(
		"\
UPDATE complaints
SET status = $1
WHERE id = $2
RETURNING id, user_id, ward, category, description, status, created_at",
	)
	.bind(status.as_str())
	.bind(id)
	.fetch_optional(&db.pool)
	.await?
	.ok_or_else(|| Error::NotFound(format!("complaints {id}")))
}

/// Oldest rows of `collection` still waiting for an embedding, skipping rows whose last attempt
/// failed and whose retry time has not come yet.
pub async fn missing_embeddings(
	db: &Db,
	collection: Collection,
	limit: u32,
) -> Result<Vec<Record>> {
	if limit == 0 {
		return Err(Error::InvalidArgument("Batch size must be positive.".to_string()));
	}

	let sql = format!(
		"\
SELECT {}
FROM {}
WHERE embedding IS NULL
	AND (embedding_retry_at IS NULL OR embedding_retry_at <= now())
ORDER BY id
LIMIT $1",
		columns(collection),
		table(collection)
	);
	let limit = i64::from(limit);
	let records: Vec<Record> = match collection {
		Collection::Complaints => sqlx::query_as::<_, Complaint>(&sql)
			.bind(limit)
			.fetch_all(&db.pool)
			.await?
			.into_iter()
			.map(Record::Complaint)
			.collect(),
		Collection::Announcements => sqlx::query_as::<_, Announcement>(&sql)
			.bind(limit)
			.fetch_all(&db.pool)
			.await?
			.into_iter()
			.map(Record::Announcement)
			.collect(),
		Collection::Reports => sqlx::query_as::<_, Report>(&sql)
			.bind(limit)
			.fetch_all(&db.pool)
			.await?
			.into_iter()
			.map(Record::Report)
			.collect(),
	};

	Ok(records)
}

/// Records a failed embedding attempt and defers the row by [`embed_retry_backoff`].
///
/// A row embedded in the meantime is left alone.
pub async fn mark_embedding_failed(db: &Db, record: RecordRef) -> Result<()> {
	let sql = format!(
		"\
UPDATE {}
SET embedding_attempts = embedding_attempts + 1,
	embedding_retry_at = now()
		+ LEAST($1::float8 * power(2, LEAST(embedding_attempts, $2)), $3::float8)
		* interval '1 millisecond'
WHERE id = $4 AND embedding IS NULL",
		table(record.collection)
	);

	sqlx::query(&sql)
		.bind(EMBED_RETRY_BASE_MS as f64)
		.bind(EMBED_RETRY_MAX_DOUBLINGS)
		.bind(EMBED_RETRY_MAX_MS as f64)
		.bind(record.id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Delay before the next attempt on a row that has failed `attempts` times.
pub fn embed_retry_backoff(attempts: i32) -> Duration {
	let doublings = attempts.saturating_sub(1).clamp(0, EMBED_RETRY_MAX_DOUBLINGS) as u32;

	let millis = EMBED_RETRY_BASE_MS.saturating_mul(1 << doublings).min(EMBED_RETRY_MAX_MS);

	Duration::milliseconds(millis)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retry_backoff_doubles_and_caps() {
		assert_eq!(embed_retry_backoff(0), Duration::milliseconds(500));
		assert_eq!(embed_retry_backoff(1), Duration::milliseconds(500));
		assert_eq!(embed_retry_backoff(2), Duration::seconds(1));
		assert_eq!(embed_retry_backoff(4), Duration::seconds(4));
		assert_eq!(embed_retry_backoff(7), Duration::seconds(30));
		assert_eq!(embed_retry_backoff(i32::MAX), Duration::seconds(30));
	}
}
