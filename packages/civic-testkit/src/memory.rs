use std::sync::Mutex;

use time::{Duration, OffsetDateTime, macros::datetime};

use civic_domain::{
	ranking::Candidate,
	record::{Collection, ComplaintStatus, RecordRef},
	vector::EmbeddingVector,
};
use civic_storage::{
	Error, Result,
	models::{
		Announcement, Complaint, NearestQuery, NewAnnouncement, NewComplaint, NewReport, Record,
		Report,
	},
	queries,
	store::{BoxFuture, RecordStore},
};

/// In-process [`RecordStore`] with exact cosine search.
///
/// Inserts are stamped from a synthetic clock that advances one second per insert, so later
/// inserts are always newer.
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

struct Inner {
	rows: Vec<Row>,
	next_id: i64,
	clock: OffsetDateTime,
	unavailable: bool,
}
impl Inner {
	fn tick(&mut self) -> (i64, OffsetDateTime) {
		let id = self.next_id;

		self.next_id += 1;
		self.clock += Duration::seconds(1);

		(id, self.clock)
	}

	fn check(&self) -> Result<()> {
		if self.unavailable {
			return Err(Error::Sqlx(sqlx::Error::PoolTimedOut));
		}

		Ok(())
	}

	fn row_mut(&mut self, record: RecordRef) -> Option<&mut Row> {
		self.rows.iter_mut().find(|row| row.record.reference() == record)
	}
}

struct Row {
	record: Record,
	embedding: Option<Vec<f32>>,
	embedding_attempts: i32,
	/// Wall-clock, like the `now()` the database compares against.
	embedding_retry_at: Option<OffsetDateTime>,
}
impl Row {
	fn new(record: Record, embedding: Option<Vec<f32>>) -> Self {
		Self { record, embedding, embedding_attempts: 0, embedding_retry_at: None }
	}

	fn due_for_embedding(&self, now: OffsetDateTime) -> bool {
		self.embedding.is_none() && self.embedding_retry_at.is_none_or(|at| at <= now)
	}
}

impl MemoryStore {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(Inner {
				rows: Vec::new(),
				next_id: 1,
				clock: datetime!(2024-01-01 00:00 UTC),
				unavailable: false,
			}),
		}
	}

	/// Inserts `record` exactly as given, id and timestamp included.
	pub fn seed(&self, record: Record, embedding: Option<Vec<f32>>) {
		self.with_inner(|inner| {
			inner.next_id = inner.next_id.max(record.id() + 1);
			inner.rows.retain(|row| row.record.reference() != record.reference());
			inner.rows.push(Row::new(record, embedding));
		});
	}

	/// Makes every call fail the way an unreachable database does.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.with_inner(|inner| inner.unavailable = unavailable);
	}

	pub fn stored_embedding(&self, record: RecordRef) -> Option<Vec<f32>> {
		self.with_inner(|inner| {
			inner
				.rows
				.iter()
				.find(|row| row.record.reference() == record)
				.and_then(|row| row.embedding.clone())
		})
	}

	/// Failed embedding attempts recorded against `record`.
	pub fn embedding_attempts(&self, record: RecordRef) -> i32 {
		self.with_inner(|inner| {
			inner
				.rows
				.iter()
				.find(|row| row.record.reference() == record)
				.map_or(0, |row| row.embedding_attempts)
		})
	}

	pub fn count(&self, collection: Collection) -> usize {
		self.with_inner(|inner| {
			inner.rows.iter().filter(|row| row.record.collection() == collection).count()
		})
	}

	fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
		let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		f(&mut inner)
	}

	fn insert(
		&self,
		build: impl FnOnce(i64, OffsetDateTime) -> Record,
		embedding: Option<&EmbeddingVector>,
	) -> Result<Record> {
		self.with_inner(|inner| {
			inner.check()?;

			let (id, created_at) = inner.tick();
			let record = build(id, created_at);

			inner
				.rows
				.push(Row::new(record.clone(), embedding.map(|vec| vec.as_slice().to_vec())));

			Ok(record)
		})
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl RecordStore for MemoryStore {
	fn insert_complaint<'a>(
		&'a self,
		new: &'a NewComplaint,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Complaint>> {
		let result = self
			.insert(
				|id, created_at| {
					Record::Complaint(Complaint {
						id,
						user_id: new.user_id,
						ward: new.ward,
						category: new.category.clone(),
						description: new.description.clone(),
						status: ComplaintStatus::Pending.as_str().to_string(),
						created_at,
					})
				},
				embedding,
			)
			.and_then(|record| match record {
				Record::Complaint(row) => Ok(row),
				other => Err(Error::InvalidArgument(format!("Unexpected {}.", other.collection()))),
			});

		Box::pin(async move { result })
	}

	fn insert_announcement<'a>(
		&'a self,
		new: &'a NewAnnouncement,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Announcement>> {
		let result = self
			.insert(
				|id, created_at| {
					Record::Announcement(Announcement {
						id,
						ward: new.ward,
						title: new.title.clone(),
						body: new.body.clone(),
						created_at,
					})
				},
				embedding,
			)
			.and_then(|record| match record {
				Record::Announcement(row) => Ok(row),
				other => Err(Error::InvalidArgument(format!("Unexpected {}.", other.collection()))),
			});

		Box::pin(async move { result })
	}

	fn insert_report<'a>(
		&'a self,
		new: &'a NewReport,
		embedding: Option<&'a EmbeddingVector>,
	) -> BoxFuture<'a, Result<Report>> {
		let result = self
			.insert(
				|id, created_at| {
					Record::Report(Report {
						id,
						officer_id: new.officer_id,
						ward: new.ward,
						report_text: new.report_text.clone(),
						created_at,
					})
				},
				embedding,
			)
			.and_then(|record| match record {
				Record::Report(row) => Ok(row),
				other => Err(Error::InvalidArgument(format!("Unexpected {}.", other.collection()))),
			});

		Box::pin(async move { result })
	}

	fn upsert_embedding<'a>(
		&'a self,
		record: RecordRef,
		vector: &'a EmbeddingVector,
	) -> BoxFuture<'a, Result<()>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			let row = inner
				.row_mut(record)
				.ok_or_else(|| Error::NotFound(format!("{} {}", record.collection, record.id)))?;

			row.embedding = Some(vector.as_slice().to_vec());

			Ok(())
		});

		Box::pin(async move { result })
	}

	fn nearest<'a>(&'a self, query: NearestQuery<'a>) -> BoxFuture<'a, Result<Vec<Candidate>>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			let mut candidates: Vec<Candidate> = inner
				.rows
				.iter()
				.filter(|row| row.record.collection() == query.collection)
				.filter(|row| query.filter.matches(&row.record.meta()))
				.filter_map(|row| {
					let stored = row.embedding.as_deref()?;
					let score = cosine(stored, query.vector.as_slice())?;

					Some(Candidate {
						id: row.record.id(),
						score,
						created_at: row.record.created_at(),
					})
				})
				.collect();

			candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
			candidates.truncate(query.limit as usize);

			Ok(candidates)
		});

		Box::pin(async move { result })
	}

	fn fetch<'a>(
		&'a self,
		collection: Collection,
		ids: &'a [i64],
	) -> BoxFuture<'a, Result<Vec<Record>>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			Ok(inner
				.rows
				.iter()
				.filter(|row| {
					row.record.collection() == collection && ids.contains(&row.record.id())
				})
				.map(|row| row.record.clone())
				.collect())
		});

		Box::pin(async move { result })
	}

	fn get(&self, record: RecordRef) -> BoxFuture<'_, Result<Option<Record>>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			Ok(inner
				.rows
				.iter()
				.find(|row| row.record.reference() == record)
				.map(|row| row.record.clone()))
		});

		Box::pin(async move { result })
	}

	fn embedding(&self, record: RecordRef) -> BoxFuture<'_, Result<Option<Vec<f32>>>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			inner
				.rows
				.iter()
				.find(|row| row.record.reference() == record)
				.map(|row| row.embedding.clone())
				.ok_or_else(|| Error::NotFound(format!("{} {}", record.collection, record.id)))
		});

		Box::pin(async move { result })
	}

	fn set_complaint_status(
		&self,
		id: i64,
		status: ComplaintStatus,
	) -> BoxFuture<'_, Result<Complaint>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			let reference = RecordRef { collection: Collection::Complaints, id };
			let row = inner
				.row_mut(reference)
				.ok_or_else(|| Error::NotFound(format!("complaints {id}")))?;

			match &mut row.record {
				Record::Complaint(complaint) => {
					complaint.status = status.as_str().to_string();

					Ok(complaint.clone())
				},
				_ => Err(Error::NotFound(format!("complaints {id}"))),
			}
		});

		Box::pin(async move { result })
	}

	fn missing_embeddings(
		&self,
		collection: Collection,
		limit: u32,
	) -> BoxFuture<'_, Result<Vec<Record>>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			if limit == 0 {
				return Err(Error::InvalidArgument("Batch size must be positive.".to_string()));
			}

			let now = OffsetDateTime::now_utc();
			let mut pending: Vec<Record> = inner
				.rows
				.iter()
				.filter(|row| row.record.collection() == collection && row.due_for_embedding(now))
				.map(|row| row.record.clone())
				.collect();

			pending.sort_by_key(Record::id);
			pending.truncate(limit as usize);

			Ok(pending)
		});

		Box::pin(async move { result })
	}

	fn mark_embedding_failed(&self, record: RecordRef) -> BoxFuture<'_, Result<()>> {
		let result = self.with_inner(|inner| {
			inner.check()?;

			if let Some(row) = inner.row_mut(record).filter(|row| row.embedding.is_none()) {
				row.embedding_attempts += 1;
				row.embedding_retry_at = Some(
					OffsetDateTime::now_utc() + queries::embed_retry_backoff(row.embedding_attempts),
				);
			}

			Ok(())
		});

		Box::pin(async move { result })
	}
}

/// Matches pgvector's `1 - (a <=> b)`; `None` where pgvector would yield `NaN`.
fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
	if a.len() != b.len() {
		return None;
	}

	let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);

	for (x, y) in a.iter().zip(b) {
		let (x, y) = (f64::from(*x), f64::from(*y));

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return None;
	}

	Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}
