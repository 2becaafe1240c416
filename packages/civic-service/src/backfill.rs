use serde::Serialize;

use civic_domain::record::Collection;
use civic_storage::models::Record;

use crate::{CivicService, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
	pub collection: Collection,
	pub scanned: usize,
	pub embedded: usize,
	/// Rows that could not be embedded and were deferred with backoff.
	pub failed: usize,
}

impl CivicService {
	/// Embeds up to `batch_size` rows of `collection` whose embedding is absent.
	///
	/// Rows whose text is blank get the sentinel, which is stored but never matched. When the
	/// batch call fails each row is retried alone, and rows that still fail are deferred so they
	/// cannot hold back the rest of the collection.
	pub async fn backfill_embeddings(
		&self,
		collection: Collection,
		batch_size: u32,
	) -> Result<BackfillReport> {
		let pending = self.store.missing_embeddings(collection, batch_size).await?;

		if pending.is_empty() {
			return Ok(BackfillReport { collection, scanned: 0, embedded: 0, failed: 0 });
		}

		let texts: Vec<String> = pending.iter().map(Record::embedding_text).collect();
		let mut embedded = 0;
		let mut failed = 0;

		match self.vectorizer.embed_batch(&texts).await {
			Ok(vectors) =>
				for (record, vector) in pending.iter().zip(&vectors) {
					self.store.upsert_embedding(record.reference(), vector).await?;

					embedded += 1;
				},
			Err(err) => {
				tracing::warn!(
					error = %err,
					%collection,
					batch = pending.len(),
					"Batch embedding failed. Retrying rows one at a time."
				);

				for (record, text) in pending.iter().zip(&texts) {
					match self.vectorizer.embed(text).await {
						Ok(vector) => {
							self.store.upsert_embedding(record.reference(), &vector).await?;

							embedded += 1;
						},
						Err(err) => {
							tracing::warn!(
								error = %err,
								%collection,
								record_id = record.id(),
								"Embedding failed. Row deferred."
							);

							self.store.mark_embedding_failed(record.reference()).await?;

							failed += 1;
						},
					}
				}
			},
		}

		tracing::info!(
			%collection,
			scanned = pending.len(),
			embedded,
			failed,
			"Embedding backfill batch done."
		);

		Ok(BackfillReport { collection, scanned: pending.len(), embedded, failed })
	}
}
