use std::time::Duration;

use civic_domain::record::Collection;
use civic_service::CivicService;

pub struct WorkerState {
	pub service: CivicService,
	pub batch_size: u32,
	pub poll_interval_ms: u64,
}

pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	tracing::info!(
		batch_size = state.batch_size,
		poll_interval_ms = state.poll_interval_ms,
		"Embedding backfill worker started."
	);

	loop {
		let embedded = backfill_once(&state).await;

		// A full pass means more rows may be waiting.
		if embedded == 0 {
			tokio::time::sleep(Duration::from_millis(state.poll_interval_ms)).await;
		}
	}
}

/// One backfill batch per collection. Returns how many rows got an embedding.
///
/// Failures are logged and leave the rows for the next pass.
pub async fn backfill_once(state: &WorkerState) -> usize {
	let mut embedded = 0;

	for collection in Collection::ALL {
		match state.service.backfill_embeddings(collection, state.batch_size).await {
			Ok(report) => embedded += report.embedded,
			Err(err) => {
				tracing::error!(error = %err, %collection, "Embedding backfill failed.");
			},
		}
	}

	embedded
}
