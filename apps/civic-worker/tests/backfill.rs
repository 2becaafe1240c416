use std::{sync::Arc, time::Duration};

use civic_domain::{
	principal::Principal,
	record::{Collection, RecordRef},
};
use civic_service::{
	AddAnnouncementRequest, AddReportRequest, CivicService, SubmitComplaintRequest, Vectorizer,
};
use civic_testkit::{MemoryStore, StubEmbedding};
use civic_worker::worker::{self, WorkerState};

const DIM: usize = 384;
const CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "info"

[storage.postgres]
dsn            = "postgres://unused"
pool_max_conns = 1

[embedding]
backend    = "local"
model      = "all-MiniLM-L6-v2"
dimensions = 384
"#;

fn state(batch_size: u32) -> (WorkerState, Arc<MemoryStore>, Arc<StubEmbedding>) {
	let cfg = civic_config::parse(CONFIG).expect("Test config must be valid.");
	let store = Arc::new(MemoryStore::new());
	let stub = Arc::new(StubEmbedding::new(DIM));
	let vectorizer = Vectorizer::new(stub.clone(), DIM);
	let service = CivicService::new(cfg, store.clone(), vectorizer);

	(WorkerState { service, batch_size, poll_interval_ms: 10 }, store, stub)
}

async fn seed_unembedded(state: &WorkerState, stub: &StubEmbedding) -> Vec<RecordRef> {
	stub.set_failing(true);

	let complaint = state
		.service
		.submit_with_related(
			&Principal::citizen(7, 5),
			SubmitComplaintRequest {
				ward: 5,
				category: "roads".to_string(),
				description: "pothole near the school gate".to_string(),
			},
		)
		.await
		.expect("Submission must survive a failing model.");
	let announcement = state
		.service
		.add_announcement(
			&Principal::admin(1),
			AddAnnouncementRequest {
				ward: None,
				title: "Water supply".to_string(),
				body: "Supply interrupted on Sunday".to_string(),
			},
		)
		.await
		.expect("Announcement must survive a failing model.");
	let report = state
		.service
		.add_report(
			&Principal::officer(20, 5),
			AddReportRequest { ward: 5, report_text: "Drain inspection done".to_string() },
		)
		.await
		.expect("Report must survive a failing model.");

	stub.set_failing(false);

	assert!(!complaint.embedded);
	assert!(!announcement.embedded);
	assert!(!report.embedded);

	vec![
		RecordRef { collection: Collection::Complaints, id: complaint.complaint.id() },
		RecordRef { collection: Collection::Announcements, id: announcement.record.id() },
		RecordRef { collection: Collection::Reports, id: report.record.id() },
	]
}

#[tokio::test]
async fn backfill_once_embeds_every_collection() {
	let (state, store, stub) = state(16);
	let refs = seed_unembedded(&state, &stub).await;

	assert_eq!(worker::backfill_once(&state).await, 3);

	for reference in refs {
		assert!(store.stored_embedding(reference).is_some(), "{reference:?} was not embedded");
	}

	assert_eq!(worker::backfill_once(&state).await, 0);
}

#[tokio::test]
async fn failing_model_defers_rows_until_their_backoff_passes() {
	let (state, store, stub) = state(16);
	let refs = seed_unembedded(&state, &stub).await;

	stub.set_failing(true);

	assert_eq!(worker::backfill_once(&state).await, 0);
	assert!(refs.iter().all(|reference| store.stored_embedding(*reference).is_none()));
	assert!(refs.iter().all(|reference| store.embedding_attempts(*reference) == 1));

	stub.set_failing(false);

	assert_eq!(worker::backfill_once(&state).await, 0);

	tokio::time::sleep(Duration::from_millis(600)).await;

	assert_eq!(worker::backfill_once(&state).await, 3);
}

#[tokio::test]
async fn one_rejected_row_does_not_stall_its_collection() {
	let (state, store, stub) = state(16);
	let refs = seed_unembedded(&state, &stub).await;
	let pothole = refs[0];

	stub.set_failing(true);

	let drain = state
		.service
		.submit_with_related(
			&Principal::citizen(7, 5),
			SubmitComplaintRequest {
				ward: 5,
				category: "drainage".to_string(),
				description: "open drain by the market".to_string(),
			},
		)
		.await
		.expect("Submission must survive a failing model.");
	let drain = RecordRef { collection: Collection::Complaints, id: drain.complaint.id() };

	stub.set_failing(false);
	stub.reject_containing("pothole");

	// The drain complaint, the announcement, and the report.
	assert_eq!(worker::backfill_once(&state).await, 3);
	assert!(store.stored_embedding(drain).is_some());
	assert!(store.stored_embedding(pothole).is_none());
	assert_eq!(store.embedding_attempts(pothole), 1);
}

#[tokio::test]
async fn batch_size_bounds_each_pass() {
	let (state, _store, stub) = state(1);

	stub.set_failing(true);

	for description in ["broken street light", "overflowing garbage bin"] {
		state
			.service
			.submit_with_related(
				&Principal::citizen(7, 5),
				SubmitComplaintRequest {
					ward: 5,
					category: "roads".to_string(),
					description: description.to_string(),
				},
			)
			.await
			.expect("Submission must survive a failing model.");
	}

	stub.set_failing(false);

	assert_eq!(worker::backfill_once(&state).await, 1);
	assert_eq!(worker::backfill_once(&state).await, 1);
	assert_eq!(worker::backfill_once(&state).await, 0);
}
