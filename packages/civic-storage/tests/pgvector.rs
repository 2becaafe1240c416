use civic_config::Postgres;
use civic_domain::{
	filter::{Field, FilterExpr},
	record::{Collection, ComplaintStatus, RecordRef},
	vector::EmbeddingVector,
};
use civic_storage::{
	Error,
	db::Db,
	models::{NearestQuery, NewAnnouncement, NewComplaint, Record},
	store::RecordStore,
};
use civic_testkit::TestDatabase;

const DIM: usize = 4;

fn unit(raw: [f32; 4]) -> EmbeddingVector {
	EmbeddingVector::normalized(raw.to_vec(), DIM).expect("Test vector must normalize.")
}

fn complaint(user_id: i64, ward: i32, description: &str) -> NewComplaint {
	NewComplaint {
		user_id,
		ward,
		category: "roads".to_string(),
		description: description.to_string(),
	}
}

async fn connect(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2, ef_search: 40 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(DIM as u32).await.expect("Failed to ensure schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CIVIC_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = civic_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set CIVIC_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = connect(&test_db).await;

	db.ensure_schema(DIM as u32).await.expect("Second bootstrap must succeed.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables \
		 WHERE table_name IN ('complaints', 'announcements', 'reports')",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 3);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CIVIC_PG_DSN to run."]
async fn nearest_pushes_filters_before_the_limit() {
	let Some(base_dsn) = civic_testkit::env_dsn() else {
		eprintln!("Skipping nearest_pushes_filters_before_the_limit; set CIVIC_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = connect(&test_db).await;
	let query = unit([1.0, 0.0, 0.0, 0.0]);
	let close = db
		.insert_complaint(&complaint(1, 5, "close"), Some(&unit([1.0, 0.1, 0.0, 0.0])))
		.await
		.expect("Insert failed.");
	let other_ward = db
		.insert_complaint(&complaint(1, 6, "identical"), Some(&query))
		.await
		.expect("Insert failed.");
	let far = db
		.insert_complaint(&complaint(2, 5, "far"), Some(&unit([0.0, 1.0, 0.0, 0.0])))
		.await
		.expect("Insert failed.");
	let missing =
		db.insert_complaint(&complaint(2, 5, "missing"), None).await.expect("Insert failed.");
	let sentinel = db
		.insert_complaint(&complaint(2, 5, " "), Some(&EmbeddingVector::sentinel(DIM)))
		.await
		.expect("Insert failed.");
	let filter = FilterExpr::eq(Field::Ward, 5_i32);
	let found = db
		.nearest(NearestQuery {
			collection: Collection::Complaints,
			vector: &query,
			filter: &filter,
			limit: 1,
		})
		.await
		.expect("Nearest failed.");

	assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![close.id]);

	let everything = db
		.nearest(NearestQuery {
			collection: Collection::Complaints,
			vector: &query,
			filter: &FilterExpr::True,
			limit: 10,
		})
		.await
		.expect("Nearest failed.");
	let ids: Vec<i64> = everything.iter().map(|c| c.id).collect();

	assert_eq!(ids, vec![other_ward.id, close.id, far.id]);
	assert!(!ids.contains(&missing.id));
	assert!(!ids.contains(&sentinel.id));
	assert!((everything[0].score - 1.0).abs() < 1e-4);
	assert!(everything[2].score.abs() < 1e-4);

	let nothing = db
		.nearest(NearestQuery {
			collection: Collection::Complaints,
			vector: &query,
			filter: &FilterExpr::is_in(Field::Status, Vec::<String>::new()),
			limit: 10,
		})
		.await
		.expect("Nearest failed.");

	assert!(nothing.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CIVIC_PG_DSN to run."]
async fn announcements_filter_on_city_wide_rows() {
	let Some(base_dsn) = civic_testkit::env_dsn() else {
		eprintln!("Skipping announcements_filter_on_city_wide_rows; set CIVIC_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = connect(&test_db).await;
	let vector = unit([0.0, 0.0, 1.0, 0.0]);
	let mut expected = Vec::new();

	for ward in [Some(5), Some(6), None] {
		let row = db
			.insert_announcement(
				&NewAnnouncement { ward, title: "Notice".to_string(), body: "Body".to_string() },
				Some(&vector),
			)
			.await
			.expect("Insert failed.");

		if ward != Some(6) {
			expected.push(row.id);
		}
	}

	let filter = FilterExpr::eq(Field::Ward, 5_i32).or(FilterExpr::is_null(Field::Ward));
	let mut found: Vec<i64> = db
		.nearest(NearestQuery {
			collection: Collection::Announcements,
			vector: &vector,
			filter: &filter,
			limit: 10,
		})
		.await
		.expect("Nearest failed.")
		.into_iter()
		.map(|c| c.id)
		.collect();

	found.sort_unstable();

	assert_eq!(found, expected);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CIVIC_PG_DSN to run."]
async fn embeddings_status_and_backfill_queue_round_trip() {
	let Some(base_dsn) = civic_testkit::env_dsn() else {
		eprintln!(
			"Skipping embeddings_status_and_backfill_queue_round_trip; set CIVIC_PG_DSN to run."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = connect(&test_db).await;
	let row = db.insert_complaint(&complaint(3, 2, "drain"), None).await.expect("Insert failed.");
	let reference = RecordRef { collection: Collection::Complaints, id: row.id };

	assert_eq!(row.status, "pending");
	assert_eq!(db.embedding(reference).await.expect("Lookup failed."), None);

	let pending = db.missing_embeddings(Collection::Complaints, 10).await.expect("Query failed.");

	assert_eq!(pending.iter().map(Record::id).collect::<Vec<_>>(), vec![row.id]);

	let vector = unit([0.0, 0.0, 0.0, 2.0]);

	db.upsert_embedding(reference, &vector).await.expect("Upsert failed.");

	assert_eq!(db.embedding(reference).await.expect("Lookup failed."), Some(vector.into_inner()));
	assert!(
		db.missing_embeddings(Collection::Complaints, 10).await.expect("Query failed.").is_empty()
	);

	let updated = db
		.set_complaint_status(row.id, ComplaintStatus::Resolved)
		.await
		.expect("Status update failed.");

	assert_eq!(updated.status, "resolved");
	assert!(matches!(
		db.set_complaint_status(row.id + 1_000, ComplaintStatus::Resolved).await,
		Err(Error::NotFound(_))
	));
	assert!(matches!(
		db.embedding(RecordRef { collection: Collection::Reports, id: 1 }).await,
		Err(Error::NotFound(_))
	));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CIVIC_PG_DSN to run."]
async fn failed_embeddings_leave_the_queue_until_their_retry() {
	let Some(base_dsn) = civic_testkit::env_dsn() else {
		eprintln!(
			"Skipping failed_embeddings_leave_the_queue_until_their_retry; set CIVIC_PG_DSN to run."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = connect(&test_db).await;
	let failed = db.insert_complaint(&complaint(3, 2, "drain"), None).await.expect("Insert failed.");
	let healthy =
		db.insert_complaint(&complaint(3, 2, "light"), None).await.expect("Insert failed.");

	db.mark_embedding_failed(RecordRef { collection: Collection::Complaints, id: failed.id })
		.await
		.expect("Marking failure failed.");

	let pending = db.missing_embeddings(Collection::Complaints, 10).await.expect("Query failed.");

	assert_eq!(pending.iter().map(Record::id).collect::<Vec<_>>(), vec![healthy.id]);

	let attempts: i32 =
		sqlx::query_scalar("SELECT embedding_attempts FROM complaints WHERE id = $1")
			.bind(failed.id)
			.fetch_one(&db.pool)
			.await
			.expect("Failed to read attempts.");

	assert_eq!(attempts, 1);

	tokio::time::sleep(std::time::Duration::from_millis(700)).await;

	let pending = db.missing_embeddings(Collection::Complaints, 10).await.expect("Query failed.");

	assert_eq!(pending.len(), 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
