use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use civic_config::{EmbeddingBackend, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_with(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render sample config.")
}

fn section<'a>(root: &'a mut toml::Table, name: &str) -> &'a mut toml::Table {
	root.get_mut(name)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Sample config must include [{name}]."))
}

fn write_temp_config(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos =
		SystemTime::now().duration_since(UNIX_EPOCH).expect("System time is before epoch.").as_nanos();
	let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
	let path = env::temp_dir().join(format!("civic_config_test_{nanos}_{seq}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn expect_validation(payload: &str, needle: &str) {
	let err = civic_config::parse(payload).expect_err("Expected validation error.");

	match err {
		Error::Validation { message } => assert!(
			message.contains(needle),
			"Unexpected validation message: {message}"
		),
		other => panic!("Expected validation error, got {other:?}."),
	}
}

#[test]
fn sample_config_loads_from_disk() {
	let path = write_temp_config(SAMPLE_CONFIG_TOML);
	let cfg = civic_config::load(&path).expect("Sample config must load.");

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(cfg.embedding.backend, EmbeddingBackend::Local);
	assert_eq!(cfg.embedding.dimensions, 384);
	assert_eq!(cfg.storage.postgres.ef_search, 64);
	assert_eq!(cfg.related.shown, 3);
	assert_eq!(cfg.security.api_auth_token.as_deref(), Some("gateway-secret"));
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("civic_config_test_missing.toml");
	let err = civic_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { path: ref p, .. } if p == &path));
}

#[test]
fn local_backend_requires_384_dimensions() {
	let payload = sample_with(|root| {
		section(root, "embedding").insert("dimensions".to_string(), Value::Integer(768));
	});

	expect_validation(&payload, "embedding.dimensions must be 384");
}

#[test]
fn http_backend_requires_http_table() {
	let payload = sample_with(|root| {
		section(root, "embedding").insert("backend".to_string(), Value::String("http".to_string()));
	});

	expect_validation(&payload, "embedding.http is required");
}

#[test]
fn http_backend_accepts_any_dimension() {
	let payload = sample_with(|root| {
		let embedding = section(root, "embedding");
		let mut http = toml::Table::new();

		http.insert("api_base".to_string(), Value::String("http://127.0.0.1:9000".to_string()));
		http.insert("api_key".to_string(), Value::String("key".to_string()));
		http.insert("path".to_string(), Value::String("/v1/embeddings".to_string()));
		http.insert("timeout_ms".to_string(), Value::Integer(5_000));
		embedding.insert("backend".to_string(), Value::String("http".to_string()));
		embedding.insert("dimensions".to_string(), Value::Integer(1_024));
		embedding.insert("http".to_string(), Value::Table(http));
	});
	let cfg = civic_config::parse(&payload).expect("HTTP backend config must parse.");

	assert_eq!(cfg.embedding.backend, EmbeddingBackend::Http);
	assert_eq!(cfg.embedding.dimensions, 1_024);
}

#[test]
fn default_limit_must_not_exceed_ceiling() {
	let payload = sample_with(|root| {
		section(root, "search").insert("default_limit".to_string(), Value::Integer(80));
	});

	expect_validation(&payload, "search.default_limit must not exceed search.max_limit");
}

#[test]
fn max_limit_must_fit_hnsw_ef_search() {
	let payload = sample_with(|root| {
		section(root, "search").insert("max_limit".to_string(), Value::Integer(2_000));
	});

	expect_validation(&payload, "search.max_limit must not exceed 1000");
}

#[test]
fn ef_search_must_be_accepted_by_pgvector() {
	for ef_search in [0, 1_001] {
		let payload = sample_with(|root| {
			section(section(root, "storage"), "postgres")
				.insert("ef_search".to_string(), Value::Integer(ef_search));
		});

		expect_validation(&payload, "storage.postgres.ef_search must be in the range 1-1000");
	}
}

#[test]
fn largest_accepted_limits_load() {
	let payload = sample_with(|root| {
		section(root, "search").insert("max_limit".to_string(), Value::Integer(1_000));
		section(section(root, "storage"), "postgres")
			.insert("ef_search".to_string(), Value::Integer(1_000));
	});
	let cfg = civic_config::parse(&payload).expect("Limits at the ceiling must load.");

	assert_eq!(cfg.search.max_limit, civic_config::HNSW_EF_SEARCH_MAX);
}

#[test]
fn min_score_must_be_a_similarity() {
	let payload = sample_with(|root| {
		section(root, "search").insert("min_score".to_string(), Value::Float(1.5));
	});

	expect_validation(&payload, "search.min_score must be in the range");
}

#[test]
fn shown_must_fit_internal_cap() {
	let payload = sample_with(|root| {
		section(root, "related").insert("shown".to_string(), Value::Integer(6));
	});

	expect_validation(&payload, "related.shown must not exceed related.internal_cap");
}

#[test]
fn pending_is_never_public() {
	let payload = sample_with(|root| {
		section(root, "visibility").insert(
			"public_statuses".to_string(),
			Value::Array(vec![Value::String("resolved".to_string()), Value::String("pending".to_string())]),
		);
	});

	expect_validation(&payload, "must not include \"pending\"");
}

#[test]
fn unknown_status_is_rejected() {
	let payload = sample_with(|root| {
		section(root, "visibility").insert(
			"public_statuses".to_string(),
			Value::Array(vec![Value::String("archived".to_string())]),
		);
	});

	expect_validation(&payload, "unknown status");
}
