use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub embedding: Embedding,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub related: Related,
	#[serde(default)]
	pub visibility: Visibility,
	#[serde(default)]
	pub security: Security,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Lower bound for `hnsw.ef_search` on nearest-neighbour queries. The effective value is
	/// raised to the requested limit when that is larger.
	#[serde(default = "default_ef_search")]
	pub ef_search: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
	Local,
	Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
	pub backend: EmbeddingBackend,
	pub model: String,
	pub dimensions: u32,
	/// Where the local backend keeps downloaded model files.
	pub cache_dir: Option<String>,
	#[serde(default = "default_embedding_batch_size")]
	pub batch_size: u32,
	pub http: Option<HttpEmbedding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpEmbedding {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
	/// Similarity floor in [-1, 1]. Candidates scoring below it are dropped by every consumer.
	pub min_score: Option<f32>,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 10, max_limit: 50, min_score: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Related {
	pub internal_cap: u32,
	pub shown: u32,
}
impl Default for Related {
	fn default() -> Self {
		Self { internal_cap: 5, shown: 3 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Visibility {
	/// Complaint statuses another citizen's record must carry to be visible to a citizen.
	pub public_statuses: Vec<String>,
}
impl Default for Visibility {
	fn default() -> Self {
		Self { public_statuses: vec!["resolved".to_string(), "in_progress".to_string()] }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Security {
	pub api_auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub poll_interval_ms: u64,
	pub batch_size: u32,
}
impl Default for Worker {
	fn default() -> Self {
		Self { poll_interval_ms: 5_000, batch_size: 64 }
	}
}

fn default_ef_search() -> u32 {
	40
}

fn default_embedding_batch_size() -> u32 {
	32
}
