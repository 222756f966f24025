use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub claim: Claim,
	#[serde(default)]
	pub dispatch: Dispatch,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub summary: SummaryProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	#[serde(default = "default_api_base")]
	pub api_base: String,
	/// Required. There is no default credential.
	pub api_key: String,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	#[serde(default = "default_embedding_model")]
	pub model: String,
	#[serde(default = "default_dimensions")]
	pub dimensions: u32,
	/// Per-input token budget. Enforced with a character-length heuristic, not a tokenizer.
	#[serde(default = "default_max_input_tokens")]
	pub max_input_tokens: u32,
	#[serde(default = "default_embedding_timeout_ms")]
	pub timeout_ms: u64,
	/// USD per one million input tokens. Used for usage estimates only.
	#[serde(default = "default_cost_per_million_tokens")]
	pub cost_per_million_tokens: f64,
	#[serde(default = "default_embedding_version")]
	pub embedding_version: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SummaryProviderConfig {
	#[serde(default = "default_api_base")]
	pub api_base: String,
	pub api_key: String,
	#[serde(default = "default_summary_path")]
	pub path: String,
	#[serde(default = "default_summary_model")]
	pub model: String,
	/// Transcript budget per summary request. Longer threads keep their head.
	#[serde(default = "default_summary_max_input_tokens")]
	pub max_input_tokens: u32,
	#[serde(default = "default_temperature")]
	pub temperature: f32,
	#[serde(default = "default_max_output_tokens")]
	pub max_output_tokens: u32,
	#[serde(default = "default_summary_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Context {
	/// Minimum cosine similarity for a stored message to be attached as context.
	pub similarity_threshold: f32,
	/// Look-back window for neighbor candidates.
	pub time_window_hours: u32,
	pub neighbor_limit: u32,
	pub neighbor_timeout_ms: u64,
}
impl Default for Context {
	fn default() -> Self {
		Self {
			similarity_threshold: 0.7,
			time_window_hours: 168,
			neighbor_limit: 5,
			neighbor_timeout_ms: 5_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Claim {
	pub batch_size: u32,
	/// A claim older than this is treated as abandoned and may be claimed again.
	pub stale_after_seconds: u64,
	pub max_messages_per_run: u32,
}
impl Default for Claim {
	fn default() -> Self {
		Self { batch_size: 100, stale_after_seconds: 900, max_messages_per_run: 1_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Dispatch {
	pub queue_name: String,
	pub wire_batch_size: u32,
}
impl Default for Dispatch {
	fn default() -> Self {
		Self { queue_name: "message-embeddings".to_string(), wire_batch_size: 10 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub delivery_batch_size: u32,
	pub visibility_timeout_seconds: u64,
	pub max_receive_count: u32,
	pub poll_interval_ms: u64,
}
impl Default for Worker {
	fn default() -> Self {
		Self {
			delivery_batch_size: 10,
			visibility_timeout_seconds: 300,
			max_receive_count: 5,
			poll_interval_ms: 1_000,
		}
	}
}

fn default_pool_max_conns() -> u32 {
	10
}

fn default_api_base() -> String {
	"https://api.openai.com/v1".to_string()
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}

fn default_embedding_model() -> String {
	"text-embedding-3-small".to_string()
}

fn default_dimensions() -> u32 {
	1_536
}

fn default_max_input_tokens() -> u32 {
	8_191
}

fn default_embedding_timeout_ms() -> u64 {
	30_000
}

fn default_cost_per_million_tokens() -> f64 {
	0.02
}

fn default_embedding_version() -> String {
	"v1".to_string()
}

fn default_summary_path() -> String {
	"/chat/completions".to_string()
}

fn default_summary_model() -> String {
	"gpt-4o-mini".to_string()
}

fn default_summary_max_input_tokens() -> u32 {
	4_000
}

fn default_temperature() -> f32 {
	0.2
}

fn default_max_output_tokens() -> u32 {
	200
}

fn default_summary_timeout_ms() -> u64 {
	20_000
}
