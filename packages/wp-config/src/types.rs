use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub orchestrator: Orchestrator,
	#[serde(default)]
	pub session: Session,
	#[serde(default)]
	pub indexing: Indexing,
	#[serde(default)]
	pub tools: Tools,
	pub security: Security,
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
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub chat: ChatProviders,
	pub places: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatProviders {
	pub primary: ChatBackendConfig,
	pub secondary: ChatBackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatBackendConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Optional. A missing key marks the backend as unconfigured, which routes requests to the
	/// next backend.
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	/// Connect timeout. Generation time is bounded by `orchestrator.generation_timeout_ms`.
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl ChatBackendConfig {
	pub fn is_configured(&self) -> bool {
		self.api_key.as_deref().map(|key| !key.trim().is_empty()).unwrap_or(false)
			&& !self.api_base.trim().is_empty()
			&& !self.model.trim().is_empty()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub max_results: u32,
	pub min_score: f32,
	pub snippet_chars: u32,
	pub keyword_terms: u32,
	/// Added to the higher of the two normalized scores when both signals agree.
	pub agreement_bonus: f32,
	pub embed_timeout_ms: u64,
	pub search_timeout_ms: u64,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			max_results: 15,
			min_score: 0.6,
			snippet_chars: 300,
			keyword_terms: 5,
			agreement_bonus: 0.1,
			embed_timeout_ms: 3_000,
			search_timeout_ms: 3_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Context {
	pub max_chars: u32,
	pub message_cap: u32,
	pub message_window_hours: u32,
	pub extended_window_hours: u32,
	pub message_chars: u32,
	pub event_cap: u32,
	pub task_cap: u32,
	pub poll_cap: u32,
	pub payment_cap: u32,
	pub place_cap: u32,
	pub link_cap: u32,
	pub fetch_timeout_ms: u64,
}
impl Default for Context {
	fn default() -> Self {
		Self {
			max_chars: 12_000,
			message_cap: 50,
			message_window_hours: 48,
			extended_window_hours: 24 * 14,
			message_chars: 280,
			event_cap: 10,
			task_cap: 20,
			poll_cap: 10,
			payment_cap: 10,
			place_cap: 20,
			link_cap: 10,
			fetch_timeout_ms: 2_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Orchestrator {
	pub history_turns: u32,
	pub prompt_max_chars: u32,
	pub max_tool_turns: u32,
	pub max_retries: u32,
	pub retry_backoff_ms: u64,
	pub generation_timeout_ms: u64,
	pub idle_timeout_ms: u64,
}
impl Default for Orchestrator {
	fn default() -> Self {
		Self {
			history_turns: 10,
			prompt_max_chars: 24_000,
			max_tool_turns: 3,
			max_retries: 2,
			retry_backoff_ms: 250,
			generation_timeout_ms: 45_000,
			idle_timeout_ms: 15_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Session {
	pub daily_quota: u32,
	pub per_minute_limit: u32,
	pub max_message_chars: u32,
	pub max_response_chars: u32,
	pub retrieval_timeout_ms: u64,
	pub context_timeout_ms: u64,
}
impl Default for Session {
	fn default() -> Self {
		Self {
			daily_quota: 200,
			per_minute_limit: 20,
			max_message_chars: 4_000,
			max_response_chars: 8_000,
			retrieval_timeout_ms: 5_000,
			context_timeout_ms: 5_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Indexing {
	pub batch_size: u32,
	pub workers: u32,
	pub poll_interval_ms: u64,
	pub lease_seconds: i64,
	pub base_backoff_ms: i64,
	pub max_backoff_ms: i64,
	pub max_attempts: i32,
}
impl Default for Indexing {
	fn default() -> Self {
		Self {
			batch_size: 100,
			workers: 4,
			poll_interval_ms: 500,
			lease_seconds: 30,
			base_backoff_ms: 500,
			max_backoff_ms: 30_000,
			max_attempts: 8,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tools {
	/// Extra tool names that require an explicit confirmation grant from the client.
	/// `record_payment` always requires one.
	pub confirmation_required: Vec<String>,
}
impl Default for Tools {
	fn default() -> Self {
		Self { confirmation_required: vec!["record_payment".to_string()] }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// Shared secret expected from the upstream gateway that verified the user session.
	pub api_auth_token: Option<String>,
}
