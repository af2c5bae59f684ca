mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ChatBackendConfig, ChatProviders, Config, Context, EmbeddingProviderConfig, Indexing,
	Orchestrator, Postgres, ProviderConfig, Providers, Retrieval, Security, Service, Session,
	Storage, Tools,
};

use std::{fs, path::Path};

/// Room kept in `orchestrator.prompt_max_chars` for the assistant instructions and data fence.
pub const PROMPT_FRAME_CHARS: u32 = 2_000;

const KNOWN_TOOLS: [&str; 8] = [
	"add_calendar_event",
	"create_task",
	"create_poll",
	"get_payment_summary",
	"record_payment",
	"search_places",
	"get_place_details",
	"get_directions",
];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if !cfg.providers.chat.secondary.is_configured() {
		return Err(Error::Validation {
			message: "providers.chat.secondary must be fully configured.".to_string(),
		});
	}

	for (label, temperature) in [
		("providers.chat.primary.temperature", cfg.providers.chat.primary.temperature),
		("providers.chat.secondary.temperature", cfg.providers.chat.secondary.temperature),
	] {
		if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-2.0."),
			});
		}
	}

	validate_retrieval(&cfg.retrieval)?;
	validate_context(&cfg.context)?;
	validate_orchestrator(cfg)?;
	validate_session(&cfg.session)?;
	validate_indexing(&cfg.indexing)?;

	for tool in &cfg.tools.confirmation_required {
		if !KNOWN_TOOLS.contains(&tool.as_str()) {
			return Err(Error::Validation {
				message: format!("tools.confirmation_required names unknown tool {tool:?}."),
			});
		}
	}

	Ok(())
}

fn validate_retrieval(retrieval: &Retrieval) -> Result<()> {
	if retrieval.max_results == 0 {
		return Err(Error::Validation {
			message: "retrieval.max_results must be greater than zero.".to_string(),
		});
	}
	if !retrieval.min_score.is_finite() || !(0.0..=1.0).contains(&retrieval.min_score) {
		return Err(Error::Validation {
			message: "retrieval.min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !retrieval.agreement_bonus.is_finite() || retrieval.agreement_bonus < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.agreement_bonus must be zero or greater.".to_string(),
		});
	}
	if retrieval.snippet_chars == 0 {
		return Err(Error::Validation {
			message: "retrieval.snippet_chars must be greater than zero.".to_string(),
		});
	}
	if retrieval.keyword_terms == 0 {
		return Err(Error::Validation {
			message: "retrieval.keyword_terms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_context(context: &Context) -> Result<()> {
	if context.max_chars < 256 {
		return Err(Error::Validation {
			message: "context.max_chars must be at least 256.".to_string(),
		});
	}
	if context.extended_window_hours < context.message_window_hours {
		return Err(Error::Validation {
			message: "context.extended_window_hours must be at least context.message_window_hours."
				.to_string(),
		});
	}

	for (label, cap) in [
		("context.message_cap", context.message_cap),
		("context.event_cap", context.event_cap),
		("context.task_cap", context.task_cap),
		("context.poll_cap", context.poll_cap),
		("context.payment_cap", context.payment_cap),
		("context.place_cap", context.place_cap),
		("context.link_cap", context.link_cap),
	] {
		if cap == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn validate_orchestrator(cfg: &Config) -> Result<()> {
	let orchestrator = &cfg.orchestrator;

	if orchestrator.max_tool_turns == 0 || orchestrator.max_tool_turns > 8 {
		return Err(Error::Validation {
			message: "orchestrator.max_tool_turns must be in the range 1-8.".to_string(),
		});
	}
	if orchestrator.max_retries > 5 {
		return Err(Error::Validation {
			message: "orchestrator.max_retries must be 5 or less.".to_string(),
		});
	}
	if orchestrator.prompt_max_chars < cfg.context.max_chars {
		return Err(Error::Validation {
			message: "orchestrator.prompt_max_chars must be at least context.max_chars.".to_string(),
		});
	}
	if orchestrator.prompt_max_chars < PROMPT_FRAME_CHARS + cfg.session.max_message_chars {
		return Err(Error::Validation {
			message: format!(
				"orchestrator.prompt_max_chars must be at least session.max_message_chars plus \
				 {PROMPT_FRAME_CHARS}."
			),
		});
	}
	if orchestrator.generation_timeout_ms == 0 || orchestrator.idle_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "orchestrator timeouts must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_session(session: &Session) -> Result<()> {
	if session.daily_quota == 0 {
		return Err(Error::Validation {
			message: "session.daily_quota must be greater than zero.".to_string(),
		});
	}
	if session.max_message_chars == 0 || session.max_response_chars == 0 {
		return Err(Error::Validation {
			message: "session character limits must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_indexing(indexing: &Indexing) -> Result<()> {
	if indexing.batch_size == 0 || indexing.batch_size > 100 {
		return Err(Error::Validation {
			message: "indexing.batch_size must be in the range 1-100.".to_string(),
		});
	}
	if indexing.workers == 0 {
		return Err(Error::Validation {
			message: "indexing.workers must be greater than zero.".to_string(),
		});
	}
	if indexing.lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "indexing.lease_seconds must be greater than zero.".to_string(),
		});
	}
	if indexing.base_backoff_ms <= 0 || indexing.max_backoff_ms < indexing.base_backoff_ms {
		return Err(Error::Validation {
			message: "indexing backoff must be positive and max_backoff_ms at least base_backoff_ms."
				.to_string(),
		});
	}
	if indexing.max_attempts <= 0 {
		return Err(Error::Validation {
			message: "indexing.max_attempts must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.providers
		.chat
		.primary
		.api_key
		.as_deref()
		.map(|key| key.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.chat.primary.api_key = None;
	}
	if cfg
		.providers
		.chat
		.secondary
		.api_key
		.as_deref()
		.map(|key| key.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.chat.secondary.api_key = None;
	}
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}
}
