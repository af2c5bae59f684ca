//! Session Coordinator: the per-request entry point.

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, Time};
use tokio_util::sync::CancellationToken;

use wp_config::Session;
use wp_domain::{ContextSnapshot, ErrorCode, RetrievalCandidate, UserId, WorkspaceId, redact, text};

use crate::{
	BoxFuture, Error, Result,
	context::ContextAssembler,
	orchestrator::{ConverseOutcome, ConverseRequest, HistoryTurn, Orchestrator},
	retrieval::HybridRetriever,
	store::{Entitlements, WorkspaceStore},
	stream::{ResponseEvent, ResponseSink},
	tools::Confirmation,
};

const RATE_WINDOW: Duration = Duration::from_secs(60);
const SUMMARY_CHARS: usize = 1_000;

/// Usage accounting for one request/response cycle. Text fields are redacted before storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTurn {
	pub workspace_id: WorkspaceId,
	pub user_id: UserId,
	/// `ok` or the wire error code.
	pub outcome_code: String,
	pub user_message: String,
	pub answer: String,
	pub tool_names: Vec<String>,
	pub latency_ms: i64,
	pub created_at: OffsetDateTime,
}

pub trait UsageLedger
where
	Self: Send + Sync,
{
	fn count_since<'a>(
		&'a self,
		user_id: &'a UserId,
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>>;

	fn record<'a>(&'a self, turn: &'a SessionTurn) -> BoxFuture<'a, Result<()>>;
}

/// Sliding one-minute request window per user, kept in process.
#[derive(Debug)]
pub struct RateLimiter {
	limit: usize,
	window: Duration,
	hits: Mutex<HashMap<UserId, VecDeque<Instant>>>,
}
impl RateLimiter {
	/// A limit of zero disables the check.
	pub fn new(limit: u32) -> Self {
		Self { limit: limit as usize, window: RATE_WINDOW, hits: Mutex::new(HashMap::new()) }
	}

	/// Records the attempt and returns whether it is within the limit.
	pub fn check(&self, user_id: &UserId, now: Instant) -> bool {
		if self.limit == 0 {
			return true;
		}

		let mut hits = self.hits.lock().unwrap_or_else(|err| err.into_inner());

		// Users whose window drained are dropped.
		hits.retain(|_, window| {
			while window.front().is_some_and(|at| now.duration_since(*at) >= self.window) {
				window.pop_front();
			}

			!window.is_empty()
		});

		let window = hits.entry(user_id.clone()).or_default();

		if window.len() >= self.limit {
			return false;
		}

		window.push_back(now);

		true
	}
}

/// Inbound chat request. The acting user is passed separately from the verified session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatTurnRequest {
	pub workspace_id: String,
	pub message: String,
	#[serde(default)]
	pub history: Vec<HistoryTurn>,
	#[serde(default)]
	pub confirmation: Option<Confirmation>,
}

/// Non-streaming response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
	pub response: String,
	pub success: bool,
	pub retryable: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<ErrorCode>,
}

pub struct SessionCoordinator {
	cfg: Session,
	store: Arc<dyn WorkspaceStore>,
	entitlements: Arc<dyn Entitlements>,
	ledger: Arc<dyn UsageLedger>,
	retriever: Arc<HybridRetriever>,
	assembler: Arc<ContextAssembler>,
	orchestrator: Arc<Orchestrator>,
	limiter: RateLimiter,
}
impl SessionCoordinator {
	pub fn new(
		cfg: Session,
		store: Arc<dyn WorkspaceStore>,
		entitlements: Arc<dyn Entitlements>,
		ledger: Arc<dyn UsageLedger>,
		retriever: Arc<HybridRetriever>,
		assembler: Arc<ContextAssembler>,
		orchestrator: Arc<Orchestrator>,
	) -> Self {
		let limiter = RateLimiter::new(cfg.per_minute_limit);

		Self { cfg, store, entitlements, ledger, retriever, assembler, orchestrator, limiter }
	}

	/// Runs one turn and always finishes the stream with a `done` or `error` event.
	///
	/// Turns that got as far as the model are recorded in the usage ledger, successful or not.
	pub async fn handle(
		&self,
		user_id: &UserId,
		req: &ChatTurnRequest,
		sink: &ResponseSink,
		cancel: &CancellationToken,
	) -> Result<String> {
		let started = Instant::now();
		let mut reached_model = None;
		let result = self.run(user_id, req, sink, cancel, &mut reached_model).await;
		let result = result.map(|outcome| ConverseOutcome {
			final_text: text::truncate_chars(
				&outcome.final_text,
				self.cfg.max_response_chars as usize,
			),
			tool_names: outcome.tool_names,
		});
		let event = match &result {
			Ok(outcome) => ResponseEvent::Done { final_text: outcome.final_text.clone() },
			Err(err) => {
				tracing::warn!(
					user_id = %user_id,
					code = err.code().as_str(),
					error = %err.sanitized(),
					"Assistant turn failed."
				);

				ResponseEvent::Error {
					code: err.code(),
					message: err.code().user_message().to_string(),
				}
			},
		};

		sink.send(event).await;

		if let Some(workspace_id) = reached_model {
			self.record(workspace_id, user_id, req, &result, started).await;
		}

		result.map(|outcome| outcome.final_text)
	}

	/// Non-streaming variant returning the `{response, success, retryable}` envelope.
	pub async fn respond(
		&self,
		user_id: &UserId,
		req: &ChatTurnRequest,
		cancel: &CancellationToken,
	) -> ChatReply {
		match self.handle(user_id, req, &ResponseSink::discard(), cancel).await {
			Ok(response) => ChatReply { response, success: true, retryable: false, code: None },
			Err(err) => ChatReply {
				response: err.code().user_message().to_string(),
				success: false,
				retryable: err.retryable(),
				code: Some(err.code()),
			},
		}
	}

	async fn run(
		&self,
		user_id: &UserId,
		req: &ChatTurnRequest,
		sink: &ResponseSink,
		cancel: &CancellationToken,
		reached_model: &mut Option<WorkspaceId>,
	) -> Result<ConverseOutcome> {
		let (workspace_id, message) = self.validate(req)?;

		if !self.store.is_member(&workspace_id, user_id).await? {
			tracing::warn!(
				workspace_id = %workspace_id,
				user_id = %user_id,
				"Rejected request from a non-member."
			);

			return Err(Error::Forbidden {
				message: "User is not a member of the workspace.".to_string(),
			});
		}
		if !self.entitlements.assistant_enabled(&workspace_id).await? {
			return Err(Error::Auth {
				message: "The assistant is disabled for this workspace.".to_string(),
			});
		}

		self.check_quota(user_id).await?;

		if !self.limiter.check(user_id, Instant::now()) {
			return Err(Error::RateLimited {
				message: "Per-minute request limit reached.".to_string(),
			});
		}

		let preferences_entitled = match self.entitlements.preferences_entitled(user_id).await {
			Ok(entitled) => entitled,
			Err(err) => {
				tracing::warn!(
					user_id = %user_id,
					error = %err.sanitized(),
					"Preference entitlement check failed. Leaving preferences out."
				);

				false
			},
		};
		let (candidates, snapshot) = tokio::join!(
			self.retrieve(&workspace_id, &message),
			self.assemble(&workspace_id, user_id, preferences_entitled),
		);

		if cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}

		*reached_model = Some(workspace_id.clone());

		self.orchestrator
			.converse(
				ConverseRequest {
					workspace_id: &workspace_id,
					user_id,
					snapshot: &snapshot,
					candidates: &candidates,
					history: &req.history,
					message: &message,
					confirmation: req.confirmation.clone(),
				},
				sink,
				cancel,
			)
			.await
	}

	fn validate(&self, req: &ChatTurnRequest) -> Result<(WorkspaceId, String)> {
		let workspace_id = WorkspaceId::parse(&req.workspace_id).ok_or_else(|| Error::Validation {
			message: "workspace_id must not be empty.".to_string(),
		})?;
		let message = req.message.trim();

		if message.is_empty() {
			return Err(Error::Validation { message: "message must not be empty.".to_string() });
		}
		if text::char_len(message) > self.cfg.max_message_chars as usize {
			return Err(Error::Validation {
				message: format!(
					"message must be at most {} characters.",
					self.cfg.max_message_chars
				),
			});
		}

		Ok((workspace_id, message.to_string()))
	}

	async fn check_quota(&self, user_id: &UserId) -> Result<()> {
		if self.cfg.daily_quota == 0 {
			return Ok(());
		}

		let midnight = OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT);
		let used = self.ledger.count_since(user_id, midnight).await?;

		if used >= u64::from(self.cfg.daily_quota) {
			return Err(Error::QuotaExceeded {
				message: format!("Daily limit of {} requests reached.", self.cfg.daily_quota),
			});
		}

		Ok(())
	}

	async fn retrieve(&self, workspace_id: &WorkspaceId, message: &str) -> Vec<RetrievalCandidate> {
		let timeout = Duration::from_millis(self.cfg.retrieval_timeout_ms);

		match tokio::time::timeout(timeout, self.retriever.search(workspace_id, message)).await {
			Ok(Ok(candidates)) => candidates,
			Ok(Err(err)) => {
				tracing::warn!(
					workspace_id = %workspace_id,
					error = %err.sanitized(),
					"Retrieval failed. Continuing without snippets."
				);

				Vec::new()
			},
			Err(_) => {
				tracing::warn!(
					workspace_id = %workspace_id,
					"Retrieval timed out. Continuing without snippets."
				);

				Vec::new()
			},
		}
	}

	async fn assemble(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		preferences_entitled: bool,
	) -> ContextSnapshot {
		let timeout = Duration::from_millis(self.cfg.context_timeout_ms);

		match tokio::time::timeout(
			timeout,
			self.assembler.build(workspace_id, user_id, preferences_entitled),
		)
		.await
		{
			Ok(snapshot) => snapshot,
			Err(_) => {
				tracing::warn!(
					workspace_id = %workspace_id,
					"Context assembly timed out. Continuing without workspace context."
				);

				let mut snapshot = ContextSnapshot::empty(workspace_id.clone());

				snapshot.omitted.push("all");

				snapshot
			},
		}
	}

	async fn record(
		&self,
		workspace_id: WorkspaceId,
		user_id: &UserId,
		req: &ChatTurnRequest,
		result: &Result<ConverseOutcome>,
		started: Instant,
	) {
		let (outcome_code, answer, tool_names) = match result {
			Ok(outcome) =>
				("ok".to_string(), outcome.final_text.clone(), outcome.tool_names.clone()),
			Err(err) => (err.code().as_str().to_string(), String::new(), Vec::new()),
		};
		let turn = SessionTurn {
			workspace_id,
			user_id: user_id.clone(),
			outcome_code,
			user_message: summarize(&req.message),
			answer: summarize(&answer),
			tool_names,
			latency_ms: started.elapsed().as_millis().min(i64::MAX as u128) as i64,
			created_at: OffsetDateTime::now_utc(),
		};

		if let Err(err) = self.ledger.record(&turn).await {
			tracing::warn!(
				workspace_id = %turn.workspace_id,
				user_id = %user_id,
				error = %err.sanitized(),
				"Session turn could not be recorded."
			);
		}
	}
}

fn summarize(input: &str) -> String {
	text::truncate_chars(&redact::redact_text(input), SUMMARY_CHARS)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rate_limiter_slides() {
		let limiter = RateLimiter::new(2);
		let user = UserId::new("u1");
		let start = Instant::now();

		assert!(limiter.check(&user, start));
		assert!(limiter.check(&user, start + Duration::from_secs(1)));
		assert!(!limiter.check(&user, start + Duration::from_secs(2)));
		assert!(limiter.check(&user, start + Duration::from_secs(61)));
		assert!(limiter.check(&UserId::new("u2"), start));
	}

	#[test]
	fn idle_users_leave_the_rate_window() {
		let limiter = RateLimiter::new(5);
		let start = Instant::now();

		for n in 0..100 {
			assert!(limiter.check(&UserId::new(format!("u{n}")), start));
		}

		assert_eq!(limiter.hits.lock().expect("Rate window lock.").len(), 100);
		assert!(limiter.check(&UserId::new("u-late"), start + Duration::from_secs(61)));
		assert_eq!(limiter.hits.lock().expect("Rate window lock.").len(), 1);
	}

	#[test]
	fn summaries_are_redacted() {
		let out = summarize("Email me at ana@example.com");

		assert!(!out.contains("ana@example.com"));
	}

	#[test]
	fn request_rejects_unknown_fields() {
		let raw = serde_json::json!({
			"workspace_id": "trip-1",
			"message": "hi",
			"user_id": "attacker-id",
		});

		assert!(serde_json::from_value::<ChatTurnRequest>(raw).is_err());
	}
}
