use std::{
	convert::Infallible,
	pin::Pin,
	task::{Context, Poll},
};

use axum::{
	Json, Router,
	body::Body,
	extract::State,
	http::{HeaderMap, Request, StatusCode},
	middleware::{self, Next},
	response::{
		IntoResponse, Response,
		sse::{Event, KeepAlive, Sse},
	},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::{CancellationToken, DropGuard};

use wp_domain::{ErrorCode, RefreshJob, SourceSelector, SourceType, UserId, WorkspaceId};
use wp_service::{
	orchestrator::HistoryTurn, refresh, session::ChatTurnRequest, stream::ResponseSink,
	tools::Confirmation,
};

use crate::state::AppState;

/// Set by the upstream gateway after it verified the user's session.
pub const HEADER_VERIFIED_USER: &str = "x-verified-user-id";

const HEADER_AUTHORIZATION: &str = "authorization";
const STREAM_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatBody {
	workspace_id: String,
	message: String,
	#[serde(default, alias = "chat_history")]
	history: Vec<HistoryTurn>,
	#[serde(default)]
	confirmation: Option<Confirmation>,
	#[serde(default)]
	stream: bool,
}
impl ChatBody {
	fn into_parts(self) -> (ChatTurnRequest, bool) {
		let Self { workspace_id, message, history, confirmation, stream } = self;

		(ChatTurnRequest { workspace_id, message, history, confirmation }, stream)
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifyBody {
	workspace_id: String,
	/// A source type name, or `all`.
	source_type: String,
	#[serde(default)]
	source_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}

	fn unauthorized(message: &str) -> Self {
		Self::new(StatusCode::UNAUTHORIZED, ErrorCode::AuthError.as_str(), message, None)
	}

	fn invalid(message: &str, field: &str) -> Self {
		Self::new(
			StatusCode::UNPROCESSABLE_ENTITY,
			ErrorCode::ConfigError.as_str(),
			message,
			Some(vec![field.to_string()]),
		)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

/// Event stream that cancels its turn once the client stops reading.
struct CancelOnDrop<S> {
	inner: S,
	_guard: DropGuard,
}
impl<S> Stream for CancelOnDrop<S>
where
	S: Stream + Unpin,
{
	type Item = S::Item;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		Pin::new(&mut self.inner).poll_next(cx)
	}
}

pub fn router(state: AppState) -> Router {
	let api = Router::new()
		.route("/v1/assistant/chat", post(chat))
		.route("/v1/index/notify", post(notify))
		.route_layer(middleware::from_fn_with_state(state.clone(), require_gateway_token));

	Router::new().route("/health", get(health)).merge(api).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
	let user_id = verified_user(&headers)?;
	let (req, stream) = body.into_parts();
	let cancel = CancellationToken::new();

	if !stream {
		let _guard = cancel.clone().drop_guard();
		let reply = state.session.respond(&user_id, &req, &cancel).await;

		return Ok(Json(reply).into_response());
	}

	let (sink, rx) = ResponseSink::channel(STREAM_BUFFER);
	let guard = cancel.clone().drop_guard();
	let session = state.session.clone();

	tokio::spawn(async move {
		// The outcome reaches the client as the terminal event.
		let _ = session.handle(&user_id, &req, &sink, &cancel).await;
	});

	let events = ReceiverStream::new(rx).filter_map(|event| {
		serde_json::to_string(&event)
			.ok()
			.map(|data| Ok::<_, Infallible>(Event::default().data(data)))
	});

	Ok(Sse::new(CancelOnDrop { inner: events, _guard: guard })
		.keep_alive(KeepAlive::default())
		.into_response())
}

async fn notify(
	State(state): State<AppState>,
	Json(body): Json<NotifyBody>,
) -> Result<StatusCode, ApiError> {
	let workspace_id = WorkspaceId::parse(&body.workspace_id)
		.ok_or_else(|| ApiError::invalid("workspace_id must not be blank.", "$.workspace_id"))?;
	let source_type = match body.source_type.trim() {
		"all" => None,
		raw => Some(SourceType::parse(raw).ok_or_else(|| {
			ApiError::invalid("source_type is not a known source type.", "$.source_type")
		})?),
	};
	let selector = SourceSelector::from_optional(body.source_id.as_deref());

	if source_type.is_none() && matches!(selector, SourceSelector::One(_)) {
		return Err(ApiError::invalid(
			"source_id requires a concrete source_type.",
			"$.source_id",
		));
	}

	refresh::enqueue_detached(
		state.queue.clone(),
		RefreshJob::new(workspace_id, source_type, selector),
	);

	Ok(StatusCode::ACCEPTED)
}

async fn require_gateway_token(
	State(state): State<AppState>,
	req: Request<Body>,
	next: Next,
) -> Response {
	if let Some(expected) = state.api_auth_token.as_deref()
		&& read_bearer_token(req.headers()) != Some(expected)
	{
		tracing::warn!(path = %req.uri().path(), "Rejected request without a valid gateway token.");

		return ApiError::unauthorized("Gateway authentication required.").into_response();
	}

	next.run(req).await
}

fn verified_user(headers: &HeaderMap) -> Result<UserId, ApiError> {
	headers
		.get(HEADER_VERIFIED_USER)
		.and_then(|value| value.to_str().ok())
		.and_then(UserId::parse)
		.ok_or_else(|| ApiError::unauthorized("A verified user session is required."))
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}
