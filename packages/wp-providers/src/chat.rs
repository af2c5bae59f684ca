//! Streaming chat completions against OpenAI-compatible backends.
//!
//! Responses are read as server-sent events and decoded into [`ChatDelta`] values. Tool-call
//! fragments are accumulated per index and emitted whole once the backend reports a finish
//! reason, so callers never see half-built arguments.

use std::{
	collections::{BTreeMap, VecDeque},
	time::Duration,
};

use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

pub type ChatStream = BoxStream<'static, Result<ChatDelta>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
	pub tool_calls: Vec<ToolCall>,
	pub tool_call_id: Option<String>,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self::plain(Role::System, content)
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::plain(Role::User, content)
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self::plain(Role::Assistant, content)
	}

	pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
		Self { role: Role::Assistant, content: content.into(), tool_calls, tool_call_id: None }
	}

	pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
		Self {
			role: Role::Tool,
			content: content.into(),
			tool_calls: Vec::new(),
			tool_call_id: Some(tool_call_id.into()),
		}
	}

	fn plain(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
	}

	fn to_wire(&self) -> Value {
		match self.role {
			Role::Tool => serde_json::json!({
				"role": "tool",
				"tool_call_id": self.tool_call_id.as_deref().unwrap_or_default(),
				"content": self.content,
			}),
			Role::Assistant if !self.tool_calls.is_empty() => {
				let calls = self
					.tool_calls
					.iter()
					.map(|call| {
						serde_json::json!({
							"id": call.id,
							"type": "function",
							"function": { "name": call.name, "arguments": call.arguments },
						})
					})
					.collect::<Vec<_>>();
				let content = if self.content.is_empty() {
					Value::Null
				} else {
					Value::String(self.content.clone())
				};

				serde_json::json!({ "role": "assistant", "content": content, "tool_calls": calls })
			},
			role => serde_json::json!({ "role": role, "content": self.content }),
		}
	}
}

/// A complete tool call. `arguments` is the raw JSON text the model produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
	pub id: String,
	pub name: String,
	pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
	pub name: String,
	pub description: String,
	/// JSON Schema of the arguments object.
	pub parameters: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
	pub messages: Vec<ChatMessage>,
	pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatDelta {
	Text(String),
	ToolCall(ToolCall),
	Finished(FinishReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
	Stop,
	ToolCalls,
	Length,
	Other,
}
impl FinishReason {
	fn parse(raw: &str) -> Self {
		match raw {
			"stop" => Self::Stop,
			"tool_calls" | "function_call" => Self::ToolCalls,
			"length" => Self::Length,
			_ => Self::Other,
		}
	}
}

/// Opens a streaming completion. HTTP-level failures surface here; failures after the first
/// byte surface as an `Err` item on the stream.
pub async fn stream_chat(
	cfg: &wp_config::ChatBackendConfig,
	request: &ChatRequest,
) -> Result<ChatStream> {
	if !cfg.is_configured() {
		return Err(Error::InvalidConfig {
			message: format!("Chat backend {:?} is not configured.", cfg.provider_id),
		});
	}

	let client = Client::builder().connect_timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let api_key = cfg.api_key.as_deref().unwrap_or_default();
	let res = client
		.post(url)
		.headers(crate::auth_headers(api_key, &cfg.default_headers)?)
		.json(&build_request_body(cfg, request))
		.send()
		.await?;
	let res = crate::check_status(res).await?;
	let bytes = res.bytes_stream().map(|chunk| chunk.map_err(Error::from)).boxed();

	Ok(decode_stream(bytes))
}

pub fn build_request_body(cfg: &wp_config::ChatBackendConfig, request: &ChatRequest) -> Value {
	let messages = request.messages.iter().map(ChatMessage::to_wire).collect::<Vec<_>>();
	let mut body = serde_json::json!({
		"model": cfg.model,
		"messages": messages,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"stream": true,
	});

	if !request.tools.is_empty() {
		let tools = request
			.tools
			.iter()
			.map(|tool| {
				serde_json::json!({
					"type": "function",
					"function": {
						"name": tool.name,
						"description": tool.description,
						"parameters": tool.parameters,
					},
				})
			})
			.collect::<Vec<_>>();

		body["tools"] = Value::Array(tools);
		body["tool_choice"] = Value::String("auto".to_string());
	}

	body
}

/// Decodes an SSE byte stream into chat deltas.
pub fn decode_stream(bytes: BoxStream<'static, Result<Bytes>>) -> ChatStream {
	let state = DecodeState {
		bytes,
		decoder: SseDecoder::default(),
		assembler: DeltaAssembler::default(),
		pending: VecDeque::new(),
		done: false,
	};

	futures::stream::unfold(state, |mut state| async move {
		loop {
			if let Some(delta) = state.pending.pop_front() {
				return Some((Ok(delta), state));
			}
			if state.done {
				return None;
			}

			match state.bytes.next().await {
				Some(Ok(chunk)) => {
					for data in state.decoder.push(&chunk) {
						match state.assembler.apply(&data) {
							Ok(deltas) => state.pending.extend(deltas),
							Err(err) => {
								state.done = true;

								return Some((Err(err), state));
							},
						}

						if state.assembler.finished {
							state.done = true;

							break;
						}
					}
				},
				Some(Err(err)) => {
					state.done = true;

					return Some((Err(err), state));
				},
				None => {
					state.done = true;

					match state.assembler.finish() {
						Ok(deltas) => state.pending.extend(deltas),
						Err(err) => return Some((Err(err), state)),
					}
				},
			}
		}
	})
	.boxed()
}

struct DecodeState {
	bytes: BoxStream<'static, Result<Bytes>>,
	decoder: SseDecoder,
	assembler: DeltaAssembler,
	pending: VecDeque<ChatDelta>,
	done: bool,
}

/// Splits a byte stream into SSE events and returns each event's `data` payload.
#[derive(Debug, Default)]
struct SseDecoder {
	buffer: Vec<u8>,
}
impl SseDecoder {
	fn push(&mut self, chunk: &[u8]) -> Vec<String> {
		self.buffer.extend_from_slice(chunk);

		let mut out = Vec::new();

		while let Some((end, delimiter_len)) = find_event_end(&self.buffer) {
			let raw: Vec<u8> = self.buffer.drain(..end + delimiter_len).collect();
			let text = String::from_utf8_lossy(&raw[..end]);

			if let Some(data) = parse_sse_data(&text) {
				out.push(data);
			}
		}

		out
	}
}

fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
	let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2));
	let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| (pos, 4));

	match (lf, crlf) {
		(Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
		(a, b) => a.or(b),
	}
}

fn parse_sse_data(raw: &str) -> Option<String> {
	let mut lines = Vec::new();

	for line in raw.lines() {
		if let Some(value) = line.strip_prefix("data:") {
			lines.push(value.strip_prefix(' ').unwrap_or(value));
		}
	}

	if lines.is_empty() {
		return None;
	}

	Some(lines.join("\n"))
}

#[derive(Debug, Default)]
struct DeltaAssembler {
	tool_calls: BTreeMap<u64, PartialToolCall>,
	finished: bool,
}
impl DeltaAssembler {
	fn apply(&mut self, data: &str) -> Result<Vec<ChatDelta>> {
		let mut out = Vec::new();

		if data.trim() == "[DONE]" {
			let had_tool_calls = !self.tool_calls.is_empty();

			out.extend(self.flush_tool_calls());

			if !self.finished {
				self.finished = true;

				out.push(ChatDelta::Finished(if had_tool_calls {
					FinishReason::ToolCalls
				} else {
					FinishReason::Stop
				}));
			}

			return Ok(out);
		}

		let chunk: StreamChunk = serde_json::from_str(data)?;

		if let Some(error) = chunk.error {
			return Err(stream_error(&error));
		}

		let Some(choice) = chunk.choices.into_iter().next() else {
			return Ok(out);
		};

		if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
			out.push(ChatDelta::Text(text));
		}

		for fragment in choice.delta.tool_calls {
			let partial = self.tool_calls.entry(fragment.index).or_default();

			if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
				partial.id = id;
			}
			if let Some(function) = fragment.function {
				if let Some(name) = function.name.filter(|name| !name.is_empty()) {
					partial.name = name;
				}
				if let Some(arguments) = function.arguments {
					partial.arguments.push_str(&arguments);
				}
			}
		}

		if let Some(reason) = choice.finish_reason {
			out.extend(self.flush_tool_calls());
			out.push(ChatDelta::Finished(FinishReason::parse(&reason)));

			self.finished = true;
		}

		Ok(out)
	}

	/// Called when the byte stream ends. A stream that never reported completion was cut off.
	fn finish(&mut self) -> Result<Vec<ChatDelta>> {
		if self.finished {
			return Ok(Vec::new());
		}

		Err(Error::InvalidResponse {
			message: "Chat stream ended before the backend reported completion.".to_string(),
		})
	}

	fn flush_tool_calls(&mut self) -> Vec<ChatDelta> {
		std::mem::take(&mut self.tool_calls)
			.into_iter()
			.filter(|(_, partial)| !partial.name.is_empty())
			.map(|(index, partial)| {
				let id = if partial.id.is_empty() { format!("call_{index}") } else { partial.id };
				let arguments = if partial.arguments.trim().is_empty() {
					"{}".to_string()
				} else {
					partial.arguments
				};

				ChatDelta::ToolCall(ToolCall { id, name: partial.name, arguments })
			})
			.collect()
	}
}

#[derive(Debug, Default)]
struct PartialToolCall {
	id: String,
	name: String,
	arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
	#[serde(default)]
	choices: Vec<StreamChoice>,
	#[serde(default)]
	error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
	#[serde(default)]
	delta: StreamDelta,
	#[serde(default)]
	finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
	#[serde(default)]
	content: Option<String>,
	#[serde(default)]
	tool_calls: Vec<ToolCallFragment>,
}

#[derive(Debug, Deserialize)]
struct ToolCallFragment {
	#[serde(default)]
	index: u64,
	#[serde(default)]
	id: Option<String>,
	#[serde(default)]
	function: Option<FunctionFragment>,
}

#[derive(Debug, Deserialize)]
struct FunctionFragment {
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	arguments: Option<String>,
}

fn stream_error(error: &Value) -> Error {
	let status = error
		.get("code")
		.and_then(|code| code.as_u64().or_else(|| code.as_str().and_then(|s| s.parse().ok())))
		.and_then(|code| u16::try_from(code).ok())
		.unwrap_or(502);
	let message = error
		.get("message")
		.and_then(Value::as_str)
		.unwrap_or("Chat stream reported an error.")
		.to_string();

	Error::Api { status, message }
}
