//! Deterministic stand-ins for the embedding, chat and places providers.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use futures::{StreamExt, stream};

use wp_config::{ChatBackendConfig, EmbeddingProviderConfig, ProviderConfig};
use wp_domain::text;
use wp_providers::{
	Error as ProviderError, Result as ProviderResult,
	chat::{ChatDelta, ChatRequest, ChatStream, FinishReason, ToolCall},
	places::{Directions, PlaceDetails, PlaceSummary},
};
use wp_service::{BoxFuture, ChatProvider, EmbeddingProvider, PlacesProvider};

fn api_error(status: u16) -> ProviderError {
	ProviderError::Api { status, message: format!("Scripted failure with HTTP {status}.") }
}

/// Bag-of-words embedding: every term lands in a hashed bucket, then the vector is L2-normalized.
/// Texts sharing words get a positive cosine similarity.
pub struct HashEmbedding {
	pub dim: usize,
	/// Requests with more than one text fail, forcing callers onto their per-item path.
	pub reject_batches: bool,
	calls: AtomicUsize,
	texts: AtomicUsize,
}
impl HashEmbedding {
	pub fn new(dim: usize) -> Self {
		Self { dim, reject_batches: false, calls: AtomicUsize::new(0), texts: AtomicUsize::new(0) }
	}

	pub fn rejecting_batches(dim: usize) -> Self {
		Self { reject_batches: true, ..Self::new(dim) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Total texts embedded across successful calls.
	pub fn texts_embedded(&self) -> usize {
		self.texts.load(Ordering::SeqCst)
	}

	pub fn vector(&self, input: &str) -> Vec<f32> {
		let mut out = vec![0.0_f32; self.dim.max(1)];

		for term in text::keyword_terms(input, usize::MAX) {
			let hash = blake3::hash(term.as_bytes());
			let bytes = hash.as_bytes();
			let bucket = u64::from_le_bytes([
				bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
			]) as usize % out.len();

			out[bucket] += 1.0;
		}

		let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();

		if norm > 0.0 {
			out.iter_mut().for_each(|x| *x /= norm);
		}

		out
	}
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if self.reject_batches && texts.len() > 1 {
				return Err(api_error(413));
			}

			self.texts.fetch_add(texts.len(), Ordering::SeqCst);

			Ok(texts.iter().map(|text| self.vector(text)).collect())
		})
	}
}

pub struct FailingEmbedding {
	pub status: u16,
}
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		let status = self.status;

		Box::pin(async move { Err(api_error(status)) })
	}
}

pub struct SlowEmbedding {
	pub delay: Duration,
	pub inner: HashEmbedding,
}
impl EmbeddingProvider for SlowEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.embed(cfg, texts).await
		})
	}
}

/// One item a scripted stream produces.
#[derive(Debug, Clone)]
pub enum ChatStep {
	Text(String),
	ToolCall { id: String, name: String, arguments: String },
	Finish(FinishReason),
	/// The stream yields a provider error with this HTTP status.
	Fail(u16),
	/// The stream stops producing items without ending.
	Hang,
}

/// What one `stream_chat` call does.
#[derive(Debug, Clone)]
pub enum ChatScript {
	/// The call fails before any stream is opened.
	Reject(u16),
	Stream(Vec<ChatStep>),
}
impl ChatScript {
	pub fn text(answer: &str) -> Self {
		Self::Stream(vec![ChatStep::Text(answer.to_string()), ChatStep::Finish(FinishReason::Stop)])
	}

	/// Streams the answer in several token events.
	pub fn tokens(parts: &[&str]) -> Self {
		let mut steps =
			parts.iter().map(|part| ChatStep::Text(part.to_string())).collect::<Vec<_>>();

		steps.push(ChatStep::Finish(FinishReason::Stop));

		Self::Stream(steps)
	}

	pub fn tool_call(name: &str, arguments: serde_json::Value) -> Self {
		Self::Stream(vec![
			ChatStep::ToolCall {
				id: format!("call-{name}"),
				name: name.to_string(),
				arguments: arguments.to_string(),
			},
			ChatStep::Finish(FinishReason::ToolCalls),
		])
	}

	/// Streams `partial`, then fails mid-stream.
	pub fn partial_then_fail(partial: &str, status: u16) -> Self {
		Self::Stream(vec![ChatStep::Text(partial.to_string()), ChatStep::Fail(status)])
	}

	pub fn hang() -> Self {
		Self::Stream(vec![ChatStep::Hang])
	}
}

fn into_stream(steps: Vec<ChatStep>) -> ChatStream {
	let mut items: Vec<ProviderResult<ChatDelta>> = Vec::new();
	let mut hang = false;

	for step in steps {
		match step {
			ChatStep::Text(chunk) => items.push(Ok(ChatDelta::Text(chunk))),
			ChatStep::ToolCall { id, name, arguments } =>
				items.push(Ok(ChatDelta::ToolCall(ToolCall { id, name, arguments }))),
			ChatStep::Finish(reason) => items.push(Ok(ChatDelta::Finished(reason))),
			ChatStep::Fail(status) => items.push(Err(api_error(status))),
			ChatStep::Hang => {
				hang = true;

				break;
			},
		}
	}

	let head = stream::iter(items);

	if hang { head.chain(stream::pending()).boxed() } else { head.boxed() }
}

/// Chat provider that replays queued scripts per backend, keyed by `provider_id`, and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedChat {
	scripts: Mutex<HashMap<String, VecDeque<ChatScript>>>,
	requests: Mutex<Vec<(String, ChatRequest)>>,
}
impl ScriptedChat {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, backend: &str, script: ChatScript) {
		self.scripts
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.entry(backend.to_string())
			.or_default()
			.push_back(script);
	}

	pub fn with(self, backend: &str, script: ChatScript) -> Self {
		self.push(backend, script);

		self
	}

	pub fn requests(&self) -> Vec<(String, ChatRequest)> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn calls_to(&self, backend: &str) -> usize {
		self.requests
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.filter(|(name, _)| name == backend)
			.count()
	}
}
impl ChatProvider for ScriptedChat {
	fn stream_chat<'a>(
		&'a self,
		cfg: &'a ChatBackendConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, ProviderResult<ChatStream>> {
		Box::pin(async move {
			self.requests
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.push((cfg.provider_id.clone(), request.clone()));

			let script = self
				.scripts
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.get_mut(&cfg.provider_id)
				.and_then(VecDeque::pop_front);

			match script {
				Some(ChatScript::Reject(status)) => Err(api_error(status)),
				Some(ChatScript::Stream(steps)) => Ok(into_stream(steps)),
				None => Err(ProviderError::InvalidResponse {
					message: format!("No scripted reply left for {:?}.", cfg.provider_id),
				}),
			}
		})
	}
}

/// Places provider with canned answers.
#[derive(Default)]
pub struct StaticPlaces {
	pub results: Vec<PlaceSummary>,
	pub fail_status: Option<u16>,
	calls: AtomicUsize,
}
impl StaticPlaces {
	pub fn new(results: Vec<PlaceSummary>) -> Self {
		Self { results, ..Self::default() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn check(&self) -> ProviderResult<()> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		match self.fail_status {
			Some(status) => Err(api_error(status)),
			None => Ok(()),
		}
	}
}
impl PlacesProvider for StaticPlaces {
	fn search_places<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_near: Option<&'a str>,
	) -> BoxFuture<'a, ProviderResult<Vec<PlaceSummary>>> {
		Box::pin(async move {
			self.check()?;

			Ok(self.results.clone())
		})
	}

	fn place_details<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		place_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<PlaceDetails>> {
		Box::pin(async move {
			self.check()?;

			let summary = self.results.iter().find(|place| place.place_id == place_id);

			Ok(PlaceDetails {
				place_id: place_id.to_string(),
				name: summary.map(|place| place.name.clone()).unwrap_or_default(),
				address: summary.and_then(|place| place.address.clone()),
				phone: None,
				website: None,
				opening_hours: Vec::new(),
				rating: summary.and_then(|place| place.rating),
			})
		})
	}

	fn directions<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		origin: &'a str,
		destination: &'a str,
		_mode: &'a str,
	) -> BoxFuture<'a, ProviderResult<Directions>> {
		Box::pin(async move {
			self.check()?;

			Ok(Directions {
				summary: Some(format!("{origin} to {destination}")),
				distance_meters: 1_200,
				duration_seconds: 900,
				steps: vec![format!("Head toward {destination}.")],
			})
		})
	}
}
