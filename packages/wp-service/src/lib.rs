pub mod context;
pub mod index_writer;
pub mod orchestrator;
pub mod pg;
pub mod refresh;
pub mod retrieval;
pub mod session;
pub mod store;
pub mod stream;
pub mod tools;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc};

use wp_config::{ChatBackendConfig, Config, EmbeddingProviderConfig, ProviderConfig};
use wp_providers::{
	chat::{self, ChatRequest, ChatStream},
	embedding,
	places::{self, Directions, PlaceDetails, PlaceSummary},
};

use crate::{
	context::ContextAssembler,
	index_writer::IndexWriter,
	orchestrator::Orchestrator,
	refresh::RefreshQueue,
	retrieval::HybridRetriever,
	session::{SessionCoordinator, UsageLedger},
	store::{EmbeddingIndex, Entitlements, WorkspaceStore},
	tools::ToolGateway,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, wp_providers::Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn stream_chat<'a>(
		&'a self,
		cfg: &'a ChatBackendConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, wp_providers::Result<ChatStream>>;
}

pub trait PlacesProvider
where
	Self: Send + Sync,
{
	fn search_places<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		near: Option<&'a str>,
	) -> BoxFuture<'a, wp_providers::Result<Vec<PlaceSummary>>>;

	fn place_details<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		place_id: &'a str,
	) -> BoxFuture<'a, wp_providers::Result<PlaceDetails>>;

	fn directions<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		origin: &'a str,
		destination: &'a str,
		mode: &'a str,
	) -> BoxFuture<'a, wp_providers::Result<Directions>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
	pub places: Arc<dyn PlacesProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		chat: Arc<dyn ChatProvider>,
		places: Arc<dyn PlacesProvider>,
	) -> Self {
		Self { embedding, chat, places }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), chat: provider.clone(), places: provider }
	}
}

/// The external collaborators the core reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
	pub store: Arc<dyn WorkspaceStore>,
	pub entitlements: Arc<dyn Entitlements>,
	pub index: Arc<dyn EmbeddingIndex>,
	pub ledger: Arc<dyn UsageLedger>,
	pub queue: Arc<dyn RefreshQueue>,
}

/// Fully wired request path plus the index writer the refresh worker drives.
pub struct Assistant {
	pub session: Arc<SessionCoordinator>,
	pub writer: Arc<IndexWriter>,
	pub queue: Arc<dyn RefreshQueue>,
}
impl Assistant {
	pub fn new(cfg: &Config, collaborators: Collaborators, providers: Providers) -> Self {
		let Collaborators { store, entitlements, index, ledger, queue } = collaborators;
		let writer = Arc::new(IndexWriter::new(
			cfg.providers.embedding.clone(),
			cfg.indexing.batch_size,
			store.clone(),
			index.clone(),
			providers.embedding.clone(),
		));
		let retriever = Arc::new(HybridRetriever::new(
			cfg.retrieval.clone(),
			cfg.providers.embedding.clone(),
			providers.embedding.clone(),
			index,
		));
		let assembler = Arc::new(ContextAssembler::new(cfg.context.clone(), store.clone()));
		let gateway = Arc::new(ToolGateway::new(
			cfg.tools.clone(),
			cfg.providers.places.clone(),
			store.clone(),
			providers.places.clone(),
			Some(queue.clone()),
		));
		let orchestrator = Arc::new(Orchestrator::new(
			cfg.orchestrator.clone(),
			cfg.context.max_chars,
			cfg.providers.chat.clone(),
			providers.chat.clone(),
			gateway,
		));
		let session = Arc::new(SessionCoordinator::new(
			cfg.session.clone(),
			store,
			entitlements,
			ledger,
			retriever,
			assembler,
			orchestrator,
		));

		Self { session, writer, queue }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, wp_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl ChatProvider for DefaultProviders {
	fn stream_chat<'a>(
		&'a self,
		cfg: &'a ChatBackendConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, wp_providers::Result<ChatStream>> {
		Box::pin(chat::stream_chat(cfg, request))
	}
}
impl PlacesProvider for DefaultProviders {
	fn search_places<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		near: Option<&'a str>,
	) -> BoxFuture<'a, wp_providers::Result<Vec<PlaceSummary>>> {
		Box::pin(places::search_places(cfg, query, near))
	}

	fn place_details<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		place_id: &'a str,
	) -> BoxFuture<'a, wp_providers::Result<PlaceDetails>> {
		Box::pin(places::place_details(cfg, place_id))
	}

	fn directions<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		origin: &'a str,
		destination: &'a str,
		mode: &'a str,
	) -> BoxFuture<'a, wp_providers::Result<Directions>> {
		Box::pin(places::directions(cfg, origin, destination, mode))
	}
}
