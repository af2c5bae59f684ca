//! Seeded workspaces and a fully wired in-memory assistant.

use std::sync::Arc;

use serde_json::Map;
use time::{Duration, OffsetDateTime, macros::date};

use wp_config::{
	ChatBackendConfig, ChatProviders, Config, Context, EmbeddingProviderConfig, Indexing,
	Orchestrator, Postgres, ProviderConfig, Providers as ProviderConfigs, Retrieval, Security,
	Service, Session, Storage, Tools,
};
use wp_domain::{
	UserId, WorkspaceId,
	workspace::{
		CalendarEvent, ChatMessage, Member, PaymentSummary, Place, Poll, PollOption, PrivacyMode,
		SavedLink, TaskItem, UserPreferences, WorkspaceMeta,
	},
};
use wp_providers::places::PlaceSummary;
use wp_service::{Assistant, Collaborators, Providers, refresh::MemoryRefreshQueue};

use crate::{
	HashEmbedding, MemoryEmbeddingIndex, MemoryUsageLedger, MemoryWorkspaceStore, ScriptedChat,
	StaticEntitlements, StaticPlaces, WorkspaceData,
};

pub const TRIP: &str = "trip-lisbon";
pub const OTHER_TRIP: &str = "trip-oslo";
pub const ALICE: &str = "u-alice";
pub const BOB: &str = "u-bob";
pub const OUTSIDER: &str = "u-olga";
pub const EMBEDDING_DIM: usize = 64;

pub fn trip() -> WorkspaceId {
	WorkspaceId::new(TRIP)
}

pub fn other_trip() -> WorkspaceId {
	WorkspaceId::new(OTHER_TRIP)
}

pub fn user(id: &str) -> UserId {
	UserId::new(id)
}

fn chat_backend(provider_id: &str) -> ChatBackendConfig {
	ChatBackendConfig {
		provider_id: provider_id.to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: Some("test-key".to_string()),
		path: "/chat/completions".to_string(),
		model: format!("{provider_id}-model"),
		temperature: 0.2,
		max_tokens: 512,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

/// Valid configuration with fast timeouts. Chat backends are named `primary` and `secondary`.
pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres {
				dsn: crate::env_dsn()
					.unwrap_or_else(|| "postgres://postgres@127.0.0.1:5432/waypoint".to_string()),
				pool_max_conns: 2,
			},
		},
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "hash".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "hash".to_string(),
				dimensions: EMBEDDING_DIM as u32,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			chat: ChatProviders {
				primary: chat_backend("primary"),
				secondary: chat_backend("secondary"),
			},
			places: ProviderConfig {
				provider_id: "places".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		retrieval: Retrieval {
			min_score: 0.1,
			embed_timeout_ms: 500,
			search_timeout_ms: 500,
			..Retrieval::default()
		},
		context: Context { fetch_timeout_ms: 300, ..Context::default() },
		orchestrator: Orchestrator {
			retry_backoff_ms: 1,
			generation_timeout_ms: 3_000,
			idle_timeout_ms: 500,
			..Orchestrator::default()
		},
		session: Session {
			retrieval_timeout_ms: 1_000,
			context_timeout_ms: 1_000,
			..Session::default()
		},
		indexing: Indexing { base_backoff_ms: 10, max_backoff_ms: 100, ..Indexing::default() },
		tools: Tools::default(),
		security: Security { bind_localhost_only: true, api_auth_token: None },
	}
}

fn member(id: &str, name: &str) -> Member {
	Member { user_id: user(id), display_name: name.to_string(), role: None }
}

fn message(
	workspace_id: &WorkspaceId,
	id: &str,
	author: &str,
	content: &str,
	sent_at: OffsetDateTime,
) -> ChatMessage {
	ChatMessage {
		workspace_id: workspace_id.clone(),
		message_id: id.to_string(),
		author_name: author.to_string(),
		content: content.to_string(),
		sent_at,
		is_encrypted: false,
		privacy: PrivacyMode::Standard,
		updated_at: sent_at,
	}
}

/// The Lisbon trip Alice and Bob share.
pub fn lisbon_data(now: OffsetDateTime) -> WorkspaceData {
	let ws = trip();
	let mut private =
		message(&ws, "m-3", "Bob", "Apartment door code is 4411", now - Duration::hours(1));

	private.is_encrypted = true;

	WorkspaceData {
		meta: Some(WorkspaceMeta {
			workspace_id: ws.clone(),
			name: "Lisbon Getaway".to_string(),
			start_date: Some(date!(2026 - 11 - 02)),
			end_date: Some(date!(2026 - 11 - 08)),
			primary_location: Some("Lisbon, Portugal".to_string()),
			privacy_mode: PrivacyMode::Standard,
		}),
		members: vec![member(ALICE, "Alice"), member(BOB, "Bob")],
		messages: vec![
			message(
				&ws,
				"m-1",
				"Alice",
				"Dinner at Cervejaria Ramiro at 8pm",
				now - Duration::hours(3),
			),
			message(&ws, "m-2", "Bob", "I land at 14:10, terminal 1", now - Duration::hours(2)),
			private,
		],
		events: vec![CalendarEvent {
			workspace_id: ws.clone(),
			event_id: "e-1".to_string(),
			title: "Tram 28 tour".to_string(),
			start_time: now + Duration::days(1),
			end_time: Some(now + Duration::days(1) + Duration::hours(2)),
			location: Some("Martim Moniz".to_string()),
			updated_at: now - Duration::days(2),
		}],
		tasks: vec![TaskItem {
			workspace_id: ws.clone(),
			task_id: "t-1".to_string(),
			title: "Book airport transfer".to_string(),
			description: None,
			due_date: Some(now + Duration::days(3)),
			completed: false,
			assignee: Some("Alice".to_string()),
			updated_at: now - Duration::days(1),
		}],
		polls: vec![Poll {
			workspace_id: ws.clone(),
			poll_id: "p-1".to_string(),
			question: "Which beach day?".to_string(),
			options: vec![
				PollOption { label: "Cascais".to_string(), votes: 2 },
				PollOption { label: "Costa da Caparica".to_string(), votes: 1 },
			],
			closed: false,
			updated_at: now - Duration::days(1),
		}],
		payments: vec![PaymentSummary {
			workspace_id: ws.clone(),
			payment_id: "pay-1".to_string(),
			description: "Apartment deposit".to_string(),
			amount_cents: 42_000,
			currency: "EUR".to_string(),
			paid_by: "Alice".to_string(),
			split_count: 2,
			settled: false,
			updated_at: now - Duration::days(4),
		}],
		places: vec![Place {
			workspace_id: ws.clone(),
			place_id: "pl-1".to_string(),
			name: "Time Out Market".to_string(),
			address: Some("Av. 24 de Julho 49".to_string()),
			category: Some("food hall".to_string()),
			notes: None,
			updated_at: now - Duration::days(5),
		}],
		links: vec![SavedLink {
			workspace_id: ws,
			link_id: "l-1".to_string(),
			title: "Lisbon metro map".to_string(),
			url: "https://example.com/metro".to_string(),
			description: None,
			updated_at: now - Duration::days(6),
		}],
	}
}

/// A trip none of the Lisbon members belong to.
pub fn oslo_data(now: OffsetDateTime) -> WorkspaceData {
	let ws = other_trip();

	WorkspaceData {
		meta: Some(WorkspaceMeta {
			workspace_id: ws.clone(),
			name: "Oslo Winter".to_string(),
			start_date: None,
			end_date: None,
			primary_location: Some("Oslo".to_string()),
			privacy_mode: PrivacyMode::Standard,
		}),
		members: vec![member(OUTSIDER, "Olga")],
		messages: vec![message(
			&ws,
			"m-oslo-1",
			"Olga",
			"Secret dinner plan: sauna at Kok then dinner",
			now - Duration::hours(1),
		)],
		places: vec![Place {
			workspace_id: ws,
			place_id: "pl-oslo-1".to_string(),
			name: "Kok Oslo sauna".to_string(),
			address: None,
			category: None,
			notes: None,
			updated_at: now - Duration::days(1),
		}],
		..WorkspaceData::default()
	}
}

/// Store holding both seeded trips. Alice has preferences on file.
pub fn seeded_store() -> MemoryWorkspaceStore {
	let now = OffsetDateTime::now_utc();
	let store = MemoryWorkspaceStore::new();

	store.put(trip(), lisbon_data(now));
	store.put(other_trip(), oslo_data(now));
	store.set_preferences(
		user(ALICE),
		UserPreferences {
			dietary: vec!["vegetarian".to_string()],
			interests: vec!["museums".to_string()],
			..UserPreferences::default()
		},
	);

	store
}

/// In-memory collaborators and scripted providers wired into a real `Assistant`.
pub struct TestAssistant {
	pub cfg: Config,
	pub assistant: Assistant,
	pub store: Arc<MemoryWorkspaceStore>,
	pub index: Arc<MemoryEmbeddingIndex>,
	pub ledger: Arc<MemoryUsageLedger>,
	pub queue: Arc<MemoryRefreshQueue>,
	pub chat: Arc<ScriptedChat>,
	pub embedding: Arc<HashEmbedding>,
	pub places: Arc<StaticPlaces>,
}
impl TestAssistant {
	pub fn new(cfg: Config) -> Self {
		Self::with_entitlements(cfg, StaticEntitlements::allow_all())
	}

	pub fn with_entitlements(cfg: Config, entitlements: StaticEntitlements) -> Self {
		let store = Arc::new(seeded_store());
		let index = Arc::new(MemoryEmbeddingIndex::new());
		let ledger = Arc::new(MemoryUsageLedger::new());
		let queue = Arc::new(MemoryRefreshQueue::default());
		let chat = Arc::new(ScriptedChat::new());
		let embedding = Arc::new(HashEmbedding::new(EMBEDDING_DIM));
		let places = Arc::new(StaticPlaces::new(vec![PlaceSummary {
			place_id: "gp-1".to_string(),
			name: "Pasteis de Belem".to_string(),
			address: Some("R. de Belem 84".to_string()),
			category: Some("bakery".to_string()),
			rating: Some(4.7),
		}]));
		let collaborators = Collaborators {
			store: store.clone(),
			entitlements: Arc::new(entitlements),
			index: index.clone(),
			ledger: ledger.clone(),
			queue: queue.clone(),
		};
		let providers = Providers::new(embedding.clone(), chat.clone(), places.clone());
		let assistant = Assistant::new(&cfg, collaborators, providers);

		Self { cfg, assistant, store, index, ledger, queue, chat, embedding, places }
	}

	/// Indexes every source row of both seeded trips.
	pub async fn index_all(&self) -> wp_service::Result<()> {
		for workspace_id in [trip(), other_trip()] {
			self.assistant
				.writer
				.refresh(&workspace_id, None, &wp_domain::SourceSelector::All)
				.await?;
		}

		Ok(())
	}
}
