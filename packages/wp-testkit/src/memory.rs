//! In-memory collaborators with switchable failure and latency per data category.
//!
//! Category labels match the ones the context assembler reports as omitted: `trip`, `members`,
//! `chat`, `calendar`, `tasks`, `polls`, `payments`, `places`, `links`, `preferences`. The store
//! also understands `membership`, `sources` and `writes`.

use std::{
	cmp::Reverse,
	collections::{BTreeMap, HashMap, HashSet},
	sync::{
		Mutex,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use time::OffsetDateTime;

use wp_domain::{
	EmbeddingRecord, SourceSelector, SourceType, UserId, WorkspaceId,
	workspace::{
		CalendarEvent, ChatMessage, CreatedItem, Member, NewCalendarEvent, NewPayment, NewPoll,
		NewTask, PaymentSummary, Place, Poll, PollOption, SavedLink, SourceItem, TaskItem,
		UserPreferences, WorkspaceMeta,
	},
};
use wp_service::{
	BoxFuture, Error, Result,
	session::{SessionTurn, UsageLedger},
	store::{EmbeddingIndex, Entitlements, SearchHit, WorkspaceStore},
};

/// Everything the store knows about one workspace.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceData {
	pub meta: Option<WorkspaceMeta>,
	pub members: Vec<Member>,
	pub messages: Vec<ChatMessage>,
	pub events: Vec<CalendarEvent>,
	pub tasks: Vec<TaskItem>,
	pub polls: Vec<Poll>,
	pub payments: Vec<PaymentSummary>,
	pub places: Vec<Place>,
	pub links: Vec<SavedLink>,
}

#[derive(Default)]
struct StoreState {
	workspaces: BTreeMap<WorkspaceId, WorkspaceData>,
	preferences: HashMap<UserId, UserPreferences>,
	failing: HashSet<&'static str>,
	delays: HashMap<&'static str, Duration>,
	writes: Vec<(WorkspaceId, CreatedItem)>,
	next_id: u64,
}

#[derive(Default)]
pub struct MemoryWorkspaceStore {
	state: Mutex<StoreState>,
	leak_foreign_rows: AtomicBool,
}
impl MemoryWorkspaceStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put(&self, workspace_id: WorkspaceId, data: WorkspaceData) {
		self.lock().workspaces.insert(workspace_id, data);
	}

	pub fn edit(&self, workspace_id: &WorkspaceId, f: impl FnOnce(&mut WorkspaceData)) {
		let mut state = self.lock();

		f(state.workspaces.entry(workspace_id.clone()).or_default());
	}

	pub fn data(&self, workspace_id: &WorkspaceId) -> WorkspaceData {
		self.lock().workspaces.get(workspace_id).cloned().unwrap_or_default()
	}

	pub fn set_preferences(&self, user_id: UserId, preferences: UserPreferences) {
		self.lock().preferences.insert(user_id, preferences);
	}

	/// Makes every read of `category` fail with a storage error.
	pub fn fail(&self, category: &'static str) {
		self.lock().failing.insert(category);
	}

	pub fn heal(&self, category: &'static str) {
		self.lock().failing.remove(category);
	}

	/// Delays every read of `category`.
	pub fn delay(&self, category: &'static str, delay: Duration) {
		self.lock().delays.insert(category, delay);
	}

	/// Simulates a store that forgets its workspace filter on list reads.
	pub fn leak_foreign_rows(&self) {
		self.leak_foreign_rows.store(true, Ordering::SeqCst);
	}

	/// Rows created through the write methods, in order.
	pub fn writes(&self) -> Vec<(WorkspaceId, CreatedItem)> {
		self.lock().writes.clone()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	async fn gate(&self, category: &'static str) -> Result<()> {
		let (failing, delay) = {
			let state = self.lock();

			(state.failing.contains(category), state.delays.get(category).copied())
		};

		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if failing {
			return Err(Error::Storage { message: format!("{category} read failed.") });
		}

		Ok(())
	}

	/// Rows of the workspace, or of every workspace when the store leaks.
	fn rows<T: Clone>(
		&self,
		workspace_id: &WorkspaceId,
		pick: impl Fn(&WorkspaceData) -> &Vec<T>,
	) -> Vec<T> {
		let state = self.lock();

		if self.leak_foreign_rows.load(Ordering::SeqCst) {
			return state.workspaces.values().flat_map(|data| pick(data).clone()).collect();
		}

		state.workspaces.get(workspace_id).map(|data| pick(data).clone()).unwrap_or_default()
	}

	fn write(
		&self,
		workspace_id: &WorkspaceId,
		source_type: SourceType,
		insert: impl FnOnce(&mut WorkspaceData, String, OffsetDateTime),
	) -> CreatedItem {
		let mut state = self.lock();

		state.next_id += 1;

		let source_id = format!("{}-{}", source_type.as_str(), state.next_id);
		let created = CreatedItem { source_type, source_id: source_id.clone() };

		insert(
			state.workspaces.entry(workspace_id.clone()).or_default(),
			source_id,
			OffsetDateTime::now_utc(),
		);
		state.writes.push((workspace_id.clone(), created.clone()));

		created
	}
}

fn take<T>(mut rows: Vec<T>, limit: u32) -> Vec<T> {
	rows.truncate(limit as usize);

	rows
}

fn by_id<T>(rows: Vec<T>, selector: &SourceSelector, id_of: impl Fn(&T) -> &str) -> Vec<T> {
	match selector {
		SourceSelector::All => rows,
		SourceSelector::One(id) => rows.into_iter().filter(|row| id_of(row) == id).collect(),
	}
}

fn sources<'a, T: 'a>(rows: &'a [T]) -> Vec<SourceItem>
where
	SourceItem: From<&'a T>,
{
	rows.iter().map(SourceItem::from).collect()
}

impl WorkspaceStore for MemoryWorkspaceStore {
	fn is_member<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		user_id: &'a UserId,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			self.gate("membership").await?;

			let state = self.lock();

			Ok(state
				.workspaces
				.get(workspace_id)
				.map(|data| data.members.iter().any(|member| &member.user_id == user_id))
				.unwrap_or(false))
		})
	}

	fn workspace_meta<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
	) -> BoxFuture<'a, Result<Option<WorkspaceMeta>>> {
		Box::pin(async move {
			self.gate("trip").await?;

			Ok(self.lock().workspaces.get(workspace_id).and_then(|data| data.meta.clone()))
		})
	}

	fn roster<'a>(&'a self, workspace_id: &'a WorkspaceId) -> BoxFuture<'a, Result<Vec<Member>>> {
		Box::pin(async move {
			self.gate("members").await?;

			let state = self.lock();

			Ok(state
				.workspaces
				.get(workspace_id)
				.map(|data| data.members.clone())
				.unwrap_or_default())
		})
	}

	fn recent_messages<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		since: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
		Box::pin(async move {
			self.gate("chat").await?;

			let mut rows = self.rows(workspace_id, |data| &data.messages);

			rows.retain(|row| row.sent_at >= since);
			rows.sort_by_key(|row| Reverse(row.sent_at));

			Ok(take(rows, limit))
		})
	}

	fn upcoming_events<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		now: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<CalendarEvent>>> {
		Box::pin(async move {
			self.gate("calendar").await?;

			let mut rows = self.rows(workspace_id, |data| &data.events);

			rows.retain(|row| row.end_time.unwrap_or(row.start_time) >= now);
			rows.sort_by_key(|row| row.start_time);

			Ok(take(rows, limit))
		})
	}

	fn open_tasks<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<TaskItem>>> {
		Box::pin(async move {
			self.gate("tasks").await?;

			let mut rows = self.rows(workspace_id, |data| &data.tasks);

			rows.retain(|row| !row.completed);
			rows.sort_by_key(|row| (row.due_date.is_none(), row.due_date));

			Ok(take(rows, limit))
		})
	}

	fn active_polls<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Poll>>> {
		Box::pin(async move {
			self.gate("polls").await?;

			let mut rows = self.rows(workspace_id, |data| &data.polls);

			rows.retain(|row| !row.closed);
			rows.sort_by_key(|row| Reverse(row.updated_at));

			Ok(take(rows, limit))
		})
	}

	fn recent_payments<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PaymentSummary>>> {
		Box::pin(async move {
			self.gate("payments").await?;

			let mut rows = self.rows(workspace_id, |data| &data.payments);

			rows.sort_by_key(|row| Reverse(row.updated_at));

			Ok(take(rows, limit))
		})
	}

	fn places<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Place>>> {
		Box::pin(async move {
			self.gate("places").await?;

			let mut rows = self.rows(workspace_id, |data| &data.places);

			rows.sort_by_key(|row| Reverse(row.updated_at));

			Ok(take(rows, limit))
		})
	}

	fn links<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SavedLink>>> {
		Box::pin(async move {
			self.gate("links").await?;

			let mut rows = self.rows(workspace_id, |data| &data.links);

			rows.sort_by_key(|row| Reverse(row.updated_at));

			Ok(take(rows, limit))
		})
	}

	fn preferences<'a>(
		&'a self,
		user_id: &'a UserId,
	) -> BoxFuture<'a, Result<Option<UserPreferences>>> {
		Box::pin(async move {
			self.gate("preferences").await?;

			Ok(self.lock().preferences.get(user_id).cloned())
		})
	}

	fn source_items<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
		selector: &'a SourceSelector,
	) -> BoxFuture<'a, Result<Vec<SourceItem>>> {
		Box::pin(async move {
			self.gate("sources").await?;

			let items = match source_type {
				SourceType::Message => sources(&by_id(
					self.rows(workspace_id, |data| &data.messages),
					selector,
					|row| row.message_id.as_str(),
				)),
				SourceType::Event => sources(&by_id(
					self.rows(workspace_id, |data| &data.events),
					selector,
					|row| row.event_id.as_str(),
				)),
				SourceType::Task => sources(&by_id(
					self.rows(workspace_id, |data| &data.tasks),
					selector,
					|row| row.task_id.as_str(),
				)),
				SourceType::Poll => sources(&by_id(
					self.rows(workspace_id, |data| &data.polls),
					selector,
					|row| row.poll_id.as_str(),
				)),
				SourceType::Payment => sources(&by_id(
					self.rows(workspace_id, |data| &data.payments),
					selector,
					|row| row.payment_id.as_str(),
				)),
				SourceType::Place => sources(&by_id(
					self.rows(workspace_id, |data| &data.places),
					selector,
					|row| row.place_id.as_str(),
				)),
				SourceType::Link => sources(&by_id(
					self.rows(workspace_id, |data| &data.links),
					selector,
					|row| row.link_id.as_str(),
				)),
			};

			Ok(items)
		})
	}

	fn add_calendar_event<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		_created_by: &'a UserId,
		event: &'a NewCalendarEvent,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			self.gate("writes").await?;

			Ok(self.write(workspace_id, SourceType::Event, |data, event_id, now| {
				data.events.push(CalendarEvent {
					workspace_id: workspace_id.clone(),
					event_id,
					title: event.title.clone(),
					start_time: event.start_time,
					end_time: event.end_time,
					location: event.location.clone(),
					updated_at: now,
				});
			}))
		})
	}

	fn create_task<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		_created_by: &'a UserId,
		task: &'a NewTask,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			self.gate("writes").await?;

			Ok(self.write(workspace_id, SourceType::Task, |data, task_id, now| {
				data.tasks.push(TaskItem {
					workspace_id: workspace_id.clone(),
					task_id,
					title: task.title.clone(),
					description: task.description.clone(),
					due_date: task.due_date,
					completed: false,
					assignee: None,
					updated_at: now,
				});
			}))
		})
	}

	fn create_poll<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		_created_by: &'a UserId,
		poll: &'a NewPoll,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			self.gate("writes").await?;

			Ok(self.write(workspace_id, SourceType::Poll, |data, poll_id, now| {
				data.polls.push(Poll {
					workspace_id: workspace_id.clone(),
					poll_id,
					question: poll.question.clone(),
					options: poll
						.options
						.iter()
						.map(|label| PollOption { label: label.clone(), votes: 0 })
						.collect(),
					closed: false,
					updated_at: now,
				});
			}))
		})
	}

	fn record_payment<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		paid_by: &'a UserId,
		payment: &'a NewPayment,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			self.gate("writes").await?;

			let payer = self
				.data(workspace_id)
				.members
				.into_iter()
				.find(|member| &member.user_id == paid_by)
				.map(|member| member.display_name)
				.unwrap_or_else(|| paid_by.to_string());

			Ok(self.write(workspace_id, SourceType::Payment, |data, payment_id, now| {
				data.payments.push(PaymentSummary {
					workspace_id: workspace_id.clone(),
					payment_id,
					description: payment.description.clone(),
					amount_cents: payment.amount_cents,
					currency: payment.currency.clone(),
					paid_by: payer,
					split_count: payment.split_with.len() as u32,
					settled: false,
					updated_at: now,
				});
			}))
		})
	}
}

/// Fixed entitlement answers, optionally failing.
#[derive(Debug)]
pub struct StaticEntitlements {
	pub assistant_enabled: bool,
	pub preferences_entitled: bool,
	pub fail: bool,
}
impl StaticEntitlements {
	pub fn allow_all() -> Self {
		Self { assistant_enabled: true, preferences_entitled: true, fail: false }
	}
}
impl Default for StaticEntitlements {
	fn default() -> Self {
		Self::allow_all()
	}
}
impl Entitlements for StaticEntitlements {
	fn assistant_enabled<'a>(
		&'a self,
		_workspace_id: &'a WorkspaceId,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			if self.fail {
				return Err(Error::Storage { message: "Entitlement lookup failed.".to_string() });
			}

			Ok(self.assistant_enabled)
		})
	}

	fn preferences_entitled<'a>(&'a self, _user_id: &'a UserId) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			if self.fail {
				return Err(Error::Storage { message: "Entitlement lookup failed.".to_string() });
			}

			Ok(self.preferences_entitled)
		})
	}
}

type RecordKey = (WorkspaceId, SourceType, String);

#[derive(Default)]
struct IndexState {
	records: BTreeMap<RecordKey, EmbeddingRecord>,
	failing_upserts: HashSet<String>,
	vector_fails: bool,
	keyword_fails: bool,
	search_delay: Option<Duration>,
}

/// Cosine vector search and term-count keyword search over records held in memory.
#[derive(Default)]
pub struct MemoryEmbeddingIndex {
	state: Mutex<IndexState>,
	leak_foreign_hits: AtomicBool,
}
impl MemoryEmbeddingIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn records(&self, workspace_id: &WorkspaceId) -> Vec<EmbeddingRecord> {
		self.lock()
			.records
			.values()
			.filter(|record| &record.workspace_id == workspace_id)
			.cloned()
			.collect()
	}

	pub fn get(
		&self,
		workspace_id: &WorkspaceId,
		source_type: SourceType,
		source_id: &str,
	) -> Option<EmbeddingRecord> {
		self.lock()
			.records
			.get(&(workspace_id.clone(), source_type, source_id.to_string()))
			.cloned()
	}

	pub fn insert(&self, record: EmbeddingRecord) {
		let key = (record.workspace_id.clone(), record.source_type, record.source_id.clone());

		self.lock().records.insert(key, record);
	}

	pub fn len(&self) -> usize {
		self.lock().records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Upserts of this source id fail with a storage error.
	pub fn fail_upsert_of(&self, source_id: &str) {
		self.lock().failing_upserts.insert(source_id.to_string());
	}

	pub fn fail_vector_search(&self) {
		self.lock().vector_fails = true;
	}

	pub fn fail_keyword_search(&self) {
		self.lock().keyword_fails = true;
	}

	pub fn delay_searches(&self, delay: Duration) {
		self.lock().search_delay = Some(delay);
	}

	/// Simulates an index that returns matches from every workspace.
	pub fn leak_foreign_hits(&self) {
		self.leak_foreign_hits.store(true, Ordering::SeqCst);
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, IndexState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn scoped(&self, workspace_id: &WorkspaceId) -> Vec<EmbeddingRecord> {
		let leak = self.leak_foreign_hits.load(Ordering::SeqCst);

		self.lock()
			.records
			.values()
			.filter(|record| leak || &record.workspace_id == workspace_id)
			.cloned()
			.collect()
	}

	async fn search_gate(&self, vector: bool) -> Result<()> {
		let (delay, fails) = {
			let state = self.lock();

			(state.search_delay, if vector { state.vector_fails } else { state.keyword_fails })
		};

		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if fails {
			return Err(Error::Storage { message: "Index search failed.".to_string() });
		}

		Ok(())
	}
}

fn hit(record: &EmbeddingRecord, score: f32) -> SearchHit {
	SearchHit {
		workspace_id: record.workspace_id.clone(),
		source_type: record.source_type,
		source_id: record.source_id.clone(),
		content_text: record.content_text.clone(),
		score,
		source_updated_at: record.source_updated_at,
	}
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() {
		return 0.0;
	}

	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}

fn ranked(mut hits: Vec<SearchHit>, limit: u32) -> Vec<SearchHit> {
	hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.source_id.cmp(&b.source_id)));
	hits.truncate(limit as usize);

	hits
}

impl EmbeddingIndex for MemoryEmbeddingIndex {
	fn upsert<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut state = self.lock();

			if state.failing_upserts.contains(&record.source_id) {
				return Err(Error::Storage { message: "Upsert failed.".to_string() });
			}

			let key = (record.workspace_id.clone(), record.source_type, record.source_id.clone());

			if let Some(existing) = state.records.get(&key)
				&& existing.source_updated_at > record.source_updated_at
			{
				return Ok(false);
			}

			state.records.insert(key, record.clone());

			Ok(true)
		})
	}

	fn delete<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let key = (workspace_id.clone(), source_type, source_id.to_string());

			Ok(self.lock().records.remove(&key).is_some())
		})
	}

	fn indexed_versions<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
	) -> BoxFuture<'a, Result<Vec<(String, OffsetDateTime)>>> {
		Box::pin(async move {
			Ok(self
				.lock()
				.records
				.values()
				.filter(|record| {
					&record.workspace_id == workspace_id && record.source_type == source_type
				})
				.map(|record| (record.source_id.clone(), record.source_updated_at))
				.collect())
		})
	}

	fn vector_search<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		query_vec: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move {
			self.search_gate(true).await?;

			let hits = self
				.scoped(workspace_id)
				.iter()
				.map(|record| hit(record, cosine(&record.vector, query_vec)))
				.collect();

			Ok(ranked(hits, limit))
		})
	}

	fn keyword_search<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		terms: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move {
			self.search_gate(false).await?;

			let hits = self
				.scoped(workspace_id)
				.iter()
				.filter_map(|record| {
					let text = record.content_text.to_lowercase();
					let matched = terms.iter().filter(|term| text.contains(term.as_str())).count();

					(matched > 0).then(|| hit(record, matched as f32 / terms.len().max(1) as f32))
				})
				.collect();

			Ok(ranked(hits, limit))
		})
	}
}

#[derive(Default)]
pub struct MemoryUsageLedger {
	turns: Mutex<Vec<SessionTurn>>,
	fail_writes: AtomicBool,
}
impl MemoryUsageLedger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn turns(&self) -> Vec<SessionTurn> {
		self.turns.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	/// Seeds `count` turns for `user_id` at `at`, as if earlier requests had been served.
	pub fn seed(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		count: usize,
		at: OffsetDateTime,
	) {
		let mut turns = self.turns.lock().unwrap_or_else(|err| err.into_inner());

		for _ in 0..count {
			turns.push(SessionTurn {
				workspace_id: workspace_id.clone(),
				user_id: user_id.clone(),
				outcome_code: "ok".to_string(),
				user_message: String::new(),
				answer: String::new(),
				tool_names: Vec::new(),
				latency_ms: 0,
				created_at: at,
			});
		}
	}

	pub fn fail_writes(&self) {
		self.fail_writes.store(true, Ordering::SeqCst);
	}
}
impl UsageLedger for MemoryUsageLedger {
	fn count_since<'a>(
		&'a self,
		user_id: &'a UserId,
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let turns = self.turns.lock().unwrap_or_else(|err| err.into_inner());
			let count = turns
				.iter()
				.filter(|turn| &turn.user_id == user_id && turn.created_at >= since)
				.count();

			Ok(count as u64)
		})
	}

	fn record<'a>(&'a self, turn: &'a SessionTurn) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.fail_writes.load(Ordering::SeqCst) {
				return Err(Error::Storage { message: "Usage write failed.".to_string() });
			}

			self.turns.lock().unwrap_or_else(|err| err.into_inner()).push(turn.clone());

			Ok(())
		})
	}
}
