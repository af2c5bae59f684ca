//! Postgres-backed implementations of the collaborator traits.

use std::{collections::BTreeSet, sync::Arc};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use wp_config::Indexing;
use wp_domain::{
	EmbeddingRecord, RefreshJob, SourceSelector, SourceType, UserId, WorkspaceId,
	workspace::{
		CalendarEvent, ChatMessage, CreatedItem, Member, NewCalendarEvent, NewPayment, NewPoll,
		NewTask, PaymentSummary, Place, Poll, SavedLink, SourceItem, TaskItem, UserPreferences,
		WorkspaceMeta,
	},
};
use wp_storage::{
	db::Db,
	embedding_records,
	models::{
		self, EventRow, LinkRow, MemberRow, MessageRow, PaymentRow, PlaceRow, PollRow,
		PreferencesRow, RefreshOutboxEntry, TaskRow, TripRow,
	},
	refresh_outbox,
	usage::{self, NewSessionTurn},
	workspace,
};

use crate::{
	BoxFuture, Collaborators, Error, Result,
	refresh::{ClaimedJob, RefreshQueue},
	session::{SessionTurn, UsageLedger},
	store::{EmbeddingIndex, Entitlements, SearchHit, WorkspaceStore},
};

impl Collaborators {
	/// Every collaborator served from one Postgres database.
	pub fn postgres(db: Db, indexing: &Indexing) -> Self {
		let store = Arc::new(PgStore::new(db.clone()));
		let lease = Duration::seconds(indexing.lease_seconds.max(1));
		let queue = Arc::new(PgRefreshQueue::new(db, lease));

		Self {
			store: store.clone(),
			entitlements: store.clone(),
			index: store.clone(),
			ledger: store,
			queue,
		}
	}
}

#[derive(Clone)]
pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	async fn items_of(
		&self,
		workspace_id: &WorkspaceId,
		source_type: SourceType,
		selector: &SourceSelector,
	) -> Result<Vec<SourceItem>> {
		let db = &self.db;
		let items = match (source_type, selector) {
			(SourceType::Message, SourceSelector::One(id)) => sources(
				workspace::message_by_id(db, workspace_id, id).await?,
				MessageRow::into_domain,
			),
			(SourceType::Message, SourceSelector::All) =>
				sources(workspace::all_messages(db, workspace_id).await?, MessageRow::into_domain),
			(SourceType::Event, SourceSelector::One(id)) =>
				sources(workspace::event_by_id(db, workspace_id, id).await?, EventRow::into_domain),
			(SourceType::Event, SourceSelector::All) =>
				sources(workspace::all_events(db, workspace_id).await?, EventRow::into_domain),
			(SourceType::Task, SourceSelector::One(id)) =>
				sources(workspace::task_by_id(db, workspace_id, id).await?, TaskRow::into_domain),
			(SourceType::Task, SourceSelector::All) =>
				sources(workspace::all_tasks(db, workspace_id).await?, TaskRow::into_domain),
			(SourceType::Poll, SourceSelector::One(id)) =>
				poll_sources(workspace::poll_by_id(db, workspace_id, id).await?)?,
			(SourceType::Poll, SourceSelector::All) =>
				poll_sources(workspace::all_polls(db, workspace_id).await?)?,
			(SourceType::Payment, SourceSelector::One(id)) => sources(
				workspace::payment_by_id(db, workspace_id, id).await?,
				PaymentRow::into_domain,
			),
			(SourceType::Payment, SourceSelector::All) =>
				sources(workspace::all_payments(db, workspace_id).await?, PaymentRow::into_domain),
			(SourceType::Place, SourceSelector::One(id)) =>
				sources(workspace::place_by_id(db, workspace_id, id).await?, PlaceRow::into_domain),
			(SourceType::Place, SourceSelector::All) =>
				sources(workspace::all_places(db, workspace_id).await?, PlaceRow::into_domain),
			(SourceType::Link, SourceSelector::One(id)) =>
				sources(workspace::link_by_id(db, workspace_id, id).await?, LinkRow::into_domain),
			(SourceType::Link, SourceSelector::All) =>
				sources(workspace::all_links(db, workspace_id).await?, LinkRow::into_domain),
		};

		Ok(items)
	}
}

fn sources<R, T>(rows: impl IntoIterator<Item = R>, into_domain: fn(R) -> T) -> Vec<SourceItem>
where
	for<'x> SourceItem: From<&'x T>,
{
	rows.into_iter().map(|row| SourceItem::from(&into_domain(row))).collect()
}

fn poll_sources(rows: impl IntoIterator<Item = PollRow>) -> Result<Vec<SourceItem>> {
	let mut items = Vec::new();

	for row in rows {
		items.push(SourceItem::from(&row.into_domain()?));
	}

	Ok(items)
}

fn created(source_type: SourceType, source_id: String) -> CreatedItem {
	CreatedItem { source_type, source_id }
}

impl WorkspaceStore for PgStore {
	fn is_member<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		user_id: &'a UserId,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(workspace::is_member(&self.db, workspace_id, user_id).await?) })
	}

	fn workspace_meta<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
	) -> BoxFuture<'a, Result<Option<WorkspaceMeta>>> {
		Box::pin(async move {
			Ok(workspace::trip(&self.db, workspace_id).await?.map(TripRow::into_domain))
		})
	}

	fn roster<'a>(&'a self, workspace_id: &'a WorkspaceId) -> BoxFuture<'a, Result<Vec<Member>>> {
		Box::pin(async move {
			let rows = workspace::roster(&self.db, workspace_id).await?;

			Ok(rows.into_iter().map(MemberRow::into_domain).collect())
		})
	}

	fn recent_messages<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		since: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
		Box::pin(async move {
			let rows = workspace::recent_messages(&self.db, workspace_id, since, limit).await?;

			Ok(rows.into_iter().map(MessageRow::into_domain).collect())
		})
	}

	fn upcoming_events<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		now: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<CalendarEvent>>> {
		Box::pin(async move {
			let rows = workspace::upcoming_events(&self.db, workspace_id, now, limit).await?;

			Ok(rows.into_iter().map(EventRow::into_domain).collect())
		})
	}

	fn open_tasks<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<TaskItem>>> {
		Box::pin(async move {
			let rows = workspace::open_tasks(&self.db, workspace_id, limit).await?;

			Ok(rows.into_iter().map(TaskRow::into_domain).collect())
		})
	}

	fn active_polls<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Poll>>> {
		Box::pin(async move {
			let rows = workspace::active_polls(&self.db, workspace_id, limit).await?;
			let polls = rows
				.into_iter()
				.map(PollRow::into_domain)
				.collect::<wp_storage::Result<Vec<_>>>()?;

			Ok(polls)
		})
	}

	fn recent_payments<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PaymentSummary>>> {
		Box::pin(async move {
			let rows = workspace::recent_payments(&self.db, workspace_id, limit).await?;

			Ok(rows.into_iter().map(PaymentRow::into_domain).collect())
		})
	}

	fn places<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Place>>> {
		Box::pin(async move {
			let rows = workspace::places(&self.db, workspace_id, limit).await?;

			Ok(rows.into_iter().map(PlaceRow::into_domain).collect())
		})
	}

	fn links<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SavedLink>>> {
		Box::pin(async move {
			let rows = workspace::links(&self.db, workspace_id, limit).await?;

			Ok(rows.into_iter().map(LinkRow::into_domain).collect())
		})
	}

	fn preferences<'a>(
		&'a self,
		user_id: &'a UserId,
	) -> BoxFuture<'a, Result<Option<UserPreferences>>> {
		Box::pin(async move {
			Ok(workspace::preferences(&self.db, user_id)
				.await?
				.map(PreferencesRow::into_domain))
		})
	}

	fn source_items<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
		selector: &'a SourceSelector,
	) -> BoxFuture<'a, Result<Vec<SourceItem>>> {
		Box::pin(self.items_of(workspace_id, source_type, selector))
	}

	fn add_calendar_event<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		created_by: &'a UserId,
		event: &'a NewCalendarEvent,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			let event_id = Uuid::new_v4().to_string();

			workspace::insert_event(&self.db.pool, workspace_id, created_by, &event_id, event)
				.await?;

			Ok(created(SourceType::Event, event_id))
		})
	}

	fn create_task<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		created_by: &'a UserId,
		task: &'a NewTask,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			let task_id = Uuid::new_v4().to_string();

			workspace::insert_task(&self.db.pool, workspace_id, created_by, &task_id, task).await?;

			Ok(created(SourceType::Task, task_id))
		})
	}

	fn create_poll<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		created_by: &'a UserId,
		poll: &'a NewPoll,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			let poll_id = Uuid::new_v4().to_string();

			workspace::insert_poll(&self.db.pool, workspace_id, created_by, &poll_id, poll).await?;

			Ok(created(SourceType::Poll, poll_id))
		})
	}

	fn record_payment<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		paid_by: &'a UserId,
		payment: &'a NewPayment,
	) -> BoxFuture<'a, Result<CreatedItem>> {
		Box::pin(async move {
			let members =
				workspace::members_among(&self.db, workspace_id, &payment.split_with).await?;
			let requested = payment.split_with.iter().map(UserId::as_str).collect::<BTreeSet<_>>();

			if requested.iter().any(|id| !members.iter().any(|member| member == id)) {
				return Err(Error::Validation {
					message: "Payment split names users outside the workspace.".to_string(),
				});
			}

			let payment_id = Uuid::new_v4().to_string();

			workspace::insert_payment(&self.db.pool, workspace_id, paid_by, &payment_id, payment)
				.await?;

			Ok(created(SourceType::Payment, payment_id))
		})
	}
}

impl Entitlements for PgStore {
	fn assistant_enabled<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(workspace::assistant_enabled(&self.db, workspace_id).await?) })
	}

	fn preferences_entitled<'a>(&'a self, user_id: &'a UserId) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(workspace::preferences_entitled(&self.db, user_id).await?) })
	}
}

impl EmbeddingIndex for PgStore {
	fn upsert<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(embedding_records::upsert_record(&self.db.pool, record).await?) })
	}

	fn delete<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(embedding_records::delete_record(&self.db.pool, workspace_id, source_type, source_id)
				.await?)
		})
	}

	fn indexed_versions<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
	) -> BoxFuture<'a, Result<Vec<(String, OffsetDateTime)>>> {
		Box::pin(async move {
			let rows = embedding_records::indexed_versions(&self.db.pool, workspace_id, source_type)
				.await?;

			Ok(rows.into_iter().map(|row| (row.source_id, row.source_updated_at)).collect())
		})
	}

	fn vector_search<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		query_vec: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move {
			let rows =
				embedding_records::vector_search(&self.db.pool, workspace_id, query_vec, limit)
					.await?;
			let mut hits = Vec::with_capacity(rows.len());

			for row in rows {
				hits.push(SearchHit {
					workspace_id: WorkspaceId::new(row.workspace_id),
					source_type: models::parse_source_type(&row.source_type)?,
					source_id: row.source_id,
					content_text: row.content_text,
					score: row.similarity,
					source_updated_at: row.source_updated_at,
				});
			}

			Ok(hits)
		})
	}

	fn keyword_search<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		terms: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(async move {
			let rows =
				embedding_records::keyword_search(&self.db.pool, workspace_id, terms, limit).await?;
			let mut hits = Vec::with_capacity(rows.len());

			for row in rows {
				hits.push(SearchHit {
					workspace_id: WorkspaceId::new(row.workspace_id),
					source_type: models::parse_source_type(&row.source_type)?,
					source_id: row.source_id,
					content_text: row.content_text,
					score: row.rank,
					source_updated_at: row.source_updated_at,
				});
			}

			Ok(hits)
		})
	}
}

impl UsageLedger for PgStore {
	fn count_since<'a>(
		&'a self,
		user_id: &'a UserId,
		since: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let count = usage::count_turns_since(&self.db, user_id.as_str(), since).await?;

			Ok(count.max(0) as u64)
		})
	}

	fn record<'a>(&'a self, turn: &'a SessionTurn) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			usage::insert_turn(
				&self.db,
				&NewSessionTurn {
					workspace_id: turn.workspace_id.as_str(),
					user_id: turn.user_id.as_str(),
					outcome_code: &turn.outcome_code,
					user_message: &turn.user_message,
					answer: &turn.answer,
					tool_names: &turn.tool_names,
					latency_ms: turn.latency_ms,
					created_at: turn.created_at,
				},
			)
			.await?;

			Ok(())
		})
	}
}

/// Refresh queue over the `index_refresh_outbox` table.
#[derive(Clone)]
pub struct PgRefreshQueue {
	db: Db,
	lease: Duration,
}
impl PgRefreshQueue {
	pub fn new(db: Db, lease: Duration) -> Self {
		Self { db, lease }
	}
}

fn claimed_from_entry(entry: RefreshOutboxEntry) -> Result<ClaimedJob> {
	let source_type = entry.source_type.as_deref().map(models::parse_source_type).transpose()?;

	Ok(ClaimedJob {
		id: entry.outbox_id,
		job: RefreshJob {
			workspace_id: WorkspaceId::new(entry.workspace_id),
			source_type,
			selector: SourceSelector::from_optional(Some(&entry.source_id)),
			requested_at: entry.requested_at,
		},
		attempts: entry.attempts.max(0) as u32,
	})
}

impl RefreshQueue for PgRefreshQueue {
	fn enqueue<'a>(&'a self, job: &'a RefreshJob) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			refresh_outbox::enqueue(&self.db.pool, job).await?;

			Ok(())
		})
	}

	fn claim(&self) -> BoxFuture<'_, Result<Option<ClaimedJob>>> {
		Box::pin(async move {
			let entry =
				refresh_outbox::claim_next(&self.db, OffsetDateTime::now_utc(), self.lease).await?;

			entry.map(claimed_from_entry).transpose()
		})
	}

	fn complete<'a>(&'a self, job: &'a ClaimedJob) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(refresh_outbox::mark_done(&self.db, job.id).await?) })
	}

	fn fail<'a>(
		&'a self,
		job: &'a ClaimedJob,
		error: &'a str,
		retry_at: Option<OffsetDateTime>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let attempts = i32::try_from(job.attempts + 1).unwrap_or(i32::MAX);

			match retry_at {
				Some(at) =>
					refresh_outbox::mark_failed(&self.db, job.id, attempts, error, at).await?,
				None => refresh_outbox::mark_dead(&self.db, job.id, attempts, error).await?,
			}

			Ok(())
		})
	}
}
