//! Seams to the external workspace data store, the entitlement service and the embedding index.
//!
//! Every method takes the workspace explicitly. Implementations must filter by it; callers still
//! re-check `workspace_id` on returned rows and drop strays.

use time::OffsetDateTime;

use wp_domain::{
	EmbeddingRecord, SourceSelector, SourceType, UserId, WorkspaceId,
	workspace::{
		CalendarEvent, ChatMessage, CreatedItem, Member, NewCalendarEvent, NewPayment, NewPoll,
		NewTask, PaymentSummary, Place, Poll, SavedLink, SourceItem, TaskItem, UserPreferences,
		WorkspaceMeta,
	},
};

use crate::{BoxFuture, Result};

pub trait WorkspaceStore
where
	Self: Send + Sync,
{
	fn is_member<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		user_id: &'a UserId,
	) -> BoxFuture<'a, Result<bool>>;

	fn workspace_meta<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
	) -> BoxFuture<'a, Result<Option<WorkspaceMeta>>>;

	fn roster<'a>(&'a self, workspace_id: &'a WorkspaceId) -> BoxFuture<'a, Result<Vec<Member>>>;

	/// Newest first, sent at or after `since`.
	fn recent_messages<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		since: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChatMessage>>>;

	fn upcoming_events<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		now: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<CalendarEvent>>>;

	fn open_tasks<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<TaskItem>>>;

	fn active_polls<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Poll>>>;

	fn recent_payments<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PaymentSummary>>>;

	fn places<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Place>>>;

	fn links<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SavedLink>>>;

	fn preferences<'a>(
		&'a self,
		user_id: &'a UserId,
	) -> BoxFuture<'a, Result<Option<UserPreferences>>>;

	/// Source rows for the index writer. A single id that no longer exists yields no items.
	fn source_items<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
		selector: &'a SourceSelector,
	) -> BoxFuture<'a, Result<Vec<SourceItem>>>;

	fn add_calendar_event<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		created_by: &'a UserId,
		event: &'a NewCalendarEvent,
	) -> BoxFuture<'a, Result<CreatedItem>>;

	fn create_task<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		created_by: &'a UserId,
		task: &'a NewTask,
	) -> BoxFuture<'a, Result<CreatedItem>>;

	fn create_poll<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		created_by: &'a UserId,
		poll: &'a NewPoll,
	) -> BoxFuture<'a, Result<CreatedItem>>;

	fn record_payment<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		paid_by: &'a UserId,
		payment: &'a NewPayment,
	) -> BoxFuture<'a, Result<CreatedItem>>;
}

/// Boolean capabilities consulted by the core. Why a flag is set is not decided here.
pub trait Entitlements
where
	Self: Send + Sync,
{
	fn assistant_enabled<'a>(&'a self, workspace_id: &'a WorkspaceId)
	-> BoxFuture<'a, Result<bool>>;

	fn preferences_entitled<'a>(&'a self, user_id: &'a UserId) -> BoxFuture<'a, Result<bool>>;
}

/// One search match from the embedding index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
	pub workspace_id: WorkspaceId,
	pub source_type: SourceType,
	pub source_id: String,
	pub content_text: String,
	/// Cosine similarity for vector hits, raw lexical rank for keyword hits.
	pub score: f32,
	pub source_updated_at: OffsetDateTime,
}

pub trait EmbeddingIndex
where
	Self: Send + Sync,
{
	/// Returns `false` when a record built from a newer source version is already stored.
	fn upsert<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<bool>>;

	fn delete<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<bool>>;

	/// `(source_id, source_updated_at)` of every record of one type in one workspace.
	fn indexed_versions<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		source_type: SourceType,
	) -> BoxFuture<'a, Result<Vec<(String, OffsetDateTime)>>>;

	fn vector_search<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		query_vec: &'a [f32],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;

	fn keyword_search<'a>(
		&'a self,
		workspace_id: &'a WorkspaceId,
		terms: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}
