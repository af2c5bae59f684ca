use crate::{
	WorkspaceId,
	workspace::{
		CalendarEvent, ChatMessage, Member, PaymentSummary, Place, Poll, SavedLink, TaskItem,
		UserPreferences, WorkspaceMeta,
	},
};

/// Request-scoped view of one workspace. Categories that failed to load are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
	pub workspace_id: Option<WorkspaceId>,
	pub meta: Option<WorkspaceMeta>,
	pub roster: Option<Vec<Member>>,
	pub events: Option<Vec<CalendarEvent>>,
	pub places: Option<Vec<Place>>,
	pub links: Option<Vec<SavedLink>>,
	pub messages: Option<Vec<ChatMessage>>,
	pub tasks: Option<Vec<TaskItem>>,
	pub polls: Option<Vec<Poll>>,
	pub payments: Option<Vec<PaymentSummary>>,
	pub preferences: Option<UserPreferences>,
	/// Category labels omitted because their fetch failed or timed out.
	pub omitted: Vec<&'static str>,
}
impl ContextSnapshot {
	pub fn empty(workspace_id: WorkspaceId) -> Self {
		Self { workspace_id: Some(workspace_id), ..Self::default() }
	}

	/// True when any row in the snapshot belongs to a workspace other than `workspace_id`.
	pub fn has_foreign_rows(&self, workspace_id: &WorkspaceId) -> bool {
		let foreign = |id: &WorkspaceId| id != workspace_id;

		self.meta.as_ref().map(|meta| foreign(&meta.workspace_id)).unwrap_or(false)
			|| self.events.iter().flatten().any(|row| foreign(&row.workspace_id))
			|| self.places.iter().flatten().any(|row| foreign(&row.workspace_id))
			|| self.links.iter().flatten().any(|row| foreign(&row.workspace_id))
			|| self.messages.iter().flatten().any(|row| foreign(&row.workspace_id))
			|| self.tasks.iter().flatten().any(|row| foreign(&row.workspace_id))
			|| self.polls.iter().flatten().any(|row| foreign(&row.workspace_id))
			|| self.payments.iter().flatten().any(|row| foreign(&row.workspace_id))
	}
}
