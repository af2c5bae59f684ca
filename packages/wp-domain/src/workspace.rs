//! Rows read from, and writes sent to, the external workspace data store.
//!
//! Every row carries the workspace it belongs to so callers can verify scoping after the fact.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{SourceType, UserId, WorkspaceId, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyMode {
	#[default]
	Standard,
	High,
}
impl PrivacyMode {
	pub fn parse(value: &str) -> Self {
		if value.trim().eq_ignore_ascii_case("high") { Self::High } else { Self::Standard }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
	pub workspace_id: WorkspaceId,
	pub name: String,
	pub start_date: Option<Date>,
	pub end_date: Option<Date>,
	pub primary_location: Option<String>,
	pub privacy_mode: PrivacyMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
	pub user_id: UserId,
	pub display_name: String,
	pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub workspace_id: WorkspaceId,
	pub message_id: String,
	pub author_name: String,
	pub content: String,
	pub sent_at: OffsetDateTime,
	pub is_encrypted: bool,
	pub privacy: PrivacyMode,
	pub updated_at: OffsetDateTime,
}
impl ChatMessage {
	/// Encrypted and high-privacy messages never leave the store through this core.
	pub fn is_private(&self) -> bool {
		self.is_encrypted || self.privacy == PrivacyMode::High
	}

	pub fn canonical_text(&self) -> String {
		format!(
			"{}: {} @ {}",
			text::normalize_text(&self.author_name),
			text::normalize_text(&self.content),
			format_timestamp(self.sent_at)
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
	pub workspace_id: WorkspaceId,
	pub event_id: String,
	pub title: String,
	pub start_time: OffsetDateTime,
	pub end_time: Option<OffsetDateTime>,
	pub location: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl CalendarEvent {
	pub fn canonical_text(&self) -> String {
		let mut out = format!(
			"Event: {} @ {}",
			text::normalize_text(&self.title),
			format_timestamp(self.start_time)
		);

		if let Some(end) = self.end_time {
			out.push_str(&format!(" until {}", format_timestamp(end)));
		}
		if let Some(location) = self.location.as_deref().filter(|value| !value.trim().is_empty()) {
			out.push_str(&format!(" at {}", text::normalize_text(location)));
		}

		out
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
	pub workspace_id: WorkspaceId,
	pub task_id: String,
	pub title: String,
	pub description: Option<String>,
	pub due_date: Option<OffsetDateTime>,
	pub completed: bool,
	pub assignee: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl TaskItem {
	pub fn canonical_text(&self) -> String {
		let status = if self.completed { "done" } else { "open" };
		let mut out = format!("Task ({status}): {}", text::normalize_text(&self.title));

		if let Some(description) =
			self.description.as_deref().filter(|value| !value.trim().is_empty())
		{
			out.push_str(&format!(" - {}", text::normalize_text(description)));
		}
		if let Some(due) = self.due_date {
			out.push_str(&format!(" due {}", format_timestamp(due)));
		}
		if let Some(assignee) = self.assignee.as_deref() {
			out.push_str(&format!(" assigned to {assignee}"));
		}

		out
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
	pub label: String,
	pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
	pub workspace_id: WorkspaceId,
	pub poll_id: String,
	pub question: String,
	pub options: Vec<PollOption>,
	pub closed: bool,
	pub updated_at: OffsetDateTime,
}
impl Poll {
	pub fn canonical_text(&self) -> String {
		let options = self
			.options
			.iter()
			.map(|option| {
				format!("{} ({} votes)", text::normalize_text(&option.label), option.votes)
			})
			.collect::<Vec<_>>()
			.join(", ");
		let status = if self.closed { "closed" } else { "open" };

		format!("Poll ({status}): {} Options: {options}", text::normalize_text(&self.question))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
	pub workspace_id: WorkspaceId,
	pub payment_id: String,
	pub description: String,
	pub amount_cents: i64,
	pub currency: String,
	pub paid_by: String,
	pub split_count: u32,
	pub settled: bool,
	pub updated_at: OffsetDateTime,
}
impl PaymentSummary {
	pub fn canonical_text(&self) -> String {
		let status = if self.settled { "settled" } else { "outstanding" };

		format!(
			"Payment ({status}): {} {} paid by {} split {} ways for {}",
			format_amount(self.amount_cents),
			self.currency,
			self.paid_by,
			self.split_count.max(1),
			text::normalize_text(&self.description)
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
	pub workspace_id: WorkspaceId,
	pub place_id: String,
	pub name: String,
	pub address: Option<String>,
	pub category: Option<String>,
	pub notes: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl Place {
	pub fn canonical_text(&self) -> String {
		let mut out = format!("Place: {}", text::normalize_text(&self.name));

		if let Some(category) = self.category.as_deref() {
			out.push_str(&format!(" ({category})"));
		}
		if let Some(address) = self.address.as_deref() {
			out.push_str(&format!(" at {}", text::normalize_text(address)));
		}
		if let Some(notes) = self.notes.as_deref().filter(|value| !value.trim().is_empty()) {
			out.push_str(&format!(" - {}", text::normalize_text(notes)));
		}

		out
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLink {
	pub workspace_id: WorkspaceId,
	pub link_id: String,
	pub title: String,
	pub url: String,
	pub description: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl SavedLink {
	pub fn canonical_text(&self) -> String {
		let mut out = format!("Link: {} <{}>", text::normalize_text(&self.title), self.url.trim());

		if let Some(description) =
			self.description.as_deref().filter(|value| !value.trim().is_empty())
		{
			out.push_str(&format!(" - {}", text::normalize_text(description)));
		}

		out
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
	pub dietary: Vec<String>,
	pub interests: Vec<String>,
	pub accessibility: Vec<String>,
	pub budget: Option<String>,
	pub notes: Option<String>,
}

/// A source row flattened into the text the index writer embeds.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
	pub workspace_id: WorkspaceId,
	pub source_type: SourceType,
	pub source_id: String,
	pub text: String,
	pub metadata: Value,
	pub updated_at: OffsetDateTime,
	/// Private items must not be embedded; their records are pruned instead.
	pub excluded: bool,
}
impl From<&ChatMessage> for SourceItem {
	fn from(message: &ChatMessage) -> Self {
		Self {
			workspace_id: message.workspace_id.clone(),
			source_type: SourceType::Message,
			source_id: message.message_id.clone(),
			text: message.canonical_text(),
			metadata: serde_json::json!({
				"author": message.author_name,
				"sent_at": format_timestamp(message.sent_at),
			}),
			updated_at: message.updated_at,
			excluded: message.is_private(),
		}
	}
}
impl From<&CalendarEvent> for SourceItem {
	fn from(event: &CalendarEvent) -> Self {
		Self {
			workspace_id: event.workspace_id.clone(),
			source_type: SourceType::Event,
			source_id: event.event_id.clone(),
			text: event.canonical_text(),
			metadata: serde_json::json!({ "start_time": format_timestamp(event.start_time) }),
			updated_at: event.updated_at,
			excluded: false,
		}
	}
}
impl From<&TaskItem> for SourceItem {
	fn from(task: &TaskItem) -> Self {
		Self {
			workspace_id: task.workspace_id.clone(),
			source_type: SourceType::Task,
			source_id: task.task_id.clone(),
			text: task.canonical_text(),
			metadata: serde_json::json!({ "completed": task.completed }),
			updated_at: task.updated_at,
			excluded: false,
		}
	}
}
impl From<&Poll> for SourceItem {
	fn from(poll: &Poll) -> Self {
		Self {
			workspace_id: poll.workspace_id.clone(),
			source_type: SourceType::Poll,
			source_id: poll.poll_id.clone(),
			text: poll.canonical_text(),
			metadata: serde_json::json!({ "closed": poll.closed }),
			updated_at: poll.updated_at,
			excluded: false,
		}
	}
}
impl From<&PaymentSummary> for SourceItem {
	fn from(payment: &PaymentSummary) -> Self {
		Self {
			workspace_id: payment.workspace_id.clone(),
			source_type: SourceType::Payment,
			source_id: payment.payment_id.clone(),
			text: payment.canonical_text(),
			metadata: serde_json::json!({
				"currency": payment.currency,
				"settled": payment.settled,
			}),
			updated_at: payment.updated_at,
			excluded: false,
		}
	}
}
impl From<&Place> for SourceItem {
	fn from(place: &Place) -> Self {
		Self {
			workspace_id: place.workspace_id.clone(),
			source_type: SourceType::Place,
			source_id: place.place_id.clone(),
			text: place.canonical_text(),
			metadata: serde_json::json!({ "category": place.category }),
			updated_at: place.updated_at,
			excluded: false,
		}
	}
}
impl From<&SavedLink> for SourceItem {
	fn from(link: &SavedLink) -> Self {
		Self {
			workspace_id: link.workspace_id.clone(),
			source_type: SourceType::Link,
			source_id: link.link_id.clone(),
			text: link.canonical_text(),
			metadata: serde_json::json!({ "url": link.url }),
			updated_at: link.updated_at,
			excluded: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCalendarEvent {
	pub title: String,
	pub start_time: OffsetDateTime,
	pub end_time: Option<OffsetDateTime>,
	pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
	pub title: String,
	pub description: Option<String>,
	pub due_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPoll {
	pub question: String,
	pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
	pub description: String,
	pub amount_cents: i64,
	pub currency: String,
	pub split_with: Vec<UserId>,
}

/// Identifier of a row created through a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
	pub source_type: SourceType,
	pub source_id: String,
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
	ts.format(&Rfc3339).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

pub fn format_amount(amount_cents: i64) -> String {
	let sign = if amount_cents < 0 { "-" } else { "" };
	let abs = amount_cents.unsigned_abs();

	format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn message(is_encrypted: bool, privacy: PrivacyMode) -> ChatMessage {
		ChatMessage {
			workspace_id: WorkspaceId::new("trip-1"),
			message_id: "m-1".to_string(),
			author_name: "Ana".to_string(),
			content: "Dinner is at  7pm".to_string(),
			sent_at: datetime!(2026-05-01 18:00 UTC),
			is_encrypted,
			privacy,
			updated_at: datetime!(2026-05-01 18:00 UTC),
		}
	}

	#[test]
	fn message_canonical_text_is_speaker_content_timestamp() {
		let text = message(false, PrivacyMode::Standard).canonical_text();

		assert_eq!(text, "Ana: Dinner is at 7pm @ 2026-05-01T18:00:00Z");
	}

	#[test]
	fn private_messages_are_excluded_from_indexing() {
		assert!(SourceItem::from(&message(true, PrivacyMode::Standard)).excluded);
		assert!(SourceItem::from(&message(false, PrivacyMode::High)).excluded);
		assert!(!SourceItem::from(&message(false, PrivacyMode::Standard)).excluded);
	}

	#[test]
	fn amounts_render_with_two_decimals() {
		assert_eq!(format_amount(12_345), "123.45");
		assert_eq!(format_amount(-5), "-0.05");
	}
}
