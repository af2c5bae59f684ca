use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use wp_domain::{
	SourceType, UserId, WorkspaceId,
	workspace::{
		CalendarEvent, ChatMessage, Member, PaymentSummary, Place, Poll, PollOption, PrivacyMode,
		SavedLink, TaskItem, UserPreferences, WorkspaceMeta,
	},
};

use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
pub struct VectorHit {
	pub workspace_id: String,
	pub source_type: String,
	pub source_id: String,
	pub content_text: String,
	/// `1 - cosine distance`.
	pub similarity: f32,
	pub source_updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct KeywordHit {
	pub workspace_id: String,
	pub source_type: String,
	pub source_id: String,
	pub content_text: String,
	pub rank: f32,
	pub source_updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct IndexedVersion {
	pub source_id: String,
	pub source_updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshOutboxEntry {
	pub outbox_id: Uuid,
	pub workspace_id: String,
	pub source_type: Option<String>,
	pub source_id: String,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub requested_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TripRow {
	pub trip_id: String,
	pub name: String,
	pub start_date: Option<Date>,
	pub end_date: Option<Date>,
	pub primary_location: Option<String>,
	pub privacy_mode: String,
}
impl TripRow {
	pub fn into_domain(self) -> WorkspaceMeta {
		WorkspaceMeta {
			workspace_id: WorkspaceId::new(self.trip_id),
			name: self.name,
			start_date: self.start_date,
			end_date: self.end_date,
			primary_location: self.primary_location,
			privacy_mode: PrivacyMode::parse(&self.privacy_mode),
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct MemberRow {
	pub user_id: String,
	pub display_name: String,
	pub role: Option<String>,
}
impl MemberRow {
	pub fn into_domain(self) -> Member {
		Member {
			user_id: UserId::new(self.user_id),
			display_name: self.display_name,
			role: self.role,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
	pub message_id: String,
	pub trip_id: String,
	pub author_name: String,
	pub content: String,
	pub is_encrypted: bool,
	pub privacy_mode: String,
	pub sent_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl MessageRow {
	pub fn into_domain(self) -> ChatMessage {
		ChatMessage {
			workspace_id: WorkspaceId::new(self.trip_id),
			message_id: self.message_id,
			author_name: self.author_name,
			content: self.content,
			sent_at: self.sent_at,
			is_encrypted: self.is_encrypted,
			privacy: PrivacyMode::parse(&self.privacy_mode),
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct EventRow {
	pub event_id: String,
	pub trip_id: String,
	pub title: String,
	pub start_time: OffsetDateTime,
	pub end_time: Option<OffsetDateTime>,
	pub location: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl EventRow {
	pub fn into_domain(self) -> CalendarEvent {
		CalendarEvent {
			workspace_id: WorkspaceId::new(self.trip_id),
			event_id: self.event_id,
			title: self.title,
			start_time: self.start_time,
			end_time: self.end_time,
			location: self.location,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct TaskRow {
	pub task_id: String,
	pub trip_id: String,
	pub title: String,
	pub description: Option<String>,
	pub due_date: Option<OffsetDateTime>,
	pub completed: bool,
	pub assignee: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl TaskRow {
	pub fn into_domain(self) -> TaskItem {
		TaskItem {
			workspace_id: WorkspaceId::new(self.trip_id),
			task_id: self.task_id,
			title: self.title,
			description: self.description,
			due_date: self.due_date,
			completed: self.completed,
			assignee: self.assignee,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct PollRow {
	pub poll_id: String,
	pub trip_id: String,
	pub question: String,
	pub options: Value,
	pub closed: bool,
	pub updated_at: OffsetDateTime,
}
impl PollRow {
	pub fn into_domain(self) -> Result<Poll> {
		let options: Vec<PollOption> = serde_json::from_value(self.options).map_err(|err| {
			Error::CorruptRow(format!("Poll {} has malformed options: {err}.", self.poll_id))
		})?;

		Ok(Poll {
			workspace_id: WorkspaceId::new(self.trip_id),
			poll_id: self.poll_id,
			question: self.question,
			options,
			closed: self.closed,
			updated_at: self.updated_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct PaymentRow {
	pub payment_id: String,
	pub trip_id: String,
	pub description: String,
	pub amount_cents: i64,
	pub currency: String,
	pub paid_by: String,
	pub split_with: Vec<String>,
	pub settled: bool,
	pub updated_at: OffsetDateTime,
}
impl PaymentRow {
	pub fn into_domain(self) -> PaymentSummary {
		PaymentSummary {
			workspace_id: WorkspaceId::new(self.trip_id),
			payment_id: self.payment_id,
			description: self.description,
			amount_cents: self.amount_cents,
			currency: self.currency,
			paid_by: self.paid_by,
			split_count: u32::try_from(self.split_with.len()).unwrap_or(u32::MAX),
			settled: self.settled,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct PlaceRow {
	pub place_id: String,
	pub trip_id: String,
	pub name: String,
	pub address: Option<String>,
	pub category: Option<String>,
	pub notes: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl PlaceRow {
	pub fn into_domain(self) -> Place {
		Place {
			workspace_id: WorkspaceId::new(self.trip_id),
			place_id: self.place_id,
			name: self.name,
			address: self.address,
			category: self.category,
			notes: self.notes,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct LinkRow {
	pub link_id: String,
	pub trip_id: String,
	pub title: String,
	pub url: String,
	pub description: Option<String>,
	pub updated_at: OffsetDateTime,
}
impl LinkRow {
	pub fn into_domain(self) -> SavedLink {
		SavedLink {
			workspace_id: WorkspaceId::new(self.trip_id),
			link_id: self.link_id,
			title: self.title,
			url: self.url,
			description: self.description,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct PreferencesRow {
	pub dietary: Vec<String>,
	pub interests: Vec<String>,
	pub accessibility: Vec<String>,
	pub budget: Option<String>,
	pub notes: Option<String>,
}
impl PreferencesRow {
	pub fn into_domain(self) -> UserPreferences {
		UserPreferences {
			dietary: self.dietary,
			interests: self.interests,
			accessibility: self.accessibility,
			budget: self.budget,
			notes: self.notes,
		}
	}
}

pub fn parse_source_type(raw: &str) -> Result<SourceType> {
	SourceType::parse(raw).ok_or_else(|| Error::CorruptRow(format!("Unknown source type {raw:?}.")))
}
