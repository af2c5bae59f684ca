//! Reads and writes on the trip tables owned by the collaboration product.
//!
//! Every query is filtered by `trip_id`. Callers pass the workspace explicitly; nothing here
//! infers it from row contents.

use sqlx::PgExecutor;
use time::OffsetDateTime;

use wp_domain::{
	UserId, WorkspaceId,
	workspace::{NewCalendarEvent, NewPayment, NewPoll, NewTask},
};

use crate::{
	Result,
	db::Db,
	models::{
		EventRow, LinkRow, MemberRow, MessageRow, PaymentRow, PlaceRow, PollRow, PreferencesRow,
		TaskRow, TripRow,
	},
};

const MESSAGE_COLUMNS: &str = "\
message_id, trip_id, author_name, content, is_encrypted, privacy_mode, sent_at, updated_at";
const EVENT_COLUMNS: &str = "event_id, trip_id, title, start_time, end_time, location, updated_at";
const TASK_COLUMNS: &str =
	"task_id, trip_id, title, description, due_date, completed, assignee, updated_at";
const POLL_COLUMNS: &str = "poll_id, trip_id, question, options, closed, updated_at";
const PAYMENT_COLUMNS: &str = "\
payment_id, trip_id, description, amount_cents, currency, paid_by, split_with, settled, updated_at";
const PLACE_COLUMNS: &str = "place_id, trip_id, name, address, category, notes, updated_at";
const LINK_COLUMNS: &str = "link_id, trip_id, title, url, description, updated_at";

pub async fn is_member(db: &Db, workspace_id: &WorkspaceId, user_id: &UserId) -> Result<bool> {
	let exists: bool = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1 FROM trip_members
	WHERE trip_id = $1 AND user_id = $2 AND status = 'active'
)",
	)
	.bind(workspace_id.as_str())
	.bind(user_id.as_str())
	.fetch_one(&db.pool)
	.await?;

	Ok(exists)
}

pub async fn trip(db: &Db, workspace_id: &WorkspaceId) -> Result<Option<TripRow>> {
	let row = sqlx::query_as::<_, TripRow>(
		"\
SELECT trip_id, name, start_date, end_date, primary_location, privacy_mode
FROM trips
WHERE trip_id = $1",
	)
	.bind(workspace_id.as_str())
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn roster(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<MemberRow>> {
	let rows = sqlx::query_as::<_, MemberRow>(
		"\
SELECT user_id, display_name, role
FROM trip_members
WHERE trip_id = $1 AND status = 'active'
ORDER BY joined_at ASC",
	)
	.bind(workspace_id.as_str())
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Most recent non-deleted messages sent after `since`, newest first.
pub async fn recent_messages(
	db: &Db,
	workspace_id: &WorkspaceId,
	since: OffsetDateTime,
	limit: u32,
) -> Result<Vec<MessageRow>> {
	let sql = format!(
		"\
SELECT {MESSAGE_COLUMNS}
FROM trip_messages
WHERE trip_id = $1 AND deleted_at IS NULL AND sent_at >= $2
ORDER BY sent_at DESC
LIMIT $3"
	);
	let rows = sqlx::query_as::<_, MessageRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(since)
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn upcoming_events(
	db: &Db,
	workspace_id: &WorkspaceId,
	now: OffsetDateTime,
	limit: u32,
) -> Result<Vec<EventRow>> {
	let sql = format!(
		"\
SELECT {EVENT_COLUMNS}
FROM trip_events
WHERE trip_id = $1 AND coalesce(end_time, start_time) >= $2
ORDER BY start_time ASC
LIMIT $3"
	);
	let rows = sqlx::query_as::<_, EventRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(now)
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn open_tasks(db: &Db, workspace_id: &WorkspaceId, limit: u32) -> Result<Vec<TaskRow>> {
	let sql = format!(
		"\
SELECT {TASK_COLUMNS}
FROM trip_tasks
WHERE trip_id = $1 AND NOT completed
ORDER BY due_date ASC NULLS LAST, updated_at DESC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, TaskRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn active_polls(db: &Db, workspace_id: &WorkspaceId, limit: u32) -> Result<Vec<PollRow>> {
	let sql = format!(
		"\
SELECT {POLL_COLUMNS}
FROM trip_polls
WHERE trip_id = $1 AND NOT closed
ORDER BY updated_at DESC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, PollRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn recent_payments(
	db: &Db,
	workspace_id: &WorkspaceId,
	limit: u32,
) -> Result<Vec<PaymentRow>> {
	let sql = format!(
		"\
SELECT {PAYMENT_COLUMNS}
FROM trip_payments
WHERE trip_id = $1
ORDER BY updated_at DESC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, PaymentRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn places(db: &Db, workspace_id: &WorkspaceId, limit: u32) -> Result<Vec<PlaceRow>> {
	let sql = format!(
		"\
SELECT {PLACE_COLUMNS}
FROM trip_places
WHERE trip_id = $1
ORDER BY updated_at DESC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, PlaceRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn links(db: &Db, workspace_id: &WorkspaceId, limit: u32) -> Result<Vec<LinkRow>> {
	let sql = format!(
		"\
SELECT {LINK_COLUMNS}
FROM trip_links
WHERE trip_id = $1
ORDER BY updated_at DESC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, LinkRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(i64::from(limit))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn preferences(db: &Db, user_id: &UserId) -> Result<Option<PreferencesRow>> {
	let row = sqlx::query_as::<_, PreferencesRow>(
		"\
SELECT dietary, interests, accessibility, budget, notes
FROM user_preferences
WHERE user_id = $1",
	)
	.bind(user_id.as_str())
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// A workspace without a capabilities row has the assistant enabled.
pub async fn assistant_enabled(db: &Db, workspace_id: &WorkspaceId) -> Result<bool> {
	let enabled: Option<bool> =
		sqlx::query_scalar("SELECT assistant_enabled FROM trip_capabilities WHERE trip_id = $1")
			.bind(workspace_id.as_str())
			.fetch_optional(&db.pool)
			.await?;

	Ok(enabled.unwrap_or(true))
}

pub async fn preferences_entitled(db: &Db, user_id: &UserId) -> Result<bool> {
	let enabled: Option<bool> =
		sqlx::query_scalar("SELECT preferences_enabled FROM user_entitlements WHERE user_id = $1")
			.bind(user_id.as_str())
			.fetch_optional(&db.pool)
			.await?;

	Ok(enabled.unwrap_or(false))
}

pub async fn message_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	message_id: &str,
) -> Result<Option<MessageRow>> {
	let sql = format!(
		"\
SELECT {MESSAGE_COLUMNS}
FROM trip_messages
WHERE trip_id = $1 AND message_id = $2 AND deleted_at IS NULL"
	);
	let row = sqlx::query_as::<_, MessageRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(message_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn event_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	event_id: &str,
) -> Result<Option<EventRow>> {
	let sql = format!("SELECT {EVENT_COLUMNS} FROM trip_events WHERE trip_id = $1 AND event_id = $2");
	let row = sqlx::query_as::<_, EventRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(event_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn task_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	task_id: &str,
) -> Result<Option<TaskRow>> {
	let sql = format!("SELECT {TASK_COLUMNS} FROM trip_tasks WHERE trip_id = $1 AND task_id = $2");
	let row = sqlx::query_as::<_, TaskRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(task_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn poll_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	poll_id: &str,
) -> Result<Option<PollRow>> {
	let sql = format!("SELECT {POLL_COLUMNS} FROM trip_polls WHERE trip_id = $1 AND poll_id = $2");
	let row = sqlx::query_as::<_, PollRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(poll_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn payment_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	payment_id: &str,
) -> Result<Option<PaymentRow>> {
	let sql =
		format!("SELECT {PAYMENT_COLUMNS} FROM trip_payments WHERE trip_id = $1 AND payment_id = $2");
	let row = sqlx::query_as::<_, PaymentRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(payment_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn place_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	place_id: &str,
) -> Result<Option<PlaceRow>> {
	let sql = format!("SELECT {PLACE_COLUMNS} FROM trip_places WHERE trip_id = $1 AND place_id = $2");
	let row = sqlx::query_as::<_, PlaceRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(place_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn link_by_id(
	db: &Db,
	workspace_id: &WorkspaceId,
	link_id: &str,
) -> Result<Option<LinkRow>> {
	let sql = format!("SELECT {LINK_COLUMNS} FROM trip_links WHERE trip_id = $1 AND link_id = $2");
	let row = sqlx::query_as::<_, LinkRow>(&sql)
		.bind(workspace_id.as_str())
		.bind(link_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

/// Every row of one category, for full-workspace refreshes. Deleted messages are skipped so their
/// records get pruned.
pub async fn all_messages(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<MessageRow>> {
	let sql = format!(
		"SELECT {MESSAGE_COLUMNS} FROM trip_messages WHERE trip_id = $1 AND deleted_at IS NULL"
	);

	Ok(sqlx::query_as::<_, MessageRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn all_events(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<EventRow>> {
	let sql = format!("SELECT {EVENT_COLUMNS} FROM trip_events WHERE trip_id = $1");

	Ok(sqlx::query_as::<_, EventRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn all_tasks(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<TaskRow>> {
	let sql = format!("SELECT {TASK_COLUMNS} FROM trip_tasks WHERE trip_id = $1");

	Ok(sqlx::query_as::<_, TaskRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn all_polls(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<PollRow>> {
	let sql = format!("SELECT {POLL_COLUMNS} FROM trip_polls WHERE trip_id = $1");

	Ok(sqlx::query_as::<_, PollRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn all_payments(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<PaymentRow>> {
	let sql = format!("SELECT {PAYMENT_COLUMNS} FROM trip_payments WHERE trip_id = $1");

	Ok(sqlx::query_as::<_, PaymentRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn all_places(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<PlaceRow>> {
	let sql = format!("SELECT {PLACE_COLUMNS} FROM trip_places WHERE trip_id = $1");

	Ok(sqlx::query_as::<_, PlaceRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn all_links(db: &Db, workspace_id: &WorkspaceId) -> Result<Vec<LinkRow>> {
	let sql = format!("SELECT {LINK_COLUMNS} FROM trip_links WHERE trip_id = $1");

	Ok(sqlx::query_as::<_, LinkRow>(&sql).bind(workspace_id.as_str()).fetch_all(&db.pool).await?)
}

pub async fn insert_event<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	created_by: &UserId,
	event_id: &str,
	event: &NewCalendarEvent,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO trip_events (event_id, trip_id, title, start_time, end_time, location, created_by, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
	)
	.bind(event_id)
	.bind(workspace_id.as_str())
	.bind(event.title.as_str())
	.bind(event.start_time)
	.bind(event.end_time)
	.bind(event.location.as_deref())
	.bind(created_by.as_str())
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn insert_task<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	created_by: &UserId,
	task_id: &str,
	task: &NewTask,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO trip_tasks (task_id, trip_id, title, description, due_date, created_by, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, now())",
	)
	.bind(task_id)
	.bind(workspace_id.as_str())
	.bind(task.title.as_str())
	.bind(task.description.as_deref())
	.bind(task.due_date)
	.bind(created_by.as_str())
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn insert_poll<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	created_by: &UserId,
	poll_id: &str,
	poll: &NewPoll,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let options = poll
		.options
		.iter()
		.map(|label| serde_json::json!({ "label": label, "votes": 0 }))
		.collect::<Vec<_>>();

	sqlx::query(
		"\
INSERT INTO trip_polls (poll_id, trip_id, question, options, created_by, updated_at)
VALUES ($1, $2, $3, $4, $5, now())",
	)
	.bind(poll_id)
	.bind(workspace_id.as_str())
	.bind(poll.question.as_str())
	.bind(serde_json::Value::Array(options))
	.bind(created_by.as_str())
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn insert_payment<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	paid_by: &UserId,
	payment_id: &str,
	payment: &NewPayment,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let split_with =
		payment.split_with.iter().map(|id| id.as_str().to_string()).collect::<Vec<_>>();

	sqlx::query(
		"\
INSERT INTO trip_payments (payment_id, trip_id, description, amount_cents, currency, paid_by, split_with, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
	)
	.bind(payment_id)
	.bind(workspace_id.as_str())
	.bind(payment.description.as_str())
	.bind(payment.amount_cents)
	.bind(payment.currency.as_str())
	.bind(paid_by.as_str())
	.bind(split_with)
	.execute(executor)
	.await?;

	Ok(())
}

/// Members of `workspace_id` among `user_ids`. Used to reject payment splits naming outsiders.
pub async fn members_among(
	db: &Db,
	workspace_id: &WorkspaceId,
	user_ids: &[UserId],
) -> Result<Vec<String>> {
	let ids = user_ids.iter().map(|id| id.as_str().to_string()).collect::<Vec<_>>();
	let rows: Vec<String> = sqlx::query_scalar(
		"\
SELECT user_id FROM trip_members
WHERE trip_id = $1 AND status = 'active' AND user_id = ANY($2)",
	)
	.bind(workspace_id.as_str())
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
