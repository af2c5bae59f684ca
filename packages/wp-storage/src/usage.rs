use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db};

#[derive(Debug, Clone)]
pub struct NewSessionTurn<'a> {
	pub workspace_id: &'a str,
	pub user_id: &'a str,
	pub outcome_code: &'a str,
	pub user_message: &'a str,
	pub answer: &'a str,
	pub tool_names: &'a [String],
	pub latency_ms: i64,
	pub created_at: OffsetDateTime,
}

pub async fn insert_turn(db: &Db, turn: &NewSessionTurn<'_>) -> Result<Uuid> {
	let turn_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO session_turns (
	turn_id,
	workspace_id,
	user_id,
	outcome_code,
	user_message,
	answer,
	tool_names,
	latency_ms,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(turn_id)
	.bind(turn.workspace_id)
	.bind(turn.user_id)
	.bind(turn.outcome_code)
	.bind(turn.user_message)
	.bind(turn.answer)
	.bind(turn.tool_names)
	.bind(turn.latency_ms)
	.bind(turn.created_at)
	.execute(&db.pool)
	.await?;

	Ok(turn_id)
}

/// Turns a user started since `since`, across all workspaces.
pub async fn count_turns_since(db: &Db, user_id: &str, since: OffsetDateTime) -> Result<i64> {
	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM session_turns WHERE user_id = $1 AND created_at >= $2",
	)
	.bind(user_id)
	.bind(since)
	.fetch_one(&db.pool)
	.await?;

	Ok(count)
}
