use sqlx::PgExecutor;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use wp_domain::RefreshJob;

use crate::{Result, db::Db, models::RefreshOutboxEntry};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_DONE: &str = "DONE";
pub const STATUS_DEAD: &str = "DEAD";

pub async fn enqueue<'e, E>(executor: E, job: &RefreshJob) -> Result<Uuid>
where
	E: PgExecutor<'e>,
{
	let outbox_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO index_refresh_outbox (
	outbox_id,
	workspace_id,
	source_type,
	source_id,
	status,
	available_at,
	requested_at,
	updated_at
)
VALUES ($1, $2, $3, $4, 'PENDING', $5, $5, $5)",
	)
	.bind(outbox_id)
	.bind(job.workspace_id.as_str())
	.bind(job.source_type.map(|kind| kind.as_str()))
	.bind(job.selector.as_storage_key())
	.bind(job.requested_at)
	.execute(executor)
	.await?;

	Ok(outbox_id)
}

/// Claims the oldest runnable job and leases it for `lease` so other workers skip it. A worker
/// that dies mid-job lets the lease lapse and the job becomes claimable again.
pub async fn claim_next(
	db: &Db,
	now: OffsetDateTime,
	lease: Duration,
) -> Result<Option<RefreshOutboxEntry>> {
	let mut tx = db.pool.begin().await?;
	let row = sqlx::query_as::<_, RefreshOutboxEntry>(
		"\
SELECT
	outbox_id,
	workspace_id,
	source_type,
	source_id,
	status,
	attempts,
	last_error,
	available_at,
	requested_at,
	updated_at
FROM index_refresh_outbox
WHERE status IN ('PENDING','FAILED') AND available_at <= $1
ORDER BY available_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;
	let job = if let Some(mut job) = row {
		let lease_until = now + lease;

		sqlx::query(
			"UPDATE index_refresh_outbox SET available_at = $1, updated_at = $2 WHERE outbox_id = $3",
		)
		.bind(lease_until)
		.bind(now)
		.bind(job.outbox_id)
		.execute(&mut *tx)
		.await?;

		job.available_at = lease_until;
		job.updated_at = now;

		Some(job)
	} else {
		None
	};

	tx.commit().await?;

	Ok(job)
}

pub async fn mark_done(db: &Db, outbox_id: Uuid) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"UPDATE index_refresh_outbox SET status = 'DONE', updated_at = $1 WHERE outbox_id = $2",
	)
	.bind(now)
	.bind(outbox_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn mark_failed(
	db: &Db,
	outbox_id: Uuid,
	attempts: i32,
	error_text: &str,
	available_at: OffsetDateTime,
) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"\
UPDATE index_refresh_outbox
SET status = 'FAILED',
	attempts = $1,
	last_error = $2,
	available_at = $3,
	updated_at = $4
WHERE outbox_id = $5",
	)
	.bind(attempts)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.bind(outbox_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn mark_dead(db: &Db, outbox_id: Uuid, attempts: i32, error_text: &str) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"\
UPDATE index_refresh_outbox
SET status = 'DEAD',
	attempts = $1,
	last_error = $2,
	updated_at = $3
WHERE outbox_id = $4",
	)
	.bind(attempts)
	.bind(error_text)
	.bind(now)
	.bind(outbox_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn count_by_status(db: &Db, status: &str) -> Result<i64> {
	let count: i64 =
		sqlx::query_scalar("SELECT count(*) FROM index_refresh_outbox WHERE status = $1")
			.bind(status)
			.fetch_one(&db.pool)
			.await?;

	Ok(count)
}
