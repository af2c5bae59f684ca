//! Index Refresh Queue: at-least-once delivery of refresh jobs to the index writer.

use std::{sync::Arc, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};
use tokio::{sync::Mutex, task::JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use wp_config::Indexing;
use wp_domain::{RefreshJob, sanitize};

use crate::{BoxFuture, Error, Result, index_writer::IndexWriter};

/// A job leased to one worker. Other workers will not see it until the lease lapses.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
	pub id: Uuid,
	pub job: RefreshJob,
	/// Failed attempts before this claim.
	pub attempts: u32,
}

pub trait RefreshQueue
where
	Self: Send + Sync,
{
	fn enqueue<'a>(&'a self, job: &'a RefreshJob) -> BoxFuture<'a, Result<()>>;

	fn claim(&self) -> BoxFuture<'_, Result<Option<ClaimedJob>>>;

	fn complete<'a>(&'a self, job: &'a ClaimedJob) -> BoxFuture<'a, Result<()>>;

	/// Records a failed attempt. `None` for `retry_at` dead-letters the job.
	fn fail<'a>(
		&'a self,
		job: &'a ClaimedJob,
		error: &'a str,
		retry_at: Option<OffsetDateTime>,
	) -> BoxFuture<'a, Result<()>>;
}

/// Enqueues without making the caller wait. Failures are logged and never reach the write path.
pub fn enqueue_detached(queue: Arc<dyn RefreshQueue>, job: RefreshJob) {
	tokio::spawn(async move {
		if let Err(err) = queue.enqueue(&job).await {
			tracing::warn!(
				workspace_id = %job.workspace_id,
				selector = job.selector.as_storage_key(),
				error = %err.sanitized(),
				"Refresh job enqueue failed."
			);
		}
	});
}

#[derive(Debug, Clone)]
pub struct RefreshPolicy {
	pub workers: usize,
	pub poll_interval: StdDuration,
	pub lease: Duration,
	pub base_backoff_ms: i64,
	pub max_backoff_ms: i64,
	pub max_attempts: u32,
}
impl RefreshPolicy {
	pub fn from_config(cfg: &Indexing) -> Self {
		Self {
			workers: cfg.workers.max(1) as usize,
			poll_interval: StdDuration::from_millis(cfg.poll_interval_ms),
			lease: Duration::seconds(cfg.lease_seconds.max(1)),
			base_backoff_ms: cfg.base_backoff_ms.max(0),
			max_backoff_ms: cfg.max_backoff_ms.max(0),
			max_attempts: cfg.max_attempts.max(1) as u32,
		}
	}

	/// Exponential backoff doubling from the base, capped after six doublings and at the maximum.
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(6);
		let base = self.base_backoff_ms.saturating_mul(1 << exp);

		Duration::milliseconds(base.min(self.max_backoff_ms))
	}
}

/// Claims and runs one job. Returns `false` when nothing was runnable.
pub async fn process_once(
	queue: &dyn RefreshQueue,
	writer: &IndexWriter,
	policy: &RefreshPolicy,
) -> Result<bool> {
	let Some(claimed) = queue.claim().await? else {
		return Ok(false);
	};
	let result = match writer.run_job(&claimed.job).await {
		Ok(report) if report.failed > 0 => Err(Error::Provider {
			message: format!("{} items failed to index.", report.failed),
		}),
		other => other,
	};

	match result {
		Ok(report) => {
			queue.complete(&claimed).await?;

			if report.remaining > 0 {
				let follow_up = RefreshJob::new(
					claimed.job.workspace_id.clone(),
					claimed.job.source_type,
					claimed.job.selector.clone(),
				);

				queue.enqueue(&follow_up).await?;
			}
		},
		Err(err) => {
			let attempts = claimed.attempts + 1;
			let error_text = sanitize::sanitize_error_message(&err.to_string());

			if attempts >= policy.max_attempts {
				queue.fail(&claimed, &error_text, None).await?;

				tracing::error!(
					job_id = %claimed.id,
					workspace_id = %claimed.job.workspace_id,
					attempts,
					error = %error_text,
					"Refresh job exhausted its attempts and was dead-lettered."
				);
			} else {
				let retry_at = OffsetDateTime::now_utc() + policy.backoff_for_attempt(attempts);

				queue.fail(&claimed, &error_text, Some(retry_at)).await?;

				tracing::warn!(
					job_id = %claimed.id,
					workspace_id = %claimed.job.workspace_id,
					attempts,
					error = %error_text,
					"Refresh job failed. Retrying later."
				);
			}
		},
	}

	Ok(true)
}

/// Runs `policy.workers` concurrent consumers until `shutdown` fires.
pub async fn run_workers(
	queue: Arc<dyn RefreshQueue>,
	writer: Arc<IndexWriter>,
	policy: RefreshPolicy,
	shutdown: CancellationToken,
) {
	let mut set = JoinSet::new();

	for worker in 0..policy.workers {
		let queue = queue.clone();
		let writer = writer.clone();
		let policy = policy.clone();
		let shutdown = shutdown.clone();

		set.spawn(async move {
			tracing::info!(worker, "Refresh worker started.");

			while !shutdown.is_cancelled() {
				let busy = match process_once(queue.as_ref(), &writer, &policy).await {
					Ok(busy) => busy,
					Err(err) => {
						tracing::error!(
							worker,
							error = %err.sanitized(),
							"Refresh queue processing failed."
						);

						false
					},
				};

				if busy {
					continue;
				}

				tokio::select! {
					_ = shutdown.cancelled() => break,
					_ = tokio::time::sleep(policy.poll_interval) => {},
				}
			}

			tracing::info!(worker, "Refresh worker stopped.");
		});
	}

	while let Some(joined) = set.join_next().await {
		if let Err(err) = joined {
			tracing::error!(error = %err, "Refresh worker panicked.");
		}
	}
}

#[derive(Debug, Clone)]
struct QueuedJob {
	claimed: ClaimedJob,
	available_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct QueueState {
	jobs: Vec<QueuedJob>,
	dead: Vec<ClaimedJob>,
}

/// In-process queue with the same lease semantics as the Postgres outbox.
#[derive(Debug)]
pub struct MemoryRefreshQueue {
	lease: Duration,
	state: Mutex<QueueState>,
}
impl MemoryRefreshQueue {
	pub fn new(lease: Duration) -> Self {
		Self { lease, state: Mutex::new(QueueState::default()) }
	}

	/// Jobs still waiting or leased.
	pub async fn len(&self) -> usize {
		self.state.lock().await.jobs.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	pub async fn pending_jobs(&self) -> Vec<RefreshJob> {
		self.state.lock().await.jobs.iter().map(|queued| queued.claimed.job.clone()).collect()
	}

	pub async fn dead_letters(&self) -> Vec<ClaimedJob> {
		self.state.lock().await.dead.clone()
	}
}
impl Default for MemoryRefreshQueue {
	fn default() -> Self {
		Self::new(Duration::seconds(30))
	}
}
impl RefreshQueue for MemoryRefreshQueue {
	fn enqueue<'a>(&'a self, job: &'a RefreshJob) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.state.lock().await;

			state.jobs.push(QueuedJob {
				claimed: ClaimedJob { id: Uuid::new_v4(), job: job.clone(), attempts: 0 },
				available_at: job.requested_at,
			});

			Ok(())
		})
	}

	fn claim(&self) -> BoxFuture<'_, Result<Option<ClaimedJob>>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut state = self.state.lock().await;
			let next = state
				.jobs
				.iter_mut()
				.filter(|queued| queued.available_at <= now)
				.min_by_key(|queued| queued.available_at);

			Ok(next.map(|queued| {
				queued.available_at = now + self.lease;

				queued.claimed.clone()
			}))
		})
	}

	fn complete<'a>(&'a self, job: &'a ClaimedJob) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.state.lock().await.jobs.retain(|queued| queued.claimed.id != job.id);

			Ok(())
		})
	}

	fn fail<'a>(
		&'a self,
		job: &'a ClaimedJob,
		_error: &'a str,
		retry_at: Option<OffsetDateTime>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.state.lock().await;
			let Some(pos) = state.jobs.iter().position(|queued| queued.claimed.id == job.id) else {
				return Ok(());
			};

			match retry_at {
				Some(at) => {
					let queued = &mut state.jobs[pos];

					queued.claimed.attempts = job.attempts + 1;
					queued.available_at = at;
				},
				None => {
					let mut queued = state.jobs.remove(pos);

					queued.claimed.attempts = job.attempts + 1;

					state.dead.push(queued.claimed);
				},
			}

			Ok(())
		})
	}
}
