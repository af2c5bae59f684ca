use std::{sync::Arc, time::Duration as StdDuration};

use tokio_util::sync::CancellationToken;

use wp_config::Config;
use wp_service::{
	EmbeddingProvider,
	index_writer::IndexWriter,
	pg::{PgRefreshQueue, PgStore},
	refresh::{self, RefreshPolicy, RefreshQueue},
};
use wp_storage::{db::Db, refresh_outbox};

use crate::Result;

const BACKLOG_REPORT_INTERVAL: StdDuration = StdDuration::from_secs(60);

pub struct WorkerState {
	pub db: Db,
	pub queue: Arc<dyn RefreshQueue>,
	pub writer: Arc<IndexWriter>,
	pub policy: RefreshPolicy,
}
impl WorkerState {
	pub fn new(config: &Config, db: Db, embedding: Arc<dyn EmbeddingProvider>) -> Self {
		let store = Arc::new(PgStore::new(db.clone()));
		let policy = RefreshPolicy::from_config(&config.indexing);
		let queue = Arc::new(PgRefreshQueue::new(db.clone(), policy.lease));
		let writer = Arc::new(IndexWriter::new(
			config.providers.embedding.clone(),
			config.indexing.batch_size,
			store.clone(),
			store,
			embedding,
		));

		Self { db, queue, writer, policy }
	}
}

/// Runs the refresh workers until `shutdown` fires, reporting the outbox backlog periodically.
pub async fn run_worker(state: WorkerState, shutdown: CancellationToken) -> Result<()> {
	let WorkerState { db, queue, writer, policy } = state;

	tracing::info!(workers = policy.workers, "Index refresh worker starting.");

	let workers = tokio::spawn(refresh::run_workers(queue, writer, policy, shutdown.clone()));
	let mut ticker = tokio::time::interval(BACKLOG_REPORT_INTERVAL);

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			_ = ticker.tick() => {
				if let Err(err) = report_backlog(&db).await {
					tracing::error!(error = %err, "Refresh outbox backlog report failed.");
				}
			},
		}
	}

	workers.await?;

	tracing::info!("Index refresh worker stopped.");

	Ok(())
}

async fn report_backlog(db: &Db) -> Result<()> {
	let pending = refresh_outbox::count_by_status(db, "PENDING").await?;
	let failed = refresh_outbox::count_by_status(db, "FAILED").await?;
	let dead = refresh_outbox::count_by_status(db, "DEAD").await?;

	if dead > 0 {
		tracing::warn!(pending, failed, dead, "Refresh outbox holds dead-lettered jobs.");
	} else {
		tracing::info!(pending, failed, "Refresh outbox backlog.");
	}

	Ok(())
}
