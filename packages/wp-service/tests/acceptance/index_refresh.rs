use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use wp_domain::{RefreshJob, SourceSelector, SourceType};
use wp_service::{
	EmbeddingProvider,
	index_writer::IndexWriter,
	refresh::{self, MemoryRefreshQueue, RefreshPolicy, RefreshQueue},
	store::{EmbeddingIndex, WorkspaceStore},
};
use wp_testkit::{
	FailingEmbedding, HashEmbedding, MemoryEmbeddingIndex, TestAssistant,
	fixtures::{EMBEDDING_DIM, seeded_store, test_config, trip},
};

struct Rig {
	store: Arc<wp_testkit::MemoryWorkspaceStore>,
	index: Arc<MemoryEmbeddingIndex>,
	writer: IndexWriter,
}

fn rig_with(embedding: Arc<dyn EmbeddingProvider>, batch_size: u32) -> Rig {
	let cfg = test_config();
	let store = Arc::new(seeded_store());
	let index = Arc::new(MemoryEmbeddingIndex::new());
	let writer = IndexWriter::new(
		cfg.providers.embedding,
		batch_size,
		store.clone() as Arc<dyn WorkspaceStore>,
		index.clone() as Arc<dyn EmbeddingIndex>,
		embedding,
	);

	Rig { store, index, writer }
}

fn rig() -> Rig {
	rig_with(Arc::new(HashEmbedding::new(EMBEDDING_DIM)), 100)
}

fn policy(max_attempts: i32) -> RefreshPolicy {
	let mut cfg = test_config().indexing;

	cfg.max_attempts = max_attempts;
	cfg.base_backoff_ms = 0;
	cfg.max_backoff_ms = 0;
	cfg.poll_interval_ms = 10;
	cfg.workers = 2;

	RefreshPolicy::from_config(&cfg)
}

#[tokio::test]
async fn refreshing_twice_keeps_one_record_per_item() {
	let rig = rig();
	let first =
		rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("First refresh.");
	let count = rig.index.len();
	let second =
		rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Second refresh.");

	// Eight public rows: two messages plus one of every other source type.
	assert_eq!(first.processed, 8);
	assert_eq!(count, 8);
	assert_eq!(second.processed, 0);
	assert_eq!(second.skipped, 8);
	assert_eq!(rig.index.len(), 8);

	let single = rig
		.writer
		.refresh(&trip(), Some(SourceType::Message), &SourceSelector::One("m-1".to_string()))
		.await
		.expect("Single refresh.");

	assert_eq!(single.processed, 1);
	assert_eq!(rig.index.records(&trip()).iter().filter(|r| r.source_id == "m-1").count(), 1);
}

#[tokio::test]
async fn edited_rows_are_re_embedded() {
	let rig = rig();

	rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Initial refresh.");
	rig.store.edit(&trip(), |data| {
		data.tasks[0].title = "Book airport transfer for six".to_string();
		data.tasks[0].updated_at = OffsetDateTime::now_utc();
	});

	let report =
		rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Second refresh.");
	let record = rig.index.get(&trip(), SourceType::Task, "t-1").expect("Task record exists.");

	assert_eq!(report.processed, 1);
	assert_eq!(report.per_type.get(&SourceType::Task), Some(&1));
	assert!(record.content_text.contains("for six"));
}

#[tokio::test]
async fn deleted_and_newly_private_rows_are_pruned() {
	let rig = rig();

	rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Initial refresh.");
	rig.store.edit(&trip(), |data| {
		data.links.clear();
		data.messages
			.iter_mut()
			.filter(|m| m.message_id == "m-2")
			.for_each(|m| m.is_encrypted = true);
	});

	let one = rig
		.writer
		.refresh(&trip(), Some(SourceType::Message), &SourceSelector::One("m-2".to_string()))
		.await
		.expect("Single refresh.");
	let all = rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Full refresh.");

	assert_eq!(one.pruned, 1);
	assert_eq!(all.pruned, 1);
	assert!(rig.index.get(&trip(), SourceType::Message, "m-2").is_none());
	assert!(rig.index.get(&trip(), SourceType::Link, "l-1").is_none());
}

#[tokio::test]
async fn batch_cap_reports_remaining_items() {
	let rig = rig_with(Arc::new(HashEmbedding::new(EMBEDDING_DIM)), 3);
	let report = rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Refresh.");

	assert_eq!(report.processed, 3);
	assert_eq!(report.remaining, 5);
}

#[tokio::test]
async fn rejected_batch_falls_back_to_single_items() {
	let embedding = Arc::new(HashEmbedding::rejecting_batches(EMBEDDING_DIM));
	let rig = rig_with(embedding.clone(), 100);
	let report = rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Refresh.");

	assert_eq!(report.processed, 8);
	assert_eq!(report.failed, 0);
	assert_eq!(embedding.calls(), 9);
	assert_eq!(embedding.texts_embedded(), 8);
}

#[tokio::test]
async fn dimension_mismatch_fails_items_without_writing() {
	let rig = rig_with(Arc::new(HashEmbedding::new(EMBEDDING_DIM + 1)), 100);
	let report = rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Refresh.");

	assert_eq!(report.processed, 0);
	assert_eq!(report.failed, 8);
	assert!(rig.index.is_empty());
}

#[tokio::test]
async fn one_failed_upsert_does_not_sink_its_siblings() {
	let rig = rig();

	rig.index.fail_upsert_of("e-1");

	let report = rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Refresh.");

	assert_eq!(report.processed, 7);
	assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn older_versions_never_overwrite_newer_records() {
	let rig = rig();

	rig.writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Initial refresh.");

	let mut newer = rig.index.get(&trip(), SourceType::Poll, "p-1").expect("Poll record exists.");

	newer.source_updated_at = OffsetDateTime::now_utc() + time::Duration::days(1);
	newer.content_text = "newer".to_string();

	rig.index.insert(newer);

	let report = rig
		.writer
		.refresh(&trip(), Some(SourceType::Poll), &SourceSelector::One("p-1".to_string()))
		.await
		.expect("Single refresh.");

	assert_eq!(report.skipped, 1);
	assert_eq!(
		rig.index.get(&trip(), SourceType::Poll, "p-1").map(|record| record.content_text),
		Some("newer".to_string())
	);
}

#[tokio::test]
async fn store_outage_fails_the_refresh() {
	let rig = rig();

	rig.store.fail("sources");

	assert!(rig.writer.refresh(&trip(), None, &SourceSelector::All).await.is_err());
}

#[tokio::test]
async fn process_once_completes_jobs_and_queues_follow_ups() {
	let rig = rig_with(Arc::new(HashEmbedding::new(EMBEDDING_DIM)), 5);
	let queue = MemoryRefreshQueue::default();

	queue
		.enqueue(&RefreshJob::new(trip(), None, SourceSelector::All))
		.await
		.expect("Enqueue should succeed.");

	assert!(refresh::process_once(&queue, &rig.writer, &policy(3)).await.expect("First pass."));

	let pending = queue.pending_jobs().await;

	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0].selector, SourceSelector::All);
	assert!(refresh::process_once(&queue, &rig.writer, &policy(3)).await.expect("Second pass."));
	assert!(queue.is_empty().await);
	assert_eq!(rig.index.len(), 8);
	assert!(!refresh::process_once(&queue, &rig.writer, &policy(3)).await.expect("Idle pass."));
}

#[tokio::test]
async fn failing_jobs_retry_then_dead_letter() {
	let rig = rig_with(Arc::new(FailingEmbedding { status: 503 }), 100);
	let queue = MemoryRefreshQueue::default();
	let policy = policy(2);

	queue
		.enqueue(&RefreshJob::new(trip(), Some(SourceType::Task), SourceSelector::All))
		.await
		.expect("Enqueue should succeed.");

	assert!(refresh::process_once(&queue, &rig.writer, &policy).await.expect("First attempt."));
	assert_eq!(queue.len().await, 1);

	tokio::time::sleep(Duration::from_millis(5)).await;

	assert!(refresh::process_once(&queue, &rig.writer, &policy).await.expect("Second attempt."));
	assert!(queue.is_empty().await);

	let dead = queue.dead_letters().await;

	assert_eq!(dead.len(), 1);
	assert_eq!(dead[0].attempts, 2);
}

#[tokio::test]
async fn workers_drain_the_queue_until_shutdown() {
	let harness = TestAssistant::new(test_config());
	let shutdown = CancellationToken::new();

	for selector in ["m-1", "e-1", "pl-1"] {
		let source_type = match selector {
			"m-1" => SourceType::Message,
			"e-1" => SourceType::Event,
			_ => SourceType::Place,
		};

		harness
			.queue
			.enqueue(&RefreshJob::new(
				trip(),
				Some(source_type),
				SourceSelector::One(selector.to_string()),
			))
			.await
			.expect("Enqueue should succeed.");
	}

	let workers = tokio::spawn(refresh::run_workers(
		harness.queue.clone(),
		harness.assistant.writer.clone(),
		policy(3),
		shutdown.clone(),
	));

	for _ in 0..100 {
		if harness.queue.is_empty().await {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	shutdown.cancel();
	workers.await.expect("Workers should stop cleanly.");

	assert!(harness.queue.is_empty().await);
	assert_eq!(harness.index.records(&trip()).len(), 3);
}
