use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use wp_config::Postgres;
use wp_domain::{
	RefreshJob, SourceSelector, SourceType, workspace::NewTask,
};
use wp_service::{
	index_writer::IndexWriter,
	pg::{PgRefreshQueue, PgStore},
	refresh::RefreshQueue,
	retrieval::HybridRetriever,
	session::{SessionTurn, UsageLedger},
	store::WorkspaceStore,
};
use wp_storage::db::Db;
use wp_testkit::{
	HashEmbedding, TestDatabase,
	fixtures::{ALICE, EMBEDDING_DIM, OUTSIDER, other_trip, test_config, trip, user},
};

async fn open(test_db: &TestDatabase) -> Db {
	let db = Db::connect(&Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 })
		.await
		.expect("Failed to connect to the test database.");

	db.ensure_schema(EMBEDDING_DIM as u32).await.expect("Failed to apply the schema.");

	db
}

async fn seed(db: &Db) {
	let now = OffsetDateTime::now_utc();
	let statements = [
		"INSERT INTO trips (trip_id, name) VALUES ('trip-lisbon', 'Lisbon Getaway'), \
		 ('trip-oslo', 'Oslo Winter')",
		"INSERT INTO trip_members (trip_id, user_id, display_name) VALUES \
		 ('trip-lisbon', 'u-alice', 'Alice'), ('trip-lisbon', 'u-bob', 'Bob'), \
		 ('trip-oslo', 'u-olga', 'Olga')",
	];

	for statement in statements {
		sqlx::query(statement).execute(&db.pool).await.expect("Failed to seed trips.");
	}

	for (id, trip_id, content, encrypted) in [
		("m-1", "trip-lisbon", "Dinner at Cervejaria Ramiro at 8pm", false),
		("m-3", "trip-lisbon", "Apartment door code is 4411", true),
		("m-oslo-1", "trip-oslo", "Secret dinner plan: sauna at Kok then dinner", false),
	] {
		sqlx::query(
			"\
INSERT INTO trip_messages (message_id, trip_id, author_id, author_name, content, is_encrypted, sent_at)
VALUES ($1, $2, 'u-x', 'Someone', $3, $4, $5)",
		)
		.bind(id)
		.bind(trip_id)
		.bind(content)
		.bind(encrypted)
		.bind(now - Duration::hours(1))
		.execute(&db.pool)
		.await
		.expect("Failed to seed messages.");
	}
}

fn writer(store: Arc<PgStore>) -> IndexWriter {
	IndexWriter::new(
		test_config().providers.embedding,
		100,
		store.clone(),
		store,
		Arc::new(HashEmbedding::new(EMBEDDING_DIM)),
	)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set WP_PG_DSN to run."]
async fn pg_store_scopes_reads_and_membership() {
	let Some(base_dsn) = wp_testkit::env_dsn() else {
		eprintln!("Skipping pg_store_scopes_reads_and_membership; set WP_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open(&test_db).await;

	seed(&db).await;

	let store = PgStore::new(db.clone());
	let since = OffsetDateTime::now_utc() - Duration::days(1);

	assert!(store.is_member(&trip(), &user(ALICE)).await.expect("Membership lookup."));
	assert!(!store.is_member(&trip(), &user(OUTSIDER)).await.expect("Membership lookup."));

	let messages = store.recent_messages(&trip(), since, 50).await.expect("Message read.");

	assert!(messages.iter().all(|message| message.workspace_id == trip()));
	assert!(messages.iter().all(|message| message.message_id != "m-oslo-1"));

	let created = store
		.create_task(
			&trip(),
			&user(ALICE),
			&NewTask { title: "Buy sunscreen".to_string(), description: None, due_date: None },
		)
		.await
		.expect("Task insert.");
	let tasks = store.open_tasks(&trip(), 10).await.expect("Task read.");

	assert!(tasks.iter().any(|task| task.task_id == created.source_id));
	assert!(store.open_tasks(&other_trip(), 10).await.expect("Task read.").is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set WP_PG_DSN to run."]
async fn pg_index_round_trip_stays_in_workspace() {
	let Some(base_dsn) = wp_testkit::env_dsn() else {
		eprintln!("Skipping pg_index_round_trip_stays_in_workspace; set WP_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open(&test_db).await;

	seed(&db).await;

	let store = Arc::new(PgStore::new(db.clone()));
	let writer = writer(store.clone());

	for workspace_id in [trip(), other_trip()] {
		writer.refresh(&workspace_id, None, &SourceSelector::All).await.expect("Refresh.");
	}

	let again = writer.refresh(&trip(), None, &SourceSelector::All).await.expect("Refresh.");

	assert_eq!(again.processed, 0);
	assert_eq!(again.skipped, 1);

	let cfg = test_config();
	let retriever = HybridRetriever::new(
		cfg.retrieval,
		cfg.providers.embedding,
		Arc::new(HashEmbedding::new(EMBEDDING_DIM)),
		store,
	);
	let candidates = retriever.search(&trip(), "dinner plan").await.expect("Search.");

	assert!(candidates.iter().any(|candidate| candidate.source_id == "m-1"));
	assert!(candidates.iter().all(|candidate| candidate.source_id != "m-oslo-1"));
	assert!(candidates.iter().all(|candidate| candidate.source_id != "m-3"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set WP_PG_DSN to run."]
async fn pg_queue_leases_retries_and_dead_letters() {
	let Some(base_dsn) = wp_testkit::env_dsn() else {
		eprintln!("Skipping pg_queue_leases_retries_and_dead_letters; set WP_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open(&test_db).await;
	let queue = PgRefreshQueue::new(db.clone(), Duration::seconds(30));
	let job = RefreshJob::new(trip(), Some(SourceType::Message), SourceSelector::One("m-1".into()));

	queue.enqueue(&job).await.expect("Enqueue.");

	let claimed = queue.claim().await.expect("Claim.").expect("Expected a runnable job.");

	assert_eq!(claimed.job.workspace_id, trip());
	assert_eq!(claimed.job.selector, SourceSelector::One("m-1".to_string()));
	assert!(queue.claim().await.expect("Second claim.").is_none());

	queue
		.fail(&claimed, "temporary", Some(OffsetDateTime::now_utc() - Duration::seconds(1)))
		.await
		.expect("Fail with retry.");

	let retried = queue.claim().await.expect("Claim.").expect("Expected the retried job.");

	assert_eq!(retried.attempts, 1);

	queue.fail(&retried, "permanent", None).await.expect("Dead-letter.");

	assert!(queue.claim().await.expect("Claim.").is_none());
	assert_eq!(
		wp_storage::refresh_outbox::count_by_status(&db, "DEAD").await.expect("Count."),
		1
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set WP_PG_DSN to run."]
async fn pg_ledger_counts_turns_per_user() {
	let Some(base_dsn) = wp_testkit::env_dsn() else {
		eprintln!("Skipping pg_ledger_counts_turns_per_user; set WP_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open(&test_db).await;
	let store = PgStore::new(db);
	let now = OffsetDateTime::now_utc();
	let turn = SessionTurn {
		workspace_id: trip(),
		user_id: user(ALICE),
		outcome_code: "ok".to_string(),
		user_message: "hello".to_string(),
		answer: "hi".to_string(),
		tool_names: vec!["create_task".to_string()],
		latency_ms: 12,
		created_at: now,
	};

	store.record(&turn).await.expect("Record.");
	store.record(&turn).await.expect("Record.");

	let since = now - Duration::minutes(1);

	assert_eq!(store.count_since(&user(ALICE), since).await.expect("Count."), 2);
	assert_eq!(store.count_since(&user(OUTSIDER), since).await.expect("Count."), 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
