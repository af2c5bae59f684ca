use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use time::OffsetDateTime;

use wp_domain::{
	RankKind,
	workspace::{ChatMessage, PrivacyMode},
};
use wp_service::retrieval::HybridRetriever;
use wp_testkit::{
	ChatScript, FailingEmbedding, HashEmbedding, SlowEmbedding, TestAssistant,
	fixtures::{ALICE, EMBEDDING_DIM, test_config, trip},
};

use super::{ask, run_turn};

async fn indexed() -> TestAssistant {
	let harness = TestAssistant::new(test_config());

	harness.index_all().await.expect("Failed to index seeded trips.");

	harness
}

fn retriever_with(
	harness: &TestAssistant,
	embedding: Arc<dyn wp_service::EmbeddingProvider>,
) -> HybridRetriever {
	HybridRetriever::new(
		harness.cfg.retrieval.clone(),
		harness.cfg.providers.embedding.clone(),
		embedding,
		harness.index.clone(),
	)
}

#[tokio::test]
async fn busy_trip_query_stays_within_limits() {
	let harness = TestAssistant::new(test_config());
	let now = OffsetDateTime::now_utc();

	harness.store.edit(&trip(), |data| {
		for n in 0..120 {
			let sent_at = now - time::Duration::minutes(n);

			data.messages.push(ChatMessage {
				workspace_id: trip(),
				message_id: format!("chat-{n}"),
				author_name: "Bob".to_string(),
				content: format!(
					"Dinner option {n}: what time works for everyone? {}",
					"We could also walk along the river before heading to the restaurant. ".repeat(8)
				),
				sent_at,
				is_encrypted: false,
				privacy: PrivacyMode::Standard,
				updated_at: sent_at,
			});
		}
	});
	harness.index_all().await.expect("Failed to index the busy trip.");

	let candidates = retriever_with(&harness, harness.embedding.clone())
		.search(&trip(), "what time is dinner")
		.await
		.expect("Hybrid search should succeed.");

	assert!(!candidates.is_empty());
	assert!(candidates.len() <= 15);
	assert!(candidates.iter().all(|candidate| candidate.content_text.chars().count() <= 300));
	assert!(candidates.iter().all(|candidate| matches!(
		candidate.rank_kind,
		RankKind::Vector | RankKind::Keyword | RankKind::Both
	)));
}

#[tokio::test]
async fn both_signals_agree_on_the_dinner_message() {
	let harness = indexed().await;
	let candidates = retriever_with(&harness, harness.embedding.clone())
		.search(&trip(), "dinner Cervejaria Ramiro")
		.await
		.expect("Hybrid search should succeed.");
	let top = candidates.first().expect("Expected at least one candidate.");

	assert_eq!(top.source_id, "m-1");
	assert_eq!(top.rank_kind, RankKind::Both);
	assert!(candidates.iter().all(|candidate| candidate.source_id != "m-oslo-1"));
}

#[tokio::test]
async fn embedding_outage_degrades_to_keyword_only() {
	let harness = indexed().await;
	let candidates = retriever_with(&harness, Arc::new(FailingEmbedding { status: 503 }))
		.search(&trip(), "dinner")
		.await
		.expect("Keyword results should survive an embedding outage.");

	assert!(candidates.iter().any(|candidate| candidate.source_id == "m-1"));
	assert!(candidates.iter().all(|candidate| candidate.rank_kind == RankKind::Keyword));
}

#[tokio::test]
async fn embedding_timeout_is_bounded_by_the_configured_timeout() {
	let harness = indexed().await;
	let slow =
		SlowEmbedding { delay: Duration::from_secs(10), inner: HashEmbedding::new(EMBEDDING_DIM) };
	let started = Instant::now();
	let candidates = retriever_with(&harness, Arc::new(slow))
		.search(&trip(), "dinner")
		.await
		.expect("Keyword results should survive an embedding timeout.");

	assert!(started.elapsed() < Duration::from_secs(2));
	assert!(candidates.iter().any(|candidate| candidate.source_id == "m-1"));
	assert!(candidates.iter().all(|candidate| candidate.rank_kind == RankKind::Keyword));
}

#[tokio::test]
async fn keyword_outage_keeps_vector_results() {
	let harness = indexed().await;

	harness.index.fail_keyword_search();

	let candidates = retriever_with(&harness, harness.embedding.clone())
		.search(&trip(), "dinner Cervejaria Ramiro")
		.await
		.expect("Vector results should survive a keyword outage.");

	assert!(candidates.iter().all(|candidate| candidate.rank_kind == RankKind::Vector));
	assert!(candidates.iter().any(|candidate| candidate.source_id == "m-1"));
}

#[tokio::test]
async fn both_branches_failing_is_an_error_but_the_turn_still_answers() {
	let harness = indexed().await;

	harness.index.fail_keyword_search();
	harness.index.fail_vector_search();

	assert!(
		retriever_with(&harness, harness.embedding.clone()).search(&trip(), "dinner").await.is_err()
	);

	harness.chat.push("primary", ChatScript::text("Dinner is at 8pm."));

	let turn = run_turn(&harness, ALICE, &ask("When is dinner?")).await;

	assert_eq!(turn.result.expect("Turn should succeed without snippets."), "Dinner is at 8pm.");
}

#[tokio::test]
async fn snippets_in_the_prompt_carry_score_and_icon() {
	let harness = indexed().await;

	harness.chat.push("primary", ChatScript::text("Dinner is at Cervejaria Ramiro."));

	let turn = run_turn(&harness, ALICE, &ask("dinner Cervejaria Ramiro")).await;

	assert!(turn.result.is_ok());

	let requests = harness.chat.requests();
	let system = &requests.first().expect("Expected one chat request.").1.messages[0].content;

	assert!(system.contains(&format!("{} (score ", wp_domain::SourceType::Message.icon())));
	assert!(system.contains("Cervejaria Ramiro"));
}
