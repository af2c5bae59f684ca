use wp_domain::{ErrorCode, SourceSelector};
use wp_service::context::ContextAssembler;
use wp_testkit::{
	ChatScript, TestAssistant,
	fixtures::{ALICE, OTHER_TRIP, OUTSIDER, other_trip, test_config, trip, user},
};

use super::{ask, ask_in, prompt_text, run_turn};

#[tokio::test]
async fn non_member_is_rejected_before_retrieval_or_model() {
	let harness = TestAssistant::new(test_config());

	harness.index_all().await.expect("Failed to index seeded trips.");

	let embeds_before = harness.embedding.calls();
	let turn = run_turn(&harness, OUTSIDER, &ask("What time is dinner?")).await;

	assert_eq!(turn.error_code(), Some(ErrorCode::ForbiddenCrossWorkspace));
	assert!(matches!(turn.result, Err(wp_service::Error::Forbidden { .. })));
	assert_eq!(harness.embedding.calls(), embeds_before);
	assert!(harness.chat.requests().is_empty());
	assert!(harness.ledger.turns().is_empty());
}

#[tokio::test]
async fn non_member_reply_uses_the_fixed_message() {
	let harness = TestAssistant::new(test_config());
	let cancel = tokio_util::sync::CancellationToken::new();
	let reply = harness
		.assistant
		.session
		.respond(&user(ALICE), &ask_in(OTHER_TRIP, "hello"), &cancel)
		.await;

	assert!(!reply.success);
	assert!(!reply.retryable);
	assert_eq!(reply.code, Some(ErrorCode::ForbiddenCrossWorkspace));
	assert_eq!(reply.response, ErrorCode::ForbiddenCrossWorkspace.user_message());
}

#[tokio::test]
async fn leaking_store_rows_never_reach_the_snapshot() {
	let harness = TestAssistant::new(test_config());

	harness.store.leak_foreign_rows();

	let assembler = ContextAssembler::new(harness.cfg.context.clone(), harness.store.clone());
	let snapshot = assembler.build(&trip(), &user(ALICE), true).await;

	assert!(!snapshot.has_foreign_rows(&trip()));
	assert!(
		snapshot
			.messages
			.iter()
			.flatten()
			.all(|message| !message.content.contains("Secret dinner plan"))
	);
	assert!(snapshot.places.iter().flatten().all(|place| place.place_id != "pl-oslo-1"));
}

#[tokio::test]
async fn leaking_index_hits_never_reach_the_prompt() {
	let harness = TestAssistant::new(test_config());

	harness.index_all().await.expect("Failed to index seeded trips.");
	harness.index.leak_foreign_hits();
	harness.store.leak_foreign_rows();
	harness.chat.push("primary", ChatScript::text("Dinner is at 8pm at Cervejaria Ramiro."));

	let turn = run_turn(&harness, ALICE, &ask("Where is dinner tonight?")).await;

	assert!(turn.result.is_ok());

	let prompt = prompt_text(&harness);

	assert!(prompt.contains("Cervejaria Ramiro"));
	assert!(!prompt.contains("Secret dinner plan"));
	assert!(!prompt.contains("Kok Oslo sauna"));
}

#[tokio::test]
async fn index_writer_ignores_rows_of_other_workspaces() {
	let harness = TestAssistant::new(test_config());

	harness.store.leak_foreign_rows();
	harness
		.assistant
		.writer
		.refresh(&trip(), None, &SourceSelector::All)
		.await
		.expect("Failed to refresh the trip index.");

	assert!(harness.index.records(&other_trip()).is_empty());
	assert!(harness.index.records(&trip()).iter().all(|record| record.workspace_id == trip()));
}

#[tokio::test]
async fn private_messages_are_neither_indexed_nor_rendered() {
	let harness = TestAssistant::new(test_config());

	harness.index_all().await.expect("Failed to index seeded trips.");
	harness.chat.push("primary", ChatScript::text("I cannot share door codes."));

	assert!(harness.index.get(&trip(), wp_domain::SourceType::Message, "m-3").is_none());
	assert!(harness.index.get(&trip(), wp_domain::SourceType::Message, "m-1").is_some());

	let turn = run_turn(&harness, ALICE, &ask("What is the apartment door code?")).await;

	assert!(turn.result.is_ok());
	assert!(!prompt_text(&harness).contains("4411"));
}
