use std::time::Duration;

use time::OffsetDateTime;

use wp_domain::{
	ContextSnapshot,
	workspace::{ChatMessage, PrivacyMode},
};
use wp_service::context::{ContextAssembler, render_context};
use wp_testkit::{
	ChatScript, StaticEntitlements, TestAssistant,
	fixtures::{ALICE, BOB, test_config, trip, user},
};

use super::{ask, prompt_text, run_turn};

fn assembler(harness: &TestAssistant) -> ContextAssembler {
	ContextAssembler::new(harness.cfg.context.clone(), harness.store.clone())
}

fn bob_says(id: &str, content: &str, sent_at: OffsetDateTime) -> ChatMessage {
	ChatMessage {
		workspace_id: trip(),
		message_id: id.to_string(),
		author_name: "Bob".to_string(),
		content: content.to_string(),
		sent_at,
		is_encrypted: false,
		privacy: PrivacyMode::Standard,
		updated_at: sent_at,
	}
}

fn message_ids(snapshot: &ContextSnapshot) -> Vec<String> {
	snapshot.messages.iter().flatten().map(|message| message.message_id.clone()).collect()
}

#[tokio::test]
async fn failed_categories_are_omitted_not_fatal() {
	let harness = TestAssistant::new(test_config());

	harness.store.fail("calendar");
	harness.store.fail("payments");

	let snapshot = assembler(&harness).build(&trip(), &user(ALICE), true).await;

	assert_eq!(snapshot.omitted, vec!["calendar", "payments"]);
	assert!(snapshot.events.is_none());
	assert!(snapshot.payments.is_none());
	assert_eq!(snapshot.tasks.as_ref().map(Vec::len), Some(1));
	assert!(snapshot.meta.is_some());
}

#[tokio::test]
async fn slow_category_times_out_without_stalling_the_rest() {
	let harness = TestAssistant::new(test_config());

	harness.store.delay("polls", Duration::from_secs(5));

	let started = std::time::Instant::now();
	let snapshot = assembler(&harness).build(&trip(), &user(ALICE), true).await;

	assert!(started.elapsed() < Duration::from_secs(2));
	assert_eq!(snapshot.omitted, vec!["polls"]);
	assert!(snapshot.messages.is_some());
}

#[tokio::test]
async fn preferences_need_the_entitlement() {
	let harness = TestAssistant::new(test_config());
	let entitled = assembler(&harness).build(&trip(), &user(ALICE), true).await;
	let not_entitled = assembler(&harness).build(&trip(), &user(ALICE), false).await;

	assert!(entitled.preferences.is_some_and(|prefs| prefs.dietary == ["vegetarian"]));
	assert!(not_entitled.preferences.is_none());
	assert!(not_entitled.omitted.is_empty());
}

#[tokio::test]
async fn rendered_context_respects_the_ceiling_for_huge_workspaces() {
	let mut cfg = test_config();

	cfg.context.max_chars = 2_000;

	let harness = TestAssistant::new(cfg);
	let now = OffsetDateTime::now_utc();

	harness.store.edit(&trip(), |data| {
		for n in 0..500 {
			let content = format!("Message number {n} about the itinerary and the restaurant list.");

			data.messages.push(bob_says(
				&format!("bulk-{n}"),
				&content,
				now - time::Duration::minutes(n),
			));
		}
	});

	let snapshot = assembler(&harness).build(&trip(), &user(BOB), false).await;
	let rendered = render_context(&snapshot, 2_000);

	assert_eq!(
		snapshot.messages.as_ref().map(Vec::len),
		Some(harness.cfg.context.message_cap as usize)
	);
	assert!(rendered.chars().count() <= 2_000);
}

#[tokio::test]
async fn quiet_chat_widens_to_the_extended_window() {
	let harness = TestAssistant::new(test_config());
	let now = OffsetDateTime::now_utc();

	let five_days_ago = now - time::Duration::days(5);

	harness.store.edit(&trip(), |data| {
		data.messages.push(bob_says("old-1", "Booked the Sintra day trip", five_days_ago));
		data.messages.push(bob_says("ancient-1", "Trip idea", now - time::Duration::days(30)));
	});

	let snapshot = assembler(&harness).build(&trip(), &user(BOB), false).await;
	let ids = message_ids(&snapshot);

	assert_eq!(ids, ["old-1", "m-1", "m-2"]);
}

#[tokio::test]
async fn busy_chat_keeps_to_the_recent_window() {
	let harness = TestAssistant::new(test_config());
	let cap = harness.cfg.context.message_cap as i64;
	let now = OffsetDateTime::now_utc();
	let five_days_ago = now - time::Duration::days(5);

	harness.store.edit(&trip(), |data| {
		for n in 0..cap {
			data.messages.push(bob_says(
				&format!("busy-{n}"),
				"See you at the station",
				now - time::Duration::seconds(n + 1),
			));
		}

		data.messages.push(bob_says("old-1", "Booked the Sintra day trip", five_days_ago));
	});

	let snapshot = assembler(&harness).build(&trip(), &user(BOB), false).await;
	let ids = message_ids(&snapshot);

	assert!(ids.len() <= cap as usize);
	assert!(ids.iter().all(|id| id != "old-1"));
}

#[tokio::test]
async fn context_timeout_still_answers() {
	let mut cfg = test_config();

	cfg.session.context_timeout_ms = 200;
	cfg.context.fetch_timeout_ms = 5_000;

	let harness = TestAssistant::new(cfg);

	harness.store.delay("trip", Duration::from_secs(3));
	harness.chat.push("primary", ChatScript::text("Here is what I know."));

	let started = std::time::Instant::now();
	let turn = run_turn(&harness, ALICE, &ask("What's next?")).await;

	assert!(started.elapsed() < Duration::from_secs(2));
	assert_eq!(turn.result.expect("Turn should succeed without context."), "Here is what I know.");
	assert!(!prompt_text(&harness).contains("Lisbon Getaway"));
}

#[tokio::test]
async fn preferences_reach_the_prompt_only_when_entitled() {
	let entitled = TestAssistant::new(test_config());
	let plain = TestAssistant::with_entitlements(
		test_config(),
		StaticEntitlements { assistant_enabled: true, preferences_entitled: false, fail: false },
	);

	for harness in [&entitled, &plain] {
		harness.chat.push("primary", ChatScript::text("Try the tasting menu."));

		let turn = run_turn(harness, ALICE, &ask("Where should we eat?")).await;

		assert!(turn.result.is_ok());
	}

	assert!(prompt_text(&entitled).contains("vegetarian"));
	assert!(!prompt_text(&plain).contains("vegetarian"));
}
