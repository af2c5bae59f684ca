use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use wp_domain::ErrorCode;
use wp_testkit::{
	ChatScript, StaticEntitlements, TestAssistant,
	fixtures::{ALICE, BOB, test_config, trip, user},
};

use super::{ask, run_turn};

#[tokio::test]
async fn disabled_assistant_is_an_auth_error() {
	let harness = TestAssistant::with_entitlements(
		test_config(),
		StaticEntitlements { assistant_enabled: false, preferences_entitled: true, fail: false },
	);
	let turn = run_turn(&harness, ALICE, &ask("Hi")).await;

	assert_eq!(turn.error_code(), Some(ErrorCode::AuthError));
	assert!(harness.chat.requests().is_empty());
}

#[tokio::test]
async fn exhausted_daily_quota_is_distinct_and_not_retryable() {
	let mut cfg = test_config();

	cfg.session.daily_quota = 3;

	let harness = TestAssistant::new(cfg);

	harness.ledger.seed(&trip(), &user(ALICE), 3, OffsetDateTime::now_utc());

	let cancel = CancellationToken::new();
	let reply = harness.assistant.session.respond(&user(ALICE), &ask("Hi"), &cancel).await;

	assert!(!reply.success);
	assert!(!reply.retryable);
	assert_eq!(reply.code, Some(ErrorCode::QuotaExceeded));
	assert!(harness.chat.requests().is_empty());

	harness.chat.push("primary", ChatScript::text("Hello Bob."));

	let other = harness.assistant.session.respond(&user(BOB), &ask("Hi"), &cancel).await;

	assert!(other.success);
}

#[tokio::test]
async fn yesterdays_turns_do_not_count_against_today() {
	let mut cfg = test_config();

	cfg.session.daily_quota = 1;

	let harness = TestAssistant::new(cfg);

	let two_days_ago = OffsetDateTime::now_utc() - time::Duration::days(2);

	harness.ledger.seed(&trip(), &user(ALICE), 5, two_days_ago);
	harness.chat.push("primary", ChatScript::text("Hello again."));

	let turn = run_turn(&harness, ALICE, &ask("Hi")).await;

	assert!(turn.result.is_ok());
}

#[tokio::test]
async fn per_minute_limit_returns_rate_limit() {
	let mut cfg = test_config();

	cfg.session.per_minute_limit = 1;

	let harness = TestAssistant::new(cfg);

	harness.chat.push("primary", ChatScript::text("First."));

	let first = run_turn(&harness, ALICE, &ask("Hi")).await;
	let second = run_turn(&harness, ALICE, &ask("Hi again")).await;

	assert!(first.result.is_ok());
	assert_eq!(second.error_code(), Some(ErrorCode::RateLimit));
	assert_eq!(harness.chat.requests().len(), 1);
}

#[tokio::test]
async fn blank_or_oversized_messages_are_rejected() {
	let mut cfg = test_config();

	cfg.session.max_message_chars = 20;

	let harness = TestAssistant::new(cfg);
	let blank = run_turn(&harness, ALICE, &ask("   ")).await;
	let long = run_turn(&harness, ALICE, &ask(&"a".repeat(21))).await;

	assert!(matches!(blank.result, Err(wp_service::Error::Validation { .. })));
	assert!(matches!(long.result, Err(wp_service::Error::Validation { .. })));
	assert!(harness.chat.requests().is_empty());
}

#[tokio::test]
async fn completed_turns_are_recorded_with_pii_redacted() {
	let harness = TestAssistant::new(test_config());

	harness.chat.push("primary", ChatScript::text("I will not email anyone."));

	let turn = run_turn(&harness, ALICE, &ask("Email the itinerary to ana@example.com")).await;

	assert!(turn.result.is_ok());

	let turns = harness.ledger.turns();
	let recorded = turns.first().expect("Expected one recorded turn.");

	assert_eq!(turns.len(), 1);
	assert_eq!(recorded.workspace_id, trip());
	assert_eq!(recorded.user_id, user(ALICE));
	assert_eq!(recorded.outcome_code, "ok");
	assert!(!recorded.user_message.contains("ana@example.com"));
	assert_eq!(recorded.answer, "I will not email anyone.");
}

#[tokio::test]
async fn failed_turns_are_recorded_with_their_code() {
	let harness = TestAssistant::new(test_config());

	harness.chat.push("primary", ChatScript::Reject(402));

	let turn = run_turn(&harness, ALICE, &ask("Hi")).await;

	assert_eq!(turn.error_code(), Some(ErrorCode::PaymentRequired));

	let turns = harness.ledger.turns();

	assert_eq!(turns.len(), 1);
	assert_eq!(turns[0].outcome_code, "payment_required");
	assert!(turns[0].answer.is_empty());
}

#[tokio::test]
async fn ledger_outage_does_not_fail_the_turn() {
	let harness = TestAssistant::new(test_config());

	harness.ledger.fail_writes();
	harness.chat.push("primary", ChatScript::text("Still here."));

	let turn = run_turn(&harness, ALICE, &ask("Hi")).await;

	assert_eq!(turn.result.expect("Turn should succeed."), "Still here.");
}
