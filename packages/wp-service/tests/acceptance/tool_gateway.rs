use std::{sync::Arc, time::Duration};

use serde_json::json;

use wp_domain::{SourceSelector, SourceType};
use wp_providers::chat::Role;
use wp_service::{
	refresh::RefreshQueue,
	tools::{Confirmation, ToolArgs, ToolContext, ToolError, ToolGateway, args_hash},
};
use wp_testkit::{
	ChatScript, TestAssistant,
	fixtures::{ALICE, BOB, OUTSIDER, test_config, trip, user},
};

use super::{ask, run_turn};

fn gateway(harness: &TestAssistant) -> ToolGateway {
	ToolGateway::new(
		harness.cfg.tools.clone(),
		harness.cfg.providers.places.clone(),
		harness.store.clone(),
		harness.places.clone(),
		Some(harness.queue.clone() as Arc<dyn RefreshQueue>),
	)
}

fn as_alice() -> ToolContext {
	ToolContext { workspace_id: trip(), user_id: user(ALICE), confirmation: None }
}

#[tokio::test]
async fn identity_override_is_rejected_even_for_a_real_member() {
	let harness = TestAssistant::new(test_config());
	let gateway = gateway(&harness);

	for key in ["user_id", "userId", "workspace_id", "tripId", "created_by", "owner_id"] {
		let mut args = json!({ "title": "Dinner", "start_time": "2026-11-03T20:00:00Z" });

		args[key] = json!(BOB);

		let err = gateway
			.execute(&as_alice(), "add_calendar_event", &args.to_string())
			.await
			.expect_err("Identity override must be rejected.");

		assert_eq!(err, ToolError::IdentityOverride { key: key.to_string() });
	}

	assert!(harness.store.writes().is_empty());
}

#[tokio::test]
async fn attacker_identity_never_takes_effect_through_the_model() {
	let harness = TestAssistant::new(test_config());

	harness.chat.push(
		"primary",
		ChatScript::tool_call(
			"add_calendar_event",
			json!({
				"title": "Dinner",
				"startTime": "2026-11-03T20:00:00Z",
				"user_id": "attacker-id",
			}),
		),
	);
	harness.chat.push("primary", ChatScript::text("I could not add that event."));

	let turn = run_turn(&harness, ALICE, &ask("Add dinner to the calendar")).await;

	assert!(turn.result.is_ok());
	assert!(harness.store.writes().is_empty());

	let requests = harness.chat.requests();
	let follow_up = &requests.get(1).expect("Expected a follow-up request.").1.messages;
	let tool_result = follow_up
		.iter()
		.find(|msg| msg.role == Role::Tool)
		.expect("Expected a tool result message.");

	assert!(tool_result.content.contains("identity_override"));
}

#[tokio::test]
async fn unknown_tools_and_fields_are_rejected_before_execution() {
	let harness = TestAssistant::new(test_config());
	let gateway = gateway(&harness);
	let unknown = gateway.execute(&as_alice(), "delete_trip", "{}").await;
	let extra_args = json!({ "title": "Pack", "priority": "high" });
	let extra = gateway.execute(&as_alice(), "create_task", &extra_args.to_string()).await;
	let malformed = gateway.execute(&as_alice(), "create_task", "{not json").await;

	assert!(matches!(unknown, Err(ToolError::UnknownTool { .. })));
	assert!(matches!(extra, Err(ToolError::Schema { .. })));
	assert!(matches!(malformed, Err(ToolError::Schema { .. })));
	assert!(harness.store.writes().is_empty());
}

#[tokio::test]
async fn non_members_cannot_run_tools() {
	let harness = TestAssistant::new(test_config());
	let ctx = ToolContext { workspace_id: trip(), user_id: user(OUTSIDER), confirmation: None };
	let result = gateway(&harness)
		.execute(&ctx, "create_task", &json!({ "title": "Pack" }).to_string())
		.await;

	assert_eq!(result, Err(ToolError::Forbidden));
	assert!(harness.store.writes().is_empty());
}

#[tokio::test]
async fn writes_use_the_session_identity_and_schedule_indexing() {
	let harness = TestAssistant::new(test_config());
	let value = gateway(&harness)
		.execute(&as_alice(), "create_task", &json!({ "title": "Buy sunscreen" }).to_string())
		.await
		.expect("Task creation should succeed.");

	assert_eq!(value["ok"], json!(true));

	let writes = harness.store.writes();
	let (workspace_id, created) = writes.first().expect("Expected one write.");

	assert_eq!(workspace_id, &trip());
	assert_eq!(created.source_type, SourceType::Task);
	assert_eq!(value["id"], json!(created.source_id));

	let mut pending = Vec::new();

	for _ in 0..50 {
		pending = harness.queue.pending_jobs().await;

		if !pending.is_empty() {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let job = pending.first().expect("Expected a refresh job for the new task.");

	assert_eq!(job.workspace_id, trip());
	assert_eq!(job.source_type, Some(SourceType::Task));
	assert_eq!(job.selector, SourceSelector::One(created.source_id.clone()));
}

#[tokio::test]
async fn record_payment_requires_a_matching_confirmation() {
	let harness = TestAssistant::new(test_config());
	let gateway = gateway(&harness);
	let raw = json!({
		"description": "Taxi from the airport",
		"amount": 38.5,
		"currency": "EUR",
		"split_with": [BOB],
	});
	let err = gateway
		.execute(&as_alice(), "record_payment", &raw.to_string())
		.await
		.expect_err("Payment must wait for confirmation.");
	let ToolError::ConfirmationRequired { args_hash: hash } = err else {
		panic!("Expected a confirmation request, got {err:?}.");
	};
	let parsed = ToolArgs::parse("record_payment", &raw).expect("Arguments should parse.");

	assert_eq!(hash, args_hash(&parsed));
	assert!(harness.store.writes().is_empty());

	let wrong = ToolContext {
		confirmation: Some(Confirmation {
			tool: "record_payment".to_string(),
			args_hash: "0".repeat(hash.len()),
		}),
		..as_alice()
	};

	assert!(matches!(
		gateway.execute(&wrong, "record_payment", &raw.to_string()).await,
		Err(ToolError::ConfirmationRequired { .. })
	));

	let confirmed = ToolContext {
		confirmation: Some(Confirmation { tool: "record_payment".to_string(), args_hash: hash }),
		..as_alice()
	};
	let value = gateway
		.execute(&confirmed, "record_payment", &raw.to_string())
		.await
		.expect("Confirmed payment should be recorded.");

	assert_eq!(value["ok"], json!(true));

	let payment = harness
		.store
		.data(&trip())
		.payments
		.into_iter()
		.find(|payment| payment.description == "Taxi from the airport")
		.expect("Expected the new payment row.");

	assert_eq!(payment.amount_cents, 3_850);
	assert_eq!(payment.split_count, 2);
	assert_eq!(payment.paid_by, "Alice");
}

#[tokio::test]
async fn payment_confirmation_survives_an_empty_confirmation_list() {
	let mut cfg = test_config();

	cfg.tools.confirmation_required.clear();

	let harness = TestAssistant::new(cfg);
	let gateway = gateway(&harness);
	let raw = json!({ "description": "Dinner", "amount": 60, "currency": "EUR" });
	let result = gateway.execute(&as_alice(), "record_payment", &raw.to_string()).await;

	assert!(gateway.requires_confirmation("record_payment"));
	assert!(!gateway.requires_confirmation("create_task"));
	assert!(matches!(result, Err(ToolError::ConfirmationRequired { .. })));
	assert!(harness.store.writes().is_empty());
}

#[tokio::test]
async fn split_with_must_name_trip_members() {
	let harness = TestAssistant::new(test_config());
	let raw = json!({
		"description": "Museum tickets",
		"amount": 24,
		"currency": "EUR",
		"split_with": [OUTSIDER],
	});
	let parsed = ToolArgs::parse("record_payment", &raw).expect("Arguments should parse.");
	let confirmed = ToolContext {
		confirmation: Some(Confirmation {
			tool: "record_payment".to_string(),
			args_hash: args_hash(&parsed),
		}),
		..as_alice()
	};
	let result = gateway(&harness).execute(&confirmed, "record_payment", &raw.to_string()).await;

	assert!(matches!(result, Err(ToolError::Schema { .. })));
	assert!(harness.store.writes().is_empty());
}

#[tokio::test]
async fn payment_summary_totals_only_this_trip() {
	let harness = TestAssistant::new(test_config());

	harness.store.leak_foreign_rows();

	let value = gateway(&harness)
		.execute(&as_alice(), "get_payment_summary", "")
		.await
		.expect("Payment summary should succeed.");

	assert_eq!(value["outstanding"]["EUR"], json!("420.00"));
	assert_eq!(value["recent"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn place_tools_hit_the_places_backend() {
	let harness = TestAssistant::new(test_config());
	let gateway = gateway(&harness);
	let search_args = json!({ "query": "pastries", "near": "Belem" });
	let search = gateway
		.execute(&as_alice(), "search_places", &search_args.to_string())
		.await
		.expect("Place search should succeed.");
	let details = gateway
		.execute(&as_alice(), "get_place_details", &json!({ "placeId": "gp-1" }).to_string())
		.await
		.expect("Place details should succeed.");
	let bad_mode = gateway
		.execute(
			&as_alice(),
			"get_directions",
			&json!({ "origin": "Rossio", "destination": "Belem", "mode": "teleport" }).to_string(),
		)
		.await;

	assert_eq!(search["results"][0]["name"], json!("Pasteis de Belem"));
	assert_eq!(details["place"]["rating"], json!(4.7));
	assert!(matches!(bad_mode, Err(ToolError::Schema { .. })));
	assert_eq!(harness.places.calls(), 2);
}

#[tokio::test]
async fn tool_turns_are_bounded() {
	let mut cfg = test_config();

	cfg.orchestrator.max_tool_turns = 2;

	let harness = TestAssistant::new(cfg);

	for _ in 0..2 {
		harness.chat.push("primary", ChatScript::tool_call("get_payment_summary", json!({})));
	}

	harness.chat.push("primary", ChatScript::text("You owe 210 EUR."));

	let turn = run_turn(&harness, ALICE, &ask("How much do I owe?")).await;

	assert_eq!(turn.result.expect("Turn should succeed."), "You owe 210 EUR.");

	let requests = harness.chat.requests();

	assert_eq!(requests.len(), 3);
	assert!(requests[2].1.tools.is_empty());
	assert_eq!(
		harness.ledger.turns()[0].tool_names,
		["get_payment_summary", "get_payment_summary"]
	);
}
