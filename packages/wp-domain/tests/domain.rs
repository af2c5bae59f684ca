use time::macros::datetime;

use wp_domain::{
	ContextSnapshot, SourceType, WorkspaceId,
	redact, sanitize, text,
	workspace::{CalendarEvent, Poll, PollOption, SourceItem},
};

fn event(workspace: &str) -> CalendarEvent {
	CalendarEvent {
		workspace_id: WorkspaceId::new(workspace),
		event_id: "e-1".to_string(),
		title: "Dinner".to_string(),
		start_time: datetime!(2026-05-01 19:00 UTC),
		end_time: None,
		location: Some("Harbor Grill".to_string()),
		updated_at: datetime!(2026-04-20 10:00 UTC),
	}
}

#[test]
fn event_source_item_keeps_workspace_and_type() {
	let item = SourceItem::from(&event("trip-1"));

	assert_eq!(item.workspace_id, WorkspaceId::new("trip-1"));
	assert_eq!(item.source_type, SourceType::Event);
	assert_eq!(item.text, "Event: Dinner @ 2026-05-01T19:00:00Z at Harbor Grill");
}

#[test]
fn poll_text_lists_options_with_votes() {
	let poll = Poll {
		workspace_id: WorkspaceId::new("trip-1"),
		poll_id: "p-1".to_string(),
		question: "Where to eat?".to_string(),
		options: vec![
			PollOption { label: "Tacos".to_string(), votes: 3 },
			PollOption { label: "Sushi".to_string(), votes: 1 },
		],
		closed: false,
		updated_at: datetime!(2026-04-20 10:00 UTC),
	};

	assert_eq!(
		poll.canonical_text(),
		"Poll (open): Where to eat? Options: Tacos (3 votes), Sushi (1 votes)"
	);
}

#[test]
fn snapshot_detects_foreign_rows() {
	let mut snapshot = ContextSnapshot::empty(WorkspaceId::new("trip-1"));

	snapshot.events = Some(vec![event("trip-1")]);

	assert!(!snapshot.has_foreign_rows(&WorkspaceId::new("trip-1")));

	snapshot.events = Some(vec![event("trip-1"), event("trip-2")]);

	assert!(snapshot.has_foreign_rows(&WorkspaceId::new("trip-1")));
}

#[test]
fn blank_ids_do_not_parse() {
	assert!(WorkspaceId::parse("   ").is_none());
	assert_eq!(WorkspaceId::parse(" trip-1 ").map(|id| id.to_string()), Some("trip-1".to_string()));
}

#[test]
fn redaction_and_sanitizing_compose() {
	let raw = "user ana@example.com hit 401 with Bearer sk-abcdefghijk";
	let out = sanitize::sanitize_error_message(&redact::redact_text(raw));

	assert!(!out.contains("ana@example.com"));
	assert!(!out.contains("sk-abcdefghijk"));
	assert!(text::char_len(&out) <= sanitize::MAX_ERROR_CHARS + 3);
}
