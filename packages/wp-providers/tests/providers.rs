use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use wp_providers::{Error, ErrorClass};

#[test]
fn builds_bearer_auth_header() {
	let headers =
		wp_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn blank_key_sends_no_authorization() {
	let headers = wp_providers::auth_headers("  ", &Map::new()).expect("Failed to build headers.");

	assert!(headers.get(AUTHORIZATION).is_none());
}

#[test]
fn rejects_non_string_default_headers() {
	let mut extra = Map::new();

	extra.insert("x-retries".to_string(), Value::from(3));

	let err = wp_providers::auth_headers("secret", &extra).expect_err("Expected header error.");

	assert_eq!(err.class(), ErrorClass::Config);
}

#[tokio::test]
async fn unconfigured_chat_backend_fails_before_network() {
	let cfg = wp_config::ChatBackendConfig {
		provider_id: "primary".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: None,
		path: "/v1/chat/completions".to_string(),
		model: "model-a".to_string(),
		temperature: 0.2,
		max_tokens: 256,
		timeout_ms: 500,
		default_headers: Map::new(),
	};
	let result =
		wp_providers::chat::stream_chat(&cfg, &wp_providers::chat::ChatRequest::default()).await;

	match result {
		Err(err @ Error::InvalidConfig { .. }) => assert_eq!(err.class(), ErrorClass::Config),
		Err(other) => panic!("Unexpected error: {other}"),
		Ok(_) => panic!("Expected configuration error."),
	}
}
