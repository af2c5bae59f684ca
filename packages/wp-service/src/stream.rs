//! Response events delivered to the caller while a turn is generated.

use serde::Serialize;
use tokio::sync::mpsc;

use wp_domain::ErrorCode;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
	Token { text: String },
	Done { final_text: String },
	Error { code: ErrorCode, message: String },
}
impl ResponseEvent {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Token { .. })
	}
}

/// Producer half of a response stream. A sink without a receiver drops every event.
#[derive(Debug, Clone)]
pub struct ResponseSink {
	tx: Option<mpsc::Sender<ResponseEvent>>,
}
impl ResponseSink {
	pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResponseEvent>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));

		(Self { tx: Some(tx) }, rx)
	}

	/// Sink for non-streaming callers that only want the final outcome.
	pub fn discard() -> Self {
		Self { tx: None }
	}

	/// Returns `false` once the receiver is gone, which callers treat as a disconnect.
	pub async fn send(&self, event: ResponseEvent) -> bool {
		match &self.tx {
			Some(tx) => tx.send(event).await.is_ok(),
			None => true,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn events_serialize_with_type_tag() {
		let token = serde_json::to_value(ResponseEvent::Token { text: "Hi".to_string() })
			.expect("Failed to serialize token event.");
		let error = serde_json::to_value(ResponseEvent::Error {
			code: ErrorCode::QuotaExceeded,
			message: "Limit reached.".to_string(),
		})
		.expect("Failed to serialize error event.");

		assert_eq!(token, serde_json::json!({ "type": "token", "text": "Hi" }));
		assert_eq!(error["type"], "error");
		assert_eq!(error["code"], "quota_exceeded");
	}

	#[tokio::test]
	async fn send_reports_closed_receiver() {
		let (sink, rx) = ResponseSink::channel(4);

		assert!(sink.send(ResponseEvent::Token { text: "a".to_string() }).await);

		drop(rx);

		assert!(!sink.send(ResponseEvent::Token { text: "b".to_string() }).await);
		assert!(
			ResponseSink::discard().send(ResponseEvent::Done { final_text: String::new() }).await
		);
	}
}
