use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire-level error codes of the streamed and non-streamed response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
	ConfigError,
	AuthError,
	NetworkError,
	TimeoutError,
	RateLimit,
	PaymentRequired,
	QuotaExceeded,
	ForbiddenCrossWorkspace,
}
impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ConfigError => "config_error",
			Self::AuthError => "auth_error",
			Self::NetworkError => "network_error",
			Self::TimeoutError => "timeout_error",
			Self::RateLimit => "rate_limit",
			Self::PaymentRequired => "payment_required",
			Self::QuotaExceeded => "quota_exceeded",
			Self::ForbiddenCrossWorkspace => "forbidden_cross_workspace",
		}
	}

	/// Only transient transport failures are worth retrying from the client.
	pub fn retryable(self) -> bool {
		matches!(self, Self::NetworkError | Self::TimeoutError)
	}

	/// Fixed client-facing text. Provider output and internal details never reach the client.
	pub fn user_message(self) -> &'static str {
		match self {
			Self::ConfigError => "The assistant is not available right now. Please try again later.",
			Self::AuthError => "You are not allowed to use the assistant here.",
			Self::NetworkError => "The assistant could not be reached. Please try again.",
			Self::TimeoutError => "The assistant took too long to respond. Please try again.",
			Self::RateLimit => "Too many requests. Please wait a moment before asking again.",
			Self::PaymentRequired => "This feature requires an upgraded plan.",
			Self::QuotaExceeded => "You have reached today's assistant limit.",
			Self::ForbiddenCrossWorkspace => "You do not have access to this trip.",
		}
	}
}
impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
