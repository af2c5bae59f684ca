use wp_domain::{ErrorCode, sanitize};
use wp_providers::ErrorClass;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Configuration error: {message}")]
	Config { message: String },
	#[error("Not authorized: {message}")]
	Auth { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Quota exceeded: {message}")]
	QuotaExceeded { message: String },
	#[error("Rate limited: {message}")]
	RateLimited { message: String },
	#[error("Payment required: {message}")]
	PaymentRequired { message: String },
	#[error("Invalid request: {message}")]
	Validation { message: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
	#[error("Network error: {message}")]
	Network { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Request was cancelled.")]
	Cancelled,
}
impl Error {
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::Config { .. } | Self::Validation { .. } => ErrorCode::ConfigError,
			Self::Auth { .. } => ErrorCode::AuthError,
			Self::Forbidden { .. } => ErrorCode::ForbiddenCrossWorkspace,
			Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
			Self::RateLimited { .. } => ErrorCode::RateLimit,
			Self::PaymentRequired { .. } => ErrorCode::PaymentRequired,
			Self::Timeout { .. } => ErrorCode::TimeoutError,
			Self::Network { .. } | Self::Provider { .. } | Self::Storage { .. } | Self::Cancelled =>
				ErrorCode::NetworkError,
		}
	}

	pub fn retryable(&self) -> bool {
		self.code().retryable()
	}

	/// Message safe for logs and persisted records.
	pub fn sanitized(&self) -> String {
		sanitize::sanitize_error_message(&self.to_string())
	}

	pub(crate) fn timeout(what: &str) -> Self {
		Self::Timeout { message: format!("{what} did not finish in time.") }
	}
}
impl From<wp_storage::Error> for Error {
	fn from(err: wp_storage::Error) -> Self {
		Self::Storage { message: sanitize::sanitize_error_message(&err.to_string()) }
	}
}
impl From<wp_providers::Error> for Error {
	fn from(err: wp_providers::Error) -> Self {
		let message = sanitize::sanitize_error_message(&err.to_string());

		match err.class() {
			ErrorClass::Config => Self::Config { message },
			ErrorClass::Auth => Self::Auth { message },
			ErrorClass::RateLimited => Self::RateLimited { message },
			ErrorClass::PaymentRequired => Self::PaymentRequired { message },
			ErrorClass::Timeout => Self::Timeout { message },
			ErrorClass::Network => Self::Network { message },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn provider_errors_keep_their_class() {
		let err = Error::from(wp_providers::Error::Api {
			status: 401,
			message: "bad key sk-abcdefghijkl".to_string(),
		});

		assert_eq!(err.code(), ErrorCode::AuthError);
		assert!(!err.to_string().contains("sk-abcdefghijkl"));
	}

	#[test]
	fn only_transport_failures_are_retryable() {
		assert!(Error::Network { message: String::new() }.retryable());
		assert!(Error::timeout("Search").retryable());
		assert!(!Error::QuotaExceeded { message: String::new() }.retryable());
		assert!(!Error::Forbidden { message: String::new() }.retryable());
	}
}
