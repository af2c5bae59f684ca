pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Provider returned HTTP {status}: {message}")]
	Api { status: u16, message: String },
}
impl Error {
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Api { status, .. } => classify_status(*status),
			Self::Reqwest(err) if err.is_timeout() => ErrorClass::Timeout,
			Self::Reqwest(err) if err.is_builder() => ErrorClass::Config,
			Self::Reqwest(err) => match err.status() {
				Some(status) => classify_status(status.as_u16()),
				None => ErrorClass::Network,
			},
			Self::InvalidConfig { .. } | Self::InvalidHeaderName(_) | Self::InvalidHeaderValue(_) =>
				ErrorClass::Config,
			Self::SerdeJson(_) | Self::InvalidResponse { .. } => ErrorClass::Network,
		}
	}
}

/// What a caller can do about a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
	/// Missing or rejected configuration (bad model, bad path, malformed request).
	Config,
	/// HTTP 401/403.
	Auth,
	/// HTTP 429.
	RateLimited,
	/// HTTP 402.
	PaymentRequired,
	Timeout,
	/// Connection failures, 5xx and unreadable bodies.
	Network,
}
impl ErrorClass {
	pub fn is_transient(self) -> bool {
		matches!(self, Self::Timeout | Self::Network)
	}
}

fn classify_status(status: u16) -> ErrorClass {
	match status {
		401 | 403 => ErrorClass::Auth,
		402 => ErrorClass::PaymentRequired,
		408 | 504 => ErrorClass::Timeout,
		429 => ErrorClass::RateLimited,
		400 | 404 | 405 | 409 | 410 | 413 | 415 | 422 => ErrorClass::Config,
		_ => ErrorClass::Network,
	}
}
