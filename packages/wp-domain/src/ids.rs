use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the trip workspace every read and write is partitioned by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);
impl WorkspaceId {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns `None` for blank input so empty ids never reach a query.
	pub fn parse(value: &str) -> Option<Self> {
		let trimmed = value.trim();

		if trimmed.is_empty() {
			return None;
		}

		Some(Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl fmt::Display for WorkspaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identity of a verified session user. Only constructed from the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);
impl UserId {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn parse(value: &str) -> Option<Self> {
		let trimmed = value.trim();

		if trimmed.is_empty() {
			return None;
		}

		Some(Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
