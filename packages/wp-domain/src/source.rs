use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of workspace content that are embedded and searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Message,
	Event,
	Task,
	Poll,
	Payment,
	Place,
	Link,
}
impl SourceType {
	pub const ALL: [SourceType; 7] = [
		SourceType::Message,
		SourceType::Event,
		SourceType::Task,
		SourceType::Poll,
		SourceType::Payment,
		SourceType::Place,
		SourceType::Link,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Message => "message",
			Self::Event => "event",
			Self::Task => "task",
			Self::Poll => "poll",
			Self::Payment => "payment",
			Self::Place => "place",
			Self::Link => "link",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.as_str() == value.trim())
	}

	/// Short marker shown next to retrieved snippets so the model can cite the source kind.
	pub fn icon(self) -> &'static str {
		match self {
			Self::Message => "[chat]",
			Self::Event => "[calendar]",
			Self::Task => "[task]",
			Self::Poll => "[poll]",
			Self::Payment => "[payment]",
			Self::Place => "[place]",
			Self::Link => "[link]",
		}
	}
}
impl fmt::Display for SourceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
