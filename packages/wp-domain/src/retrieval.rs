use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::SourceType;

/// Which search signal produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKind {
	Vector,
	Keyword,
	Both,
}
impl RankKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Keyword => "keyword",
			Self::Both => "both",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
	pub source_type: SourceType,
	pub source_id: String,
	pub content_text: String,
	pub score: f32,
	pub rank_kind: RankKind,
	#[serde(with = "time::serde::rfc3339")]
	pub source_updated_at: OffsetDateTime,
}
