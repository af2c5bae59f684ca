use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{SourceType, WorkspaceId};

/// One embedded unit of workspace content, unique per `(workspace_id, source_type, source_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
	pub workspace_id: WorkspaceId,
	pub source_type: SourceType,
	pub source_id: String,
	pub content_text: String,
	pub vector: Vec<f32>,
	pub metadata: Value,
	/// Last-modified time of the source row this record was built from.
	pub source_updated_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "source_id")]
pub enum SourceSelector {
	One(String),
	All,
}
impl SourceSelector {
	pub fn from_optional(source_id: Option<&str>) -> Self {
		match source_id.map(str::trim).filter(|id| !id.is_empty() && *id != "all") {
			Some(id) => Self::One(id.to_string()),
			None => Self::All,
		}
	}

	pub fn as_storage_key(&self) -> &str {
		match self {
			Self::One(id) => id.as_str(),
			Self::All => "all",
		}
	}
}

/// Request to re-embed one source item, or every stale item of a type, in one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshJob {
	pub workspace_id: WorkspaceId,
	/// `None` refreshes every indexed source type.
	pub source_type: Option<SourceType>,
	pub selector: SourceSelector,
	#[serde(with = "time::serde::rfc3339")]
	pub requested_at: OffsetDateTime,
}
impl RefreshJob {
	pub fn new(
		workspace_id: WorkspaceId,
		source_type: Option<SourceType>,
		selector: SourceSelector,
	) -> Self {
		Self { workspace_id, source_type, selector, requested_at: OffsetDateTime::now_utc() }
	}

	pub fn source_types(&self) -> Vec<SourceType> {
		match self.source_type {
			Some(kind) => vec![kind],
			None => SourceType::ALL.to_vec(),
		}
	}
}
