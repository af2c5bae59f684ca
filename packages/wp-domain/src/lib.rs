pub mod error_code;
pub mod ids;
pub mod record;
pub mod redact;
pub mod retrieval;
pub mod sanitize;
pub mod snapshot;
pub mod source;
pub mod text;
pub mod workspace;

pub use error_code::ErrorCode;
pub use ids::{UserId, WorkspaceId};
pub use record::{EmbeddingRecord, RefreshJob, SourceSelector};
pub use retrieval::{RankKind, RetrievalCandidate};
pub use snapshot::ContextSnapshot;
pub use source::SourceType;
