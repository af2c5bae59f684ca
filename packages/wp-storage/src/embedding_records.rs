//! Embedding Records: one row per `(workspace_id, source_type, source_id)`.
//!
//! Writes are upserts on the primary key. An upsert never replaces a record built from a newer
//! source version, so concurrent refreshes of the same item converge regardless of order.

use sqlx::PgExecutor;

use wp_domain::{EmbeddingRecord, SourceType, WorkspaceId};

use crate::{
	Result,
	models::{IndexedVersion, KeywordHit, VectorHit},
};

/// Returns `true` when the row was written, `false` when a newer version was already stored.
pub async fn upsert_record<'e, E>(executor: E, record: &EmbeddingRecord) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let vec_text = format_vector_text(&record.vector);
	let result = sqlx::query(
		"\
INSERT INTO embedding_records (
	workspace_id,
	source_type,
	source_id,
	content_text,
	vec,
	metadata,
	source_updated_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5::text::vector, $6, $7, $8)
ON CONFLICT (workspace_id, source_type, source_id) DO UPDATE
SET
	content_text = EXCLUDED.content_text,
	vec = EXCLUDED.vec,
	metadata = EXCLUDED.metadata,
	source_updated_at = EXCLUDED.source_updated_at,
	updated_at = EXCLUDED.updated_at
WHERE embedding_records.source_updated_at <= EXCLUDED.source_updated_at",
	)
	.bind(record.workspace_id.as_str())
	.bind(record.source_type.as_str())
	.bind(record.source_id.as_str())
	.bind(record.content_text.as_str())
	.bind(vec_text.as_str())
	.bind(&record.metadata)
	.bind(record.source_updated_at)
	.bind(record.updated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn delete_record<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	source_type: SourceType,
	source_id: &str,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
DELETE FROM embedding_records
WHERE workspace_id = $1 AND source_type = $2 AND source_id = $3",
	)
	.bind(workspace_id.as_str())
	.bind(source_type.as_str())
	.bind(source_id)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// Source versions currently indexed for one workspace and type. Used to skip unchanged items and
/// to prune records whose source row is gone.
pub async fn indexed_versions<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	source_type: SourceType,
) -> Result<Vec<IndexedVersion>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, IndexedVersion>(
		"\
SELECT source_id, source_updated_at
FROM embedding_records
WHERE workspace_id = $1 AND source_type = $2",
	)
	.bind(workspace_id.as_str())
	.bind(source_type.as_str())
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn vector_search<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	query_vec: &[f32],
	limit: u32,
) -> Result<Vec<VectorHit>>
where
	E: PgExecutor<'e>,
{
	let vec_text = format_vector_text(query_vec);
	let rows = sqlx::query_as::<_, VectorHit>(
		"\
SELECT
	workspace_id,
	source_type,
	source_id,
	content_text,
	(1 - (vec <=> $2::text::vector))::real AS similarity,
	source_updated_at
FROM embedding_records
WHERE workspace_id = $1
ORDER BY vec <=> $2::text::vector ASC, source_updated_at DESC
LIMIT $3",
	)
	.bind(workspace_id.as_str())
	.bind(vec_text.as_str())
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Full-text match of any of `terms` within one workspace, ranked by `ts_rank`.
pub async fn keyword_search<'e, E>(
	executor: E,
	workspace_id: &WorkspaceId,
	terms: &[String],
	limit: u32,
) -> Result<Vec<KeywordHit>>
where
	E: PgExecutor<'e>,
{
	let Some(query) = build_keyword_query(terms) else {
		return Ok(Vec::new());
	};
	let rows = sqlx::query_as::<_, KeywordHit>(
		"\
WITH q AS (SELECT websearch_to_tsquery('simple', $2) AS query)
SELECT
	workspace_id,
	source_type,
	source_id,
	content_text,
	ts_rank(content_tsv, q.query)::real AS rank,
	source_updated_at
FROM embedding_records, q
WHERE workspace_id = $1 AND content_tsv @@ q.query
ORDER BY rank DESC, source_updated_at DESC
LIMIT $3",
	)
	.bind(workspace_id.as_str())
	.bind(query.as_str())
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// OR-joins the terms for `websearch_to_tsquery`. Terms are reduced to alphanumerics so no
/// operator syntax can be smuggled in.
fn build_keyword_query(terms: &[String]) -> Option<String> {
	let cleaned = terms
		.iter()
		.map(|term| term.chars().filter(|ch| ch.is_alphanumeric()).collect::<String>())
		.filter(|term| !term.is_empty() && !term.eq_ignore_ascii_case("or"))
		.collect::<Vec<_>>();

	if cleaned.is_empty() {
		return None;
	}

	Some(cleaned.join(" or "))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_vectors_for_pgvector() {
		assert_eq!(format_vector_text(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
		assert_eq!(format_vector_text(&[]), "[]");
	}

	#[test]
	fn keyword_query_strips_operators() {
		let terms = vec!["dinner".to_string(), "-tacos\"".to_string(), "or".to_string()];

		assert_eq!(build_keyword_query(&terms).as_deref(), Some("dinner or tacos"));
		assert_eq!(build_keyword_query(&["!!".to_string()]), None);
	}
}
