//! Hybrid Retriever: fuses vector similarity and keyword search over one workspace's records.

use std::{cmp::Ordering, collections::HashMap, sync::Arc, time::Duration};

use wp_config::{EmbeddingProviderConfig, Retrieval};
use wp_domain::{RankKind, RetrievalCandidate, SourceType, WorkspaceId, text};

use crate::{
	EmbeddingProvider, Error, Result,
	store::{EmbeddingIndex, SearchHit},
};

pub struct HybridRetriever {
	cfg: Retrieval,
	embedding_cfg: EmbeddingProviderConfig,
	embedding: Arc<dyn EmbeddingProvider>,
	index: Arc<dyn EmbeddingIndex>,
}
impl HybridRetriever {
	pub fn new(
		cfg: Retrieval,
		embedding_cfg: EmbeddingProviderConfig,
		embedding: Arc<dyn EmbeddingProvider>,
		index: Arc<dyn EmbeddingIndex>,
	) -> Self {
		Self { cfg, embedding_cfg, embedding, index }
	}

	/// Runs both signals concurrently and fuses them. A failing branch degrades to no hits from
	/// that branch; only a failure of both is an error.
	pub async fn search(
		&self,
		workspace_id: &WorkspaceId,
		query: &str,
	) -> Result<Vec<RetrievalCandidate>> {
		let query = text::normalize_text(query);

		if query.is_empty() {
			return Ok(Vec::new());
		}

		let terms = text::keyword_terms(&query, self.cfg.keyword_terms as usize);
		let (vector, keyword) = tokio::join!(
			self.vector_branch(workspace_id, &query),
			self.keyword_branch(workspace_id, &terms)
		);
		let (vector_hits, keyword_hits) = match (vector, keyword) {
			(Ok(vector_hits), Ok(keyword_hits)) => (vector_hits, keyword_hits),
			(Err(err), Ok(keyword_hits)) => {
				tracing::warn!(
					workspace_id = %workspace_id,
					error = %err.sanitized(),
					"Vector retrieval failed. Falling back to keyword results."
				);

				(Vec::new(), keyword_hits)
			},
			(Ok(vector_hits), Err(err)) => {
				tracing::warn!(
					workspace_id = %workspace_id,
					error = %err.sanitized(),
					"Keyword retrieval failed. Using vector results only."
				);

				(vector_hits, Vec::new())
			},
			(Err(vector_err), Err(keyword_err)) => {
				tracing::warn!(
					workspace_id = %workspace_id,
					vector_error = %vector_err.sanitized(),
					keyword_error = %keyword_err.sanitized(),
					"Both retrieval branches failed."
				);

				return Err(vector_err);
			},
		};
		let foreign = vector_hits
			.iter()
			.chain(keyword_hits.iter())
			.filter(|hit| &hit.workspace_id != workspace_id)
			.count();

		if foreign > 0 {
			tracing::warn!(
				workspace_id = %workspace_id,
				dropped = foreign,
				"Index returned hits outside the requested workspace."
			);
		}

		let candidates = fuse(vector_hits, keyword_hits, workspace_id, &self.cfg);

		tracing::debug!(
			workspace_id = %workspace_id,
			candidates = candidates.len(),
			"Hybrid retrieval finished."
		);

		Ok(candidates)
	}

	async fn vector_branch(
		&self,
		workspace_id: &WorkspaceId,
		query: &str,
	) -> Result<Vec<SearchHit>> {
		let texts = vec![query.to_string()];
		let embedded = tokio::time::timeout(
			Duration::from_millis(self.cfg.embed_timeout_ms),
			self.embedding.embed(&self.embedding_cfg, &texts),
		)
		.await
		.map_err(|_| Error::timeout("Query embedding"))??;
		let Some(query_vec) = embedded.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vector for the query.".to_string(),
			});
		};

		tokio::time::timeout(
			Duration::from_millis(self.cfg.search_timeout_ms),
			self.index.vector_search(workspace_id, &query_vec, self.cfg.max_results),
		)
		.await
		.map_err(|_| Error::timeout("Vector search"))?
	}

	async fn keyword_branch(
		&self,
		workspace_id: &WorkspaceId,
		terms: &[String],
	) -> Result<Vec<SearchHit>> {
		if terms.is_empty() {
			return Ok(Vec::new());
		}

		tokio::time::timeout(
			Duration::from_millis(self.cfg.search_timeout_ms),
			self.index.keyword_search(workspace_id, terms, self.cfg.max_results),
		)
		.await
		.map_err(|_| Error::timeout("Keyword search"))?
	}
}

struct Fused {
	source_type: SourceType,
	source_id: String,
	content_text: String,
	vector_score: Option<f32>,
	keyword_score: Option<f32>,
	source_updated_at: time::OffsetDateTime,
}

/// Merges both hit lists into ranked candidates.
///
/// Vector scores are cosine similarities clamped to `0.0..=1.0`; keyword scores are ranks divided
/// by the best rank in the list. An item found by both signals scores the higher of the two plus
/// `agreement_bonus`. Hits from other workspaces are dropped.
pub fn fuse(
	vector_hits: Vec<SearchHit>,
	keyword_hits: Vec<SearchHit>,
	workspace_id: &WorkspaceId,
	cfg: &Retrieval,
) -> Vec<RetrievalCandidate> {
	let vector_hits: Vec<SearchHit> =
		vector_hits.into_iter().filter(|hit| &hit.workspace_id == workspace_id).collect();
	let keyword_hits: Vec<SearchHit> =
		keyword_hits.into_iter().filter(|hit| &hit.workspace_id == workspace_id).collect();
	let max_rank = keyword_hits.iter().map(|hit| hit.score).fold(0.0_f32, f32::max);
	let mut merged: HashMap<(SourceType, String), Fused> = HashMap::new();

	for hit in vector_hits {
		let score = hit.score.clamp(0.0, 1.0);
		let entry = merged.entry((hit.source_type, hit.source_id.clone())).or_insert(Fused {
			source_type: hit.source_type,
			source_id: hit.source_id,
			content_text: hit.content_text,
			vector_score: None,
			keyword_score: None,
			source_updated_at: hit.source_updated_at,
		});

		entry.vector_score = Some(entry.vector_score.map_or(score, |prev| prev.max(score)));
	}
	for hit in keyword_hits {
		let score = if max_rank > 0.0 { (hit.score / max_rank).clamp(0.0, 1.0) } else { 0.0 };
		let entry = merged.entry((hit.source_type, hit.source_id.clone())).or_insert(Fused {
			source_type: hit.source_type,
			source_id: hit.source_id,
			content_text: hit.content_text,
			vector_score: None,
			keyword_score: None,
			source_updated_at: hit.source_updated_at,
		});

		entry.keyword_score = Some(entry.keyword_score.map_or(score, |prev| prev.max(score)));
		entry.source_updated_at = entry.source_updated_at.max(hit.source_updated_at);
	}

	let mut out: Vec<RetrievalCandidate> = merged
		.into_values()
		.map(|fused| {
			let (score, rank_kind) = match (fused.vector_score, fused.keyword_score) {
				(Some(v), Some(k)) => (v.max(k) + cfg.agreement_bonus.max(0.0), RankKind::Both),
				(Some(v), None) => (v, RankKind::Vector),
				(None, Some(k)) => (k, RankKind::Keyword),
				(None, None) => (0.0, RankKind::Vector),
			};

			RetrievalCandidate {
				source_type: fused.source_type,
				source_id: fused.source_id,
				content_text: text::truncate_chars(&fused.content_text, cfg.snippet_chars as usize),
				score,
				rank_kind,
				source_updated_at: fused.source_updated_at,
			}
		})
		.filter(|candidate| candidate.score >= cfg.min_score)
		.collect();

	out.sort_by(|a, b| {
		b.score
			.partial_cmp(&a.score)
			.unwrap_or(Ordering::Equal)
			.then_with(|| b.source_updated_at.cmp(&a.source_updated_at))
			.then_with(|| a.source_type.cmp(&b.source_type))
			.then_with(|| a.source_id.cmp(&b.source_id))
	});
	out.truncate(cfg.max_results as usize);

	out
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn hit(workspace: &str, id: &str, score: f32, minute: u8) -> SearchHit {
		SearchHit {
			workspace_id: WorkspaceId::new(workspace),
			source_type: SourceType::Message,
			source_id: id.to_string(),
			content_text: format!("Ana: note {id}"),
			score,
			source_updated_at: datetime!(2026-05-01 12:00 UTC) + time::Duration::minutes(minute.into()),
		}
	}

	#[test]
	fn agreement_scores_at_least_the_better_signal() {
		let cfg = Retrieval::default();
		let ws = WorkspaceId::new("trip-1");
		let out = fuse(
			vec![hit("trip-1", "m-1", 0.7, 0)],
			vec![hit("trip-1", "m-1", 0.2, 0), hit("trip-1", "m-2", 0.4, 0)],
			&ws,
			&cfg,
		);
		let both = out.iter().find(|c| c.source_id == "m-1").expect("Expected fused candidate.");

		assert_eq!(both.rank_kind, RankKind::Both);
		assert!(both.score >= 0.7);
		assert!(both.score >= 0.5);
	}

	#[test]
	fn drops_foreign_and_low_scoring_hits() {
		let cfg = Retrieval::default();
		let ws = WorkspaceId::new("trip-1");
		let out = fuse(
			vec![hit("trip-2", "x-1", 0.99, 0), hit("trip-1", "m-1", 0.3, 0)],
			Vec::new(),
			&ws,
			&cfg,
		);

		assert!(out.is_empty());
	}

	#[test]
	fn ties_prefer_recent_sources() {
		let cfg = Retrieval::default();
		let ws = WorkspaceId::new("trip-1");
		let out = fuse(
			vec![hit("trip-1", "old", 0.8, 0), hit("trip-1", "new", 0.8, 30)],
			Vec::new(),
			&ws,
			&cfg,
		);

		assert_eq!(out[0].source_id, "new");
		assert_eq!(out[1].source_id, "old");
	}

	#[test]
	fn caps_results_and_snippets() {
		let cfg = Retrieval { max_results: 3, snippet_chars: 10, ..Retrieval::default() };
		let ws = WorkspaceId::new("trip-1");
		let hits = (0..10).map(|i| hit("trip-1", &format!("m-{i}"), 0.9, i)).collect();
		let out = fuse(hits, Vec::new(), &ws, &cfg);

		assert_eq!(out.len(), 3);
		assert!(out.iter().all(|c| text::char_len(&c.content_text) <= 10));
	}
}
