//! Embedding Index Writer: turns workspace source rows into embedding records.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::Arc,
};

use time::OffsetDateTime;

use wp_config::EmbeddingProviderConfig;
use wp_domain::{
	EmbeddingRecord, RefreshJob, SourceSelector, SourceType, WorkspaceId, workspace::SourceItem,
};

use crate::{
	EmbeddingProvider, Error, Result,
	store::{EmbeddingIndex, WorkspaceStore},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
	/// Records written in this call.
	pub processed: usize,
	/// Records removed because their source is gone or became private.
	pub pruned: usize,
	/// Items whose stored record already matches the source version.
	pub skipped: usize,
	/// Items that could not be embedded or written. They stay stale and are retried.
	pub failed: usize,
	/// Stale items left over because the batch cap was reached.
	pub remaining: usize,
	pub per_type: BTreeMap<SourceType, usize>,
}

pub struct IndexWriter {
	cfg: EmbeddingProviderConfig,
	batch_size: usize,
	store: Arc<dyn WorkspaceStore>,
	index: Arc<dyn EmbeddingIndex>,
	embedding: Arc<dyn EmbeddingProvider>,
}
impl IndexWriter {
	pub fn new(
		cfg: EmbeddingProviderConfig,
		batch_size: u32,
		store: Arc<dyn WorkspaceStore>,
		index: Arc<dyn EmbeddingIndex>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { cfg, batch_size: batch_size.max(1) as usize, store, index, embedding }
	}

	pub async fn run_job(&self, job: &RefreshJob) -> Result<RefreshReport> {
		self.refresh(&job.workspace_id, job.source_type, &job.selector).await
	}

	/// Brings the index in line with the current source rows.
	///
	/// A single id is always re-embedded, or pruned when the row is gone or private. `All` skips
	/// items whose stored version matches and prunes records whose source no longer exists. At
	/// most `batch_size` items are embedded per call; the rest are reported as `remaining`.
	pub async fn refresh(
		&self,
		workspace_id: &WorkspaceId,
		source_type: Option<SourceType>,
		selector: &SourceSelector,
	) -> Result<RefreshReport> {
		let types = match source_type {
			Some(kind) => vec![kind],
			None => SourceType::ALL.to_vec(),
		};
		let mut report = RefreshReport::default();
		let mut pending = Vec::new();

		for kind in types {
			let items = self.scoped_items(workspace_id, kind, selector).await?;
			let stale = match selector {
				SourceSelector::One(source_id) =>
					self.plan_one(workspace_id, kind, source_id, items, &mut report).await?,
				SourceSelector::All => self.plan_all(workspace_id, kind, items, &mut report).await?,
			};

			pending.extend(stale);
		}

		if pending.len() > self.batch_size {
			report.remaining = pending.len() - self.batch_size;

			pending.truncate(self.batch_size);
		}

		self.write_batch(workspace_id, pending, &mut report).await;

		tracing::info!(
			workspace_id = %workspace_id,
			selector = selector.as_storage_key(),
			processed = report.processed,
			pruned = report.pruned,
			skipped = report.skipped,
			failed = report.failed,
			remaining = report.remaining,
			"Index refresh finished."
		);

		Ok(report)
	}

	async fn scoped_items(
		&self,
		workspace_id: &WorkspaceId,
		source_type: SourceType,
		selector: &SourceSelector,
	) -> Result<Vec<SourceItem>> {
		let items = self.store.source_items(workspace_id, source_type, selector).await?;
		let total = items.len();
		let scoped: Vec<SourceItem> = items
			.into_iter()
			.filter(|item| &item.workspace_id == workspace_id && item.source_type == source_type)
			.collect();

		if scoped.len() != total {
			tracing::warn!(
				workspace_id = %workspace_id,
				source_type = %source_type,
				dropped = total - scoped.len(),
				"Store returned rows outside the requested workspace."
			);
		}

		Ok(scoped)
	}

	async fn plan_one(
		&self,
		workspace_id: &WorkspaceId,
		source_type: SourceType,
		source_id: &str,
		items: Vec<SourceItem>,
		report: &mut RefreshReport,
	) -> Result<Vec<SourceItem>> {
		match items.into_iter().find(|item| item.source_id == source_id) {
			Some(item) if !item.excluded => Ok(vec![item]),
			_ => {
				if self.index.delete(workspace_id, source_type, source_id).await? {
					report.pruned += 1;
				}

				Ok(Vec::new())
			},
		}
	}

	async fn plan_all(
		&self,
		workspace_id: &WorkspaceId,
		source_type: SourceType,
		items: Vec<SourceItem>,
		report: &mut RefreshReport,
	) -> Result<Vec<SourceItem>> {
		let indexed: HashMap<String, OffsetDateTime> =
			self.index.indexed_versions(workspace_id, source_type).await?.into_iter().collect();
		let live: HashSet<&str> =
			items
				.iter()
				.filter(|item| !item.excluded)
				.map(|item| item.source_id.as_str())
				.collect();
		let mut prune: Vec<&str> =
			indexed.keys().map(String::as_str).filter(|id| !live.contains(id)).collect();

		prune.sort_unstable();

		for source_id in prune {
			if self.index.delete(workspace_id, source_type, source_id).await? {
				report.pruned += 1;
			}
		}

		let mut stale = Vec::new();

		for item in items.into_iter().filter(|item| !item.excluded) {
			match indexed.get(&item.source_id) {
				Some(stored) if *stored >= item.updated_at => report.skipped += 1,
				_ => stale.push(item),
			}
		}

		Ok(stale)
	}

	async fn write_batch(
		&self,
		workspace_id: &WorkspaceId,
		items: Vec<SourceItem>,
		report: &mut RefreshReport,
	) {
		if items.is_empty() {
			return;
		}

		let vectors = self.embed_items(&items).await;
		let now = OffsetDateTime::now_utc();

		for (item, vector) in items.into_iter().zip(vectors) {
			let Some(vector) = vector else {
				report.failed += 1;

				continue;
			};
			let source_type = item.source_type;
			let record = EmbeddingRecord {
				workspace_id: workspace_id.clone(),
				source_type,
				source_id: item.source_id,
				content_text: item.text,
				vector,
				metadata: item.metadata,
				source_updated_at: item.updated_at,
				updated_at: now,
			};

			match self.index.upsert(&record).await {
				Ok(true) => {
					report.processed += 1;
					*report.per_type.entry(source_type).or_default() += 1;
				},
				Ok(false) => report.skipped += 1,
				Err(err) => {
					report.failed += 1;

					tracing::warn!(
						workspace_id = %workspace_id,
						source_type = %source_type,
						source_id = %record.source_id,
						error = %err.sanitized(),
						"Embedding record upsert failed."
					);
				},
			}
		}
	}

	/// Embeds the whole batch in one call, falling back to one call per item so a single bad
	/// input does not sink its siblings.
	async fn embed_items(&self, items: &[SourceItem]) -> Vec<Option<Vec<f32>>> {
		let texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();

		match self.embed_checked(&texts).await {
			Ok(vectors) => return vectors.into_iter().map(Some).collect(),
			Err(err) => tracing::warn!(
				count = texts.len(),
				error = %err.sanitized(),
				"Batch embedding failed. Retrying items one by one."
			),
		}

		let mut out = Vec::with_capacity(items.len());

		for (item, text) in items.iter().zip(texts) {
			match self.embed_checked(std::slice::from_ref(&text)).await {
				Ok(mut vectors) => out.push(vectors.pop()),
				Err(err) => {
					tracing::warn!(
						source_type = %item.source_type,
						source_id = %item.source_id,
						error = %err.sanitized(),
						"Item embedding failed."
					);

					out.push(None);
				},
			}
		}

		out
	}

	async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let vectors = self.embedding.embed(&self.cfg, texts).await?;

		if vectors.len() != texts.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					texts.len()
				),
			});
		}
		if let Some(bad) = vectors.iter().find(|vec| vec.len() != self.cfg.dimensions as usize) {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch. Expected {}, got {}.",
					self.cfg.dimensions,
					bad.len()
				),
			});
		}

		Ok(vectors)
	}
}
