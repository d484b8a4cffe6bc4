use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use strata_domain::{
	pipeline::{FacetOutput, Pipeline},
	record,
};
use strata_storage::{db::Db, queries};

use crate::{BoxFuture, DocumentStore, Error, Result};

/// Postgres-backed store.
///
/// Candidates are narrowed in SQL by the pushed-down scope of the leading match stage, then the
/// full pipeline runs in process. Candidates and joined masters are read in one snapshot.
///
/// A query whose scope holds more than `max_candidates` records is refused; `0` disables the cap.
pub struct PgStore {
	db: Db,
	max_candidates: u32,
}
impl PgStore {
	pub fn new(db: Db, max_candidates: u32) -> Self {
		Self { db, max_candidates }
	}

	async fn run(&self, pipeline: &Pipeline) -> Result<FacetOutput> {
		let fetch_limit = (self.max_candidates > 0).then(|| i64::from(self.max_candidates) + 1);
		let mut tx = self.db.begin_snapshot().await?;
		let candidates =
			queries::fetch_candidates(&mut *tx, &pipeline.candidate_scope(), fetch_limit).await?;

		if self.max_candidates > 0 && candidates.len() > self.max_candidates as usize {
			tracing::warn!(
				limit = self.max_candidates,
				"Refusing query whose candidate set exceeds the configured bound."
			);

			return Err(Error::QueryTooBroad { limit: self.max_candidates });
		}

		let keys = pipeline.lookup_keys(&candidates);
		let joined: HashMap<Uuid, Value> = queries::fetch_by_ids(&mut *tx, &keys)
			.await?
			.into_iter()
			.filter_map(|doc| record::document_id(&doc).map(|id| (id, doc)))
			.collect();

		tx.commit().await?;

		Ok(pipeline.run(candidates, &joined))
	}
}

impl DocumentStore for PgStore {
	fn aggregate<'a>(&'a self, pipeline: &'a Pipeline) -> BoxFuture<'a, Result<FacetOutput>> {
		Box::pin(self.run(pipeline))
	}

	fn attach_document<'a>(
		&'a self,
		record_id: Uuid,
		document_id: Uuid,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			Ok(queries::attach_document(&self.db, record_id, document_id).await?)
		})
	}

	fn detach_document<'a>(
		&'a self,
		record_id: Uuid,
		document_id: Uuid,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			Ok(queries::detach_document(&self.db, record_id, document_id).await?)
		})
	}
}
