use std::{
	collections::HashMap,
	sync::{
		RwLock,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use serde_json::Value;
use uuid::Uuid;

use strata_domain::{
	pipeline::{CandidateScope, FacetOutput, Pipeline},
	record::{self, MASTER, PROJECT, Record, SCHEMA_NAME},
};
use strata_service::{BoxFuture, DocumentStore, Error, Result};

/// Insertion-ordered document store held in memory.
///
/// Applies the same pushed-down scope, prefilter and candidate bound as the Postgres store
/// before running the pipeline.
#[derive(Default)]
pub struct MemoryStore {
	docs: RwLock<Vec<Value>>,
	latency: Option<Duration>,
	max_candidates: u32,
	unavailable: AtomicBool,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store whose reads sleep first, for timeout tests.
	pub fn with_latency(latency: Duration) -> Self {
		Self { latency: Some(latency), ..Self::default() }
	}

	pub fn with_candidate_limit(max_candidates: u32) -> Self {
		Self { max_candidates, ..Self::default() }
	}

	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Inserts a document, replacing any document with the same `_id`.
	pub fn insert(&self, doc: Value) -> Option<Uuid> {
		let id = record::document_id(&doc)?;
		let mut docs = self.docs.write().unwrap_or_else(|err| err.into_inner());

		match docs.iter_mut().find(|existing| record::document_id(existing) == Some(id)) {
			Some(existing) => *existing = doc,
			None => docs.push(doc),
		}

		Some(id)
	}

	pub fn insert_record(&self, record: Record) -> Uuid {
		let id = record.id;

		self.insert(record.into_document());

		id
	}

	pub fn get(&self, id: Uuid) -> Option<Value> {
		let docs = self.docs.read().unwrap_or_else(|err| err.into_inner());

		docs.iter().find(|doc| record::document_id(doc) == Some(id)).cloned()
	}

	pub fn len(&self) -> usize {
		self.docs.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	async fn check_available(&self) -> Result<()> {
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(Error::StoreUnavailable { message: "memory store is offline.".to_string() });
		}

		Ok(())
	}

	fn change_documents<F>(&self, record_id: Uuid, change: F) -> Result<Value>
	where
		F: FnOnce(&mut Value) -> bool,
	{
		let mut docs = self.docs.write().unwrap_or_else(|err| err.into_inner());
		let Some(doc) = docs.iter_mut().find(|doc| record::document_id(doc) == Some(record_id))
		else {
			return Err(Error::NotFound { message: format!("record {record_id}") });
		};

		change(doc);

		Ok(doc.clone())
	}
}

impl DocumentStore for MemoryStore {
	fn aggregate<'a>(&'a self, pipeline: &'a Pipeline) -> BoxFuture<'a, Result<FacetOutput>> {
		Box::pin(async move {
			self.check_available().await?;

			let (candidates, joined) = {
				let docs = self.docs.read().unwrap_or_else(|err| err.into_inner());
				let scope = pipeline.candidate_scope();
				let candidates: Vec<Value> =
					docs.iter().filter(|doc| in_scope(doc, &scope)).cloned().collect();

				if self.max_candidates > 0 && candidates.len() > self.max_candidates as usize {
					return Err(Error::QueryTooBroad { limit: self.max_candidates });
				}

				let keys = pipeline.lookup_keys(&candidates);
				let joined: HashMap<Uuid, Value> = docs
					.iter()
					.filter_map(|doc| record::document_id(doc).map(|id| (id, doc)))
					.filter(|(id, _)| keys.contains(id))
					.map(|(id, doc)| (id, doc.clone()))
					.collect();

				(candidates, joined)
			};

			Ok(pipeline.run(candidates, &joined))
		})
	}

	fn attach_document<'a>(
		&'a self,
		record_id: Uuid,
		document_id: Uuid,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			self.check_available().await?;
			self.change_documents(record_id, |doc| record::attach_document(doc, document_id))
		})
	}

	fn detach_document<'a>(
		&'a self,
		record_id: Uuid,
		document_id: Uuid,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			self.check_available().await?;
			self.change_documents(record_id, |doc| record::detach_document(doc, document_id))
		})
	}
}

fn in_scope(doc: &Value, scope: &CandidateScope) -> bool {
	let uuid_at =
		|key: &str| doc.get(key).and_then(Value::as_str).and_then(|raw| Uuid::parse_str(raw).ok());
	let kind_ok = scope.kinds.is_empty()
		|| doc
			.get(SCHEMA_NAME)
			.and_then(Value::as_str)
			.is_some_and(|kind| scope.kinds.iter().any(|wanted| wanted == kind));
	let id_ok = scope.ids.is_empty()
		|| record::document_id(doc).is_some_and(|id| scope.ids.contains(&id));

	kind_ok
		&& id_ok
		&& scope.project.is_none_or(|project| uuid_at(PROJECT) == Some(project))
		&& scope.master.is_none_or(|master| uuid_at(MASTER) == Some(master))
		&& (!scope.exclude_deleted || !record::is_soft_deleted(doc))
		&& scope.prefilter.as_ref().is_none_or(|prefilter| prefilter.matches(doc))
}
