use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use strata_domain::{pipeline::CandidateScope, record};

use crate::{
	Error, Result,
	db::Db,
	models::RecordColumns,
	prefilter::{self, JsonPathFilter},
};

/// Inserts a record document, replacing any stored document with the same `_id`.
pub async fn upsert_record(conn: &mut PgConnection, doc: &Value) -> Result<Uuid> {
	let columns = RecordColumns::from_document(doc)?;

	sqlx::query(
		"\
INSERT INTO records (record_id, schema_kind, master_id, project_id, is_deleted, doc)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (record_id) DO UPDATE
SET
	schema_kind = EXCLUDED.schema_kind,
	master_id = EXCLUDED.master_id,
	project_id = EXCLUDED.project_id,
	is_deleted = EXCLUDED.is_deleted,
	doc = EXCLUDED.doc,
	updated_at = now()",
	)
	.bind(columns.record_id)
	.bind(columns.schema_kind.as_str())
	.bind(columns.master_id)
	.bind(columns.project_id)
	.bind(columns.is_deleted)
	.bind(doc)
	.execute(conn)
	.await?;

	Ok(columns.record_id)
}

/// Documents inside the pushed-down scope, in insertion order.
///
/// The scope's prefilter is applied as a `jsonpath` condition when it has a translatable part.
/// `limit` caps the number of rows returned; `None` returns every candidate.
pub async fn fetch_candidates(
	conn: &mut PgConnection,
	scope: &CandidateScope,
	limit: Option<i64>,
) -> Result<Vec<Value>> {
	let filter = scope.prefilter.as_ref().and_then(prefilter::to_jsonpath);
	let (path, vars) = match filter {
		Some(JsonPathFilter { path, vars }) => (Some(path), vars),
		None => (None, Value::Object(Default::default())),
	};
	let docs = sqlx::query_scalar::<_, Value>(
		"\
SELECT doc
FROM records
WHERE (cardinality($1::text[]) = 0 OR schema_kind = ANY($1))
	AND ($2::uuid IS NULL OR project_id = $2)
	AND (NOT $3 OR is_deleted = false)
	AND (cardinality($4::uuid[]) = 0 OR record_id = ANY($4))
	AND ($5::uuid IS NULL OR master_id = $5)
	AND ($6::text IS NULL OR jsonb_path_exists(doc, $6::text::jsonpath, $7::jsonb))
ORDER BY seq
LIMIT $8",
	)
	.bind(scope.kinds.as_slice())
	.bind(scope.project)
	.bind(scope.exclude_deleted)
	.bind(scope.ids.as_slice())
	.bind(scope.master)
	.bind(path)
	.bind(vars)
	.bind(limit)
	.fetch_all(conn)
	.await?;

	Ok(docs)
}

pub async fn fetch_by_ids(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<Value>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let docs = sqlx::query_scalar::<_, Value>(
		"\
SELECT doc
FROM records
WHERE record_id = ANY($1)
ORDER BY seq",
	)
	.bind(ids)
	.fetch_all(conn)
	.await?;

	Ok(docs)
}

async fn lock_record(conn: &mut PgConnection, record_id: Uuid) -> Result<Option<Value>> {
	let doc = sqlx::query_scalar::<_, Value>(
		"\
SELECT doc
FROM records
WHERE record_id = $1
FOR UPDATE",
	)
	.bind(record_id)
	.fetch_optional(conn)
	.await?;

	Ok(doc)
}

async fn update_doc(conn: &mut PgConnection, record_id: Uuid, doc: &Value) -> Result<()> {
	sqlx::query(
		"\
UPDATE records
SET doc = $1, updated_at = now()
WHERE record_id = $2",
	)
	.bind(doc)
	.bind(record_id)
	.execute(conn)
	.await?;

	Ok(())
}

/// Adds a document id to a record's `documents` set under a row lock.
///
/// Returns the stored document after the change. Attaching an id twice is a no-op.
pub async fn attach_document(db: &Db, record_id: Uuid, document_id: Uuid) -> Result<Value> {
	change_documents(db, record_id, |doc| record::attach_document(doc, document_id)).await
}

/// Removes a document id from a record's `documents` set under a row lock.
pub async fn detach_document(db: &Db, record_id: Uuid, document_id: Uuid) -> Result<Value> {
	change_documents(db, record_id, |doc| record::detach_document(doc, document_id)).await
}

async fn change_documents<F>(db: &Db, record_id: Uuid, change: F) -> Result<Value>
where
	F: FnOnce(&mut Value) -> bool,
{
	let mut tx = db.pool.begin().await?;
	let Some(mut doc) = lock_record(&mut *tx, record_id).await? else {
		return Err(Error::NotFound(format!("record {record_id}")));
	};

	if change(&mut doc) {
		update_doc(&mut *tx, record_id, &doc).await?;
	}

	tx.commit().await?;

	Ok(doc)
}
