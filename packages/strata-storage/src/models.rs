use serde_json::Value;
use uuid::Uuid;

use strata_domain::record::{self, IS_DELETED, MASTER, PROJECT, SCHEMA_NAME};

use crate::{Error, Result};

/// Indexed columns derived from a record document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordColumns {
	pub record_id: Uuid,
	pub schema_kind: String,
	pub master_id: Option<Uuid>,
	pub project_id: Option<Uuid>,
	pub is_deleted: bool,
}
impl RecordColumns {
	pub fn from_document(doc: &Value) -> Result<Self> {
		let record_id = record::document_id(doc)
			.ok_or_else(|| Error::InvalidArgument("record document needs a UUID _id.".to_string()))?;
		let schema_kind = doc
			.get(SCHEMA_NAME)
			.and_then(Value::as_str)
			.filter(|kind| !kind.is_empty())
			.ok_or_else(|| {
				Error::InvalidArgument(format!("record {record_id} needs a {SCHEMA_NAME}."))
			})?
			.to_string();

		Ok(Self {
			record_id,
			schema_kind,
			master_id: uuid_at(doc, MASTER),
			project_id: uuid_at(doc, PROJECT),
			is_deleted: matches!(doc.get(IS_DELETED), Some(Value::Bool(true))),
		})
	}
}

fn uuid_at(doc: &Value, key: &str) -> Option<Uuid> {
	doc.get(key).and_then(Value::as_str).and_then(|raw| Uuid::parse_str(raw).ok())
}
