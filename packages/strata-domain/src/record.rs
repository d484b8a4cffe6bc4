//! Stored record shape and the document keys the engine relies on.
//!
//! Records live as one JSON document each. The system keys below are fixed; every other key
//! belongs to the kind-specific `fields`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const ID: &str = "_id";
pub const SCHEMA_NAME: &str = "_schemaName";
pub const MASTER: &str = "_master";
pub const READ: &str = "read";
pub const WRITE: &str = "write";
pub const IS_DELETED: &str = "isDeleted";
pub const PROJECT: &str = "project";
pub const DOCUMENTS: &str = "documents";
pub const ACTIVE: &str = "active";
pub const SCORE: &str = "score";
pub const FLAVOUR_RECORDS: &str = "_flavourRecords";

/// Filter paths starting with this prefix target the joined master record.
pub const MASTER_PREFIX: &str = "_master.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	#[serde(rename = "_id")]
	pub id: Uuid,
	#[serde(rename = "_schemaName")]
	pub schema_kind: String,
	#[serde(rename = "_master", default, skip_serializing_if = "Option::is_none")]
	pub master_ref: Option<Uuid>,
	#[serde(rename = "read", default, skip_serializing_if = "Option::is_none")]
	pub read_roles: Option<Vec<String>>,
	#[serde(rename = "write", default, skip_serializing_if = "Option::is_none")]
	pub write_roles: Option<Vec<String>>,
	#[serde(rename = "isDeleted", default, skip_serializing_if = "std::ops::Not::not")]
	pub is_deleted: bool,
	#[serde(rename = "project", default, skip_serializing_if = "Option::is_none")]
	pub project_ref: Option<Uuid>,
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}
impl Record {
	pub fn new(schema_kind: impl Into<String>) -> Self {
		Self {
			id: Uuid::new_v4(),
			schema_kind: schema_kind.into(),
			master_ref: None,
			read_roles: None,
			write_roles: None,
			is_deleted: false,
			project_ref: None,
			fields: Map::new(),
		}
	}

	pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
		self.fields.insert(key.into(), value);

		self
	}

	pub fn with_read_roles<I, S>(mut self, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.read_roles = Some(roles.into_iter().map(Into::into).collect());

		self
	}

	pub fn flavour_of(mut self, master: Uuid) -> Self {
		self.master_ref = Some(master);

		self
	}

	pub fn into_document(self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}

	pub fn from_document(doc: Value) -> serde_json::Result<Self> {
		serde_json::from_value(doc)
	}
}

/// Reads the `_id` of a stored document.
pub fn document_id(doc: &Value) -> Option<Uuid> {
	doc.get(ID).and_then(Value::as_str).and_then(|raw| Uuid::parse_str(raw).ok())
}

/// A document counts as deleted only when `isDeleted` is literally `true`.
pub fn is_soft_deleted(doc: &Value) -> bool {
	matches!(doc.get(IS_DELETED), Some(Value::Bool(true)))
}

/// Adds `document_id` to the `documents` set. Returns `false` when it was already present.
///
/// A missing or non-array `documents` value is replaced by a fresh list.
pub fn attach_document(doc: &mut Value, document_id: Uuid) -> bool {
	let Value::Object(map) = doc else {
		return false;
	};
	let id = document_id.to_string();
	let documents = map.entry(DOCUMENTS).or_insert_with(|| Value::Array(Vec::new()));

	if !documents.is_array() {
		*documents = Value::Array(Vec::new());
	}

	let Value::Array(items) = documents else {
		return false;
	};

	if items.iter().any(|item| item.as_str() == Some(id.as_str())) {
		return false;
	}

	items.push(Value::String(id));

	true
}

/// Removes `document_id` from the `documents` set. Returns `false` when it was absent.
pub fn detach_document(doc: &mut Value, document_id: Uuid) -> bool {
	let id = document_id.to_string();
	let Some(Value::Array(items)) = doc.get_mut(DOCUMENTS) else {
		return false;
	};
	let before = items.len();

	items.retain(|item| item.as_str() != Some(id.as_str()));

	items.len() != before
}
