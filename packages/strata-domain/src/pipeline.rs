//! Aggregation pipeline model and its in-process evaluator.
//!
//! A pipeline is an ordered list of stages applied to a candidate set of documents. Stores
//! fetch candidates (and any joined documents) and hand them to [`Pipeline::run`].

use std::{cmp::Ordering, collections::HashMap};

use serde_json::{Map, Value};
use uuid::Uuid;

use strata_config::SearchText;

use crate::{
	document,
	predicate::{FieldValue, Predicate},
	record::{self, ID, MASTER, PROJECT, SCHEMA_NAME, SCORE},
	redaction,
	roles::RoleSet,
	text::TextQuery,
};

/// Resolves documents referenced by a lookup stage.
pub trait LookupSource {
	fn find(&self, id: &Uuid) -> Option<&Value>;
}
impl LookupSource for HashMap<Uuid, Value> {
	fn find(&self, id: &Uuid) -> Option<&Value> {
		self.get(id)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedactionScope {
	pub roles: RoleSet,
	pub max_depth: usize,
}
impl RedactionScope {
	pub fn apply(&self, doc: Value) -> Option<Value> {
		redaction::redact(doc, &self.roles, self.max_depth)
	}
}

/// Left outer join on `local_field = _id`.
///
/// `as_field` receives an array holding the joined document, or an empty array when the
/// reference dangles or the joined document is pruned for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
	pub local_field: String,
	pub as_field: String,
	pub redaction: Option<RedactionScope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
	Ascending,
	Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
	pub path: String,
	pub direction: SortDirection,
}
impl SortSpec {
	/// `-field` sorts descending; `+field` or a bare name sorts ascending.
	pub fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim();
		let (direction, path) = if let Some(path) = raw.strip_prefix('-') {
			(SortDirection::Descending, path)
		} else if let Some(path) = raw.strip_prefix('+') {
			(SortDirection::Ascending, path)
		} else {
			(SortDirection::Ascending, raw)
		};
		let path = path.trim();

		if path.is_empty() {
			return None;
		}

		Some(Self { path: path.to_string(), direction })
	}

	pub fn descending(path: &str) -> Self {
		Self { path: path.to_string(), direction: SortDirection::Descending }
	}

	fn compare(&self, left: &Value, right: &Value) -> Ordering {
		let ordering = document::compare_for_sort(
			document::first_at_path(left, &self.path),
			document::first_at_path(right, &self.path),
		);

		match self.direction {
			SortDirection::Ascending => ordering,
			SortDirection::Descending => ordering.reverse(),
		}
	}

	fn to_value(&self) -> Value {
		let direction = match self.direction {
			SortDirection::Ascending => 1,
			SortDirection::Descending => -1,
		};
		let mut map = Map::new();

		map.insert(self.path.clone(), Value::from(direction));

		Value::Object(map)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
	pub sort: Option<SortSpec>,
	pub skip: usize,
	pub limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
	Match(Predicate),
	Lookup(Lookup),
	/// Replaces a single-element array with its element; an empty array removes the field.
	Unwind { path: String },
	Redact(RedactionScope),
	Score { query: TextQuery, weights: SearchText },
	Facet(Facet),
}
impl Stage {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Match(_) => "match",
			Self::Lookup(_) => "lookup",
			Self::Unwind { .. } => "unwind",
			Self::Redact(_) => "redact",
			Self::Score { .. } => "score",
			Self::Facet(_) => "facet",
		}
	}

	pub fn to_value(&self) -> Value {
		match self {
			Self::Match(predicate) => serde_json::json!({ "match": predicate.to_value() }),
			Self::Lookup(lookup) => serde_json::json!({
				"lookup": {
					"local_field": lookup.local_field,
					"foreign_field": ID,
					"as": lookup.as_field,
					"redacted": lookup.redaction.is_some(),
				}
			}),
			Self::Unwind { path } => serde_json::json!({
				"unwind": { "path": path, "preserve_null_and_empty_arrays": true }
			}),
			Self::Redact(scope) => serde_json::json!({
				"redact": {
					"roles": scope.roles.iter().collect::<Vec<_>>(),
					"max_depth": scope.max_depth,
				}
			}),
			Self::Score { query, .. } => serde_json::json!({ "score": query.to_value() }),
			Self::Facet(facet) => serde_json::json!({
				"facet": {
					"sort": facet.sort.as_ref().map(SortSpec::to_value),
					"skip": facet.skip,
					"limit": facet.limit,
				}
			}),
		}
	}
}

/// One page of results plus the size of the full match set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetOutput {
	pub results: Vec<Value>,
	pub total: usize,
}

/// Filters a store may apply before handing candidates to the evaluator.
///
/// `prefilter` holds the remaining conditions of the leading match and redact stages. Redaction
/// only removes data, so a document failing `prefilter` on its stored form can never pass those
/// stages; a store may drop such documents early or ignore `prefilter` entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateScope {
	pub kinds: Vec<String>,
	pub project: Option<Uuid>,
	pub master: Option<Uuid>,
	pub ids: Vec<Uuid>,
	pub exclude_deleted: bool,
	pub prefilter: Option<Predicate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
}
impl Pipeline {
	pub fn new(stages: Vec<Stage>) -> Self {
		Self { stages }
	}

	pub fn shape(&self) -> Vec<&'static str> {
		self.stages.iter().map(Stage::name).collect()
	}

	pub fn to_value(&self) -> Value {
		Value::Array(self.stages.iter().map(Stage::to_value).collect())
	}

	/// Conditions a store can push down.
	///
	/// Column-backed conjuncts come from the leading match stage. Every other conjunct of the
	/// match stages before the first stage that reshapes documents lands in `prefilter`.
	pub fn candidate_scope(&self) -> CandidateScope {
		let mut scope = CandidateScope::default();
		let Some(Stage::Match(predicate)) = self.stages.first() else {
			return scope;
		};
		let mut residual = Vec::new();

		for conjunct in predicate.conjuncts() {
			match conjunct {
				Predicate::In { path, values } if path == SCHEMA_NAME => scope.kinds = values.clone(),
				Predicate::Eq { path, value: FieldValue::Identifier(id) } if path == PROJECT =>
					scope.project = Some(*id),
				Predicate::Eq { path, value: FieldValue::Identifier(id) } if path == MASTER =>
					scope.master = Some(*id),
				Predicate::Eq { path, value: FieldValue::Identifier(id) } if path == ID =>
					scope.ids = vec![*id],
				Predicate::NotDeleted => scope.exclude_deleted = true,
				other => residual.push(other.clone()),
			}
		}

		for stage in &self.stages[1..] {
			match stage {
				Stage::Match(predicate) => residual.extend(predicate.conjuncts().iter().cloned()),
				Stage::Redact(_) => {},
				_ => break,
			}
		}

		if !residual.is_empty() {
			scope.prefilter = Some(Predicate::And(residual));
		}

		scope
	}

	/// Ids the lookup stage will ask for, taken from candidates that pass the stages before it.
	pub fn lookup_keys(&self, candidates: &[Value]) -> Vec<Uuid> {
		let Some(position) = self.stages.iter().position(|stage| matches!(stage, Stage::Lookup(_)))
		else {
			return Vec::new();
		};
		let Stage::Lookup(lookup) = &self.stages[position] else {
			return Vec::new();
		};
		let leading = &self.stages[..position];
		let mut keys = Vec::new();

		for doc in candidates {
			let passes = leading.iter().all(|stage| match stage {
				Stage::Match(predicate) => predicate.matches(doc),
				_ => true,
			});

			if !passes {
				continue;
			}

			if let Some(id) = document::first_at_path(doc, &lookup.local_field)
				.and_then(Value::as_str)
				.and_then(|raw| Uuid::parse_str(raw).ok())
				&& !keys.contains(&id)
			{
				keys.push(id);
			}
		}

		keys
	}

	/// Runs every stage in order. Without a facet stage all surviving documents are returned.
	pub fn run(&self, candidates: Vec<Value>, joined: &dyn LookupSource) -> FacetOutput {
		let mut docs = candidates;

		for stage in &self.stages {
			docs = match stage {
				Stage::Match(predicate) => docs.into_iter().filter(|doc| predicate.matches(doc)).collect(),
				Stage::Lookup(lookup) =>
					docs.into_iter().map(|doc| apply_lookup(doc, lookup, joined)).collect(),
				Stage::Unwind { path } => docs.into_iter().map(|doc| apply_unwind(doc, path)).collect(),
				Stage::Redact(scope) => docs.into_iter().filter_map(|doc| scope.apply(doc)).collect(),
				Stage::Score { query, weights } => docs
					.into_iter()
					.map(|doc| {
						let score = query.score(&doc, weights);

						set_field(doc, SCORE, serde_json::json!(score))
					})
					.collect(),
				Stage::Facet(facet) => return apply_facet(docs, facet),
			};
		}

		FacetOutput { total: docs.len(), results: docs }
	}
}

fn apply_lookup(doc: Value, lookup: &Lookup, joined: &dyn LookupSource) -> Value {
	let found = document::first_at_path(&doc, &lookup.local_field)
		.and_then(Value::as_str)
		.and_then(|raw| Uuid::parse_str(raw).ok())
		.and_then(|id| joined.find(&id))
		.filter(|found| !record::is_soft_deleted(found))
		.cloned();
	let found = match (&lookup.redaction, found) {
		(Some(scope), Some(found)) => scope.apply(found),
		(None, found) => found,
		(Some(_), None) => None,
	};
	let joined = Value::Array(found.into_iter().collect());

	set_field(doc, &lookup.as_field, joined)
}

fn apply_unwind(doc: Value, path: &str) -> Value {
	let Value::Object(mut map) = doc else {
		return doc;
	};

	match map.remove(path) {
		Some(Value::Array(mut items)) =>
			if !items.is_empty() {
				map.insert(path.to_string(), items.swap_remove(0));
			},
		Some(Value::Null) | None => {},
		Some(other) => {
			map.insert(path.to_string(), other);
		},
	}

	Value::Object(map)
}

fn apply_facet(mut docs: Vec<Value>, facet: &Facet) -> FacetOutput {
	let total = docs.len();

	if let Some(sort) = &facet.sort {
		docs.sort_by(|left, right| sort.compare(left, right));
	}

	let results = docs.into_iter().skip(facet.skip).take(facet.limit).collect();

	FacetOutput { results, total }
}

fn set_field(doc: Value, key: &str, value: Value) -> Value {
	match doc {
		Value::Object(mut map) => {
			map.insert(key.to_string(), value);

			Value::Object(map)
		},
		other => {
			let mut map = Map::new();

			map.insert(key.to_string(), value);
			map.insert("value".to_string(), other);

			Value::Object(map)
		},
	}
}
