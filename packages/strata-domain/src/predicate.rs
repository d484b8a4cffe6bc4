//! Predicate compiler.
//!
//! Converts parsed filter entries into typed predicates through ordered type inference and
//! evaluates them against JSON documents.

use std::fmt::{Display, Formatter};

use serde_json::Value;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};
use uuid::Uuid;

use strata_config::Search;

use crate::{
	document,
	filter::{FilterEntry, FilterScope, ParsedFilter, RawValue},
	record::{self, ACTIVE, MASTER_PREFIX},
	text::TextQuery,
};

/// A suffixed range key whose value is not a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDate {
	pub path: String,
	pub value: String,
}
impl Display for InvalidDate {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: '{}' is not a valid date", self.path, self.value)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRules {
	pub start_suffix: String,
	pub end_suffix: String,
	/// Adds `active = true` next to every `"true"` literal.
	pub legacy_active_flag: bool,
}
impl InferenceRules {
	pub fn from_config(search: &Search) -> Self {
		Self {
			start_suffix: search.date_range.start_suffix.clone(),
			end_suffix: search.date_range.end_suffix.clone(),
			legacy_active_flag: search.legacy_active_flag,
		}
	}

	fn range_base<'a>(&self, path: &'a str) -> Option<(RangeBound, &'a str)> {
		let candidates =
			[(RangeBound::Start, self.start_suffix.as_str()), (RangeBound::End, self.end_suffix.as_str())];

		for (bound, suffix) in candidates {
			if let Some(base) = path.strip_suffix(suffix)
				&& !base.is_empty()
				&& !base.ends_with('.')
			{
				return Some((bound, base));
			}
		}

		None
	}
}
impl Default for InferenceRules {
	fn default() -> Self {
		Self {
			start_suffix: "Start".to_string(),
			end_suffix: "End".to_string(),
			legacy_active_flag: true,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
	Start,
	End,
}

/// Result of type inference for one raw literal.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	Identifier(Uuid),
	Bool(bool),
	Number(f64),
	Text(String),
	/// Range bound keyed on the path with its suffix stripped. `at` is the instant the bound
	/// compares against: start of the day for `Start`, start of the next day for `End`.
	DateRangeBound { bound: RangeBound, path: String, at: OffsetDateTime },
}
impl FieldValue {
	fn to_value(&self) -> Value {
		match self {
			Self::Identifier(id) => Value::String(id.to_string()),
			Self::Bool(flag) => Value::Bool(*flag),
			Self::Number(number) => serde_json::json!(number),
			Self::Text(text) => Value::String(text.clone()),
			Self::DateRangeBound { at, .. } => Value::String(format_instant(at)),
		}
	}
}

/// Infers the type of a raw literal. The first rule that applies wins.
pub fn infer_value(path: &str, raw: &str, rules: &InferenceRules) -> Result<FieldValue, InvalidDate> {
	if let Some((bound, base)) = rules.range_base(path) {
		let invalid = || InvalidDate { path: path.to_string(), value: raw.to_string() };
		let day = parse_calendar_day(raw).ok_or_else(invalid)?;
		let day = match bound {
			RangeBound::Start => day,
			RangeBound::End => day.next_day().ok_or_else(invalid)?,
		};

		return Ok(FieldValue::DateRangeBound {
			bound,
			path: base.to_string(),
			at: day.midnight().assume_utc(),
		});
	}
	if let Ok(id) = Uuid::parse_str(raw) {
		return Ok(FieldValue::Identifier(id));
	}

	match raw {
		"true" => return Ok(FieldValue::Bool(true)),
		"false" => return Ok(FieldValue::Bool(false)),
		_ => {},
	}

	if let Ok(number) = raw.parse::<f64>()
		&& number.is_finite()
	{
		return Ok(FieldValue::Number(number));
	}

	Ok(FieldValue::Text(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	And(Vec<Predicate>),
	Or(Vec<Predicate>),
	Eq { path: String, value: FieldValue },
	Gte { path: String, at: OffsetDateTime },
	Lt { path: String, at: OffsetDateTime },
	/// String membership, used for the schema-kind pin.
	In { path: String, values: Vec<String> },
	NotDeleted,
	Text(TextQuery),
}
impl Predicate {
	pub fn matches(&self, doc: &Value) -> bool {
		match self {
			Self::And(items) => items.iter().all(|item| item.matches(doc)),
			Self::Or(items) => items.iter().any(|item| item.matches(doc)),
			Self::Eq { path, value } => any_leaf(doc, path, |leaf| leaf_equals(leaf, value)),
			Self::Gte { path, at } =>
				any_leaf(doc, path, |leaf| leaf_instant(leaf).is_some_and(|found| found >= *at)),
			Self::Lt { path, at } =>
				any_leaf(doc, path, |leaf| leaf_instant(leaf).is_some_and(|found| found < *at)),
			Self::In { path, values } => any_leaf(doc, path, |leaf| {
				leaf.as_str().is_some_and(|found| values.iter().any(|value| value == found))
			}),
			Self::NotDeleted => !record::is_soft_deleted(doc),
			Self::Text(query) => query.matches(doc),
		}
	}

	pub fn to_value(&self) -> Value {
		match self {
			Self::And(items) => serde_json::json!({
				"op": "and",
				"args": Value::Array(items.iter().map(Self::to_value).collect()),
			}),
			Self::Or(items) => serde_json::json!({
				"op": "or",
				"args": Value::Array(items.iter().map(Self::to_value).collect()),
			}),
			Self::Eq { path, value } =>
				serde_json::json!({ "op": "eq", "field": path, "value": value.to_value() }),
			Self::Gte { path, at } =>
				serde_json::json!({ "op": "gte", "field": path, "value": format_instant(at) }),
			Self::Lt { path, at } =>
				serde_json::json!({ "op": "lt", "field": path, "value": format_instant(at) }),
			Self::In { path, values } =>
				serde_json::json!({ "op": "in", "field": path, "value": values }),
			Self::NotDeleted => serde_json::json!({ "op": "not_deleted" }),
			Self::Text(query) => query.to_value(),
		}
	}

	/// Top-level conjuncts of this predicate.
	pub fn conjuncts(&self) -> &[Predicate] {
		match self {
			Self::And(items) => items,
			other => std::slice::from_ref(other),
		}
	}
}

/// Record-scoped and master-scoped predicate groups compiled from one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilters {
	pub record: Option<Predicate>,
	pub master: Option<Predicate>,
	pub invalid_dates: Vec<InvalidDate>,
}

/// Compiles the `and` and `or` filters of one request.
///
/// Every entry of `and` must hold. Every entry of `or` is a disjunction over its own values and
/// the entries are themselves conjoined.
pub fn compile_filters(and: &ParsedFilter, or: &ParsedFilter, rules: &InferenceRules) -> CompiledFilters {
	let mut compiled = CompiledFilters::default();

	for scope in [FilterScope::Record, FilterScope::Master] {
		let ands = compile_scope(and, scope, rules, &mut compiled.invalid_dates);
		let ors = compile_scope(or, scope, rules, &mut compiled.invalid_dates);
		let group = combine(ands, ors);

		match scope {
			FilterScope::Record => compiled.record = group,
			FilterScope::Master => compiled.master = group,
		}
	}

	compiled
}

/// `(AND of ands) AND (AND of ors)`; a single non-empty side stands alone.
pub fn combine(ands: Vec<Predicate>, ors: Vec<Predicate>) -> Option<Predicate> {
	match (ands.is_empty(), ors.is_empty()) {
		(true, true) => None,
		(false, true) => Some(Predicate::And(ands)),
		(true, false) => Some(Predicate::And(ors)),
		(false, false) => Some(Predicate::And(vec![Predicate::And(ands), Predicate::And(ors)])),
	}
}

pub fn compile_entry(
	entry: &FilterEntry,
	rules: &InferenceRules,
	invalid: &mut Vec<InvalidDate>,
) -> Option<Predicate> {
	match &entry.value {
		RawValue::Scalar(raw) => compile_literal(&entry.path, raw, rules, invalid),
		RawValue::List(raws) => {
			let alternatives: Vec<Predicate> = raws
				.iter()
				.filter_map(|raw| compile_literal(&entry.path, raw, rules, invalid))
				.collect();

			if alternatives.is_empty() { None } else { Some(Predicate::Or(alternatives)) }
		},
	}
}

/// Parses a date-only or RFC 3339 literal into its UTC calendar day.
pub fn parse_calendar_day(raw: &str) -> Option<Date> {
	let raw = raw.trim();

	if let Ok(day) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
		return Some(day);
	}

	OffsetDateTime::parse(raw, &Rfc3339).ok().map(|at| at.to_offset(time::UtcOffset::UTC).date())
}

/// Reads a stored date value as an instant. Date-only strings mean midnight UTC.
pub fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Some(at);
	}

	Date::parse(raw, format_description!("[year]-[month]-[day]"))
		.ok()
		.map(|day| day.midnight().assume_utc())
}

fn compile_scope(
	filter: &ParsedFilter,
	scope: FilterScope,
	rules: &InferenceRules,
	invalid: &mut Vec<InvalidDate>,
) -> Vec<Predicate> {
	filter.scoped(scope).filter_map(|entry| compile_entry(entry, rules, invalid)).collect()
}

fn compile_literal(
	path: &str,
	raw: &str,
	rules: &InferenceRules,
	invalid: &mut Vec<InvalidDate>,
) -> Option<Predicate> {
	let value = match infer_value(path, raw, rules) {
		Ok(value) => value,
		Err(err) => {
			invalid.push(err);

			return None;
		},
	};

	match value {
		FieldValue::DateRangeBound { bound: RangeBound::Start, path, at } =>
			Some(Predicate::Gte { path, at }),
		FieldValue::DateRangeBound { bound: RangeBound::End, path, at } =>
			Some(Predicate::Lt { path, at }),
		FieldValue::Bool(true) if rules.legacy_active_flag => {
			let eq = Predicate::Eq { path: path.to_string(), value: FieldValue::Bool(true) };
			let active_path = active_path_for(path);

			if active_path == path {
				return Some(eq);
			}

			let active = Predicate::Eq { path: active_path, value: FieldValue::Bool(true) };

			Some(Predicate::And(vec![eq, active]))
		},
		value => Some(Predicate::Eq { path: path.to_string(), value }),
	}
}

/// The implicit `active` flag lives on the same record as the field it accompanies.
fn active_path_for(path: &str) -> String {
	if path.starts_with(MASTER_PREFIX) {
		format!("{MASTER_PREFIX}{ACTIVE}")
	} else {
		ACTIVE.to_string()
	}
}

/// True when any value at `path`, or any element of an array found there, satisfies `check`.
fn any_leaf(doc: &Value, path: &str, check: impl Fn(&Value) -> bool) -> bool {
	document::resolve_path(doc, path).into_iter().any(|found| match found {
		Value::Array(items) => items.iter().any(&check),
		other => check(other),
	})
}

fn leaf_equals(leaf: &Value, expected: &FieldValue) -> bool {
	match (expected, leaf) {
		(FieldValue::Identifier(id), Value::String(found)) =>
			Uuid::parse_str(found).is_ok_and(|found| found == *id),
		(FieldValue::Bool(flag), Value::Bool(found)) => flag == found,
		(FieldValue::Number(number), Value::Number(found)) =>
			found.as_f64().is_some_and(|found| found == *number),
		(FieldValue::Text(text), Value::String(found)) => text == found,
		(FieldValue::DateRangeBound { at, .. }, Value::String(found)) =>
			parse_instant(found).is_some_and(|found| found == *at),
		_ => false,
	}
}

fn leaf_instant(leaf: &Value) -> Option<OffsetDateTime> {
	leaf.as_str().and_then(parse_instant)
}

fn format_instant(at: &OffsetDateTime) -> String {
	at.format(&Rfc3339).unwrap_or_default()
}
