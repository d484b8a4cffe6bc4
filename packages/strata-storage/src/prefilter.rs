//! Translates pushable predicates into a Postgres `jsonpath` filter over the stored document.
//!
//! Lax-mode member access walks through arrays and comparisons hold when any element matches,
//! which mirrors in-process evaluation. Conditions with no exact translation (identifiers,
//! dates, keywords) become "always true", so the filter only ever keeps a superset of what the
//! evaluator will accept.

use serde_json::{Map, Value};

use strata_domain::predicate::{FieldValue, Predicate};

/// A `jsonpath` expression and the variables it references.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPathFilter {
	pub path: String,
	pub vars: Value,
}

pub fn to_jsonpath(predicate: &Predicate) -> Option<JsonPathFilter> {
	let mut vars = Map::new();
	let condition = condition(predicate, &mut vars)?;

	Some(JsonPathFilter { path: format!("$ ? ({condition})"), vars: Value::Object(vars) })
}

fn condition(predicate: &Predicate, vars: &mut Map<String, Value>) -> Option<String> {
	match predicate {
		Predicate::And(items) => {
			let parts: Vec<String> = items.iter().filter_map(|item| condition(item, vars)).collect();

			if parts.is_empty() { None } else { Some(format!("({})", parts.join(" && "))) }
		},
		Predicate::Or(items) => {
			let parts = items.iter().map(|item| condition(item, vars)).collect::<Option<Vec<_>>>()?;

			if parts.is_empty() { None } else { Some(format!("({})", parts.join(" || "))) }
		},
		Predicate::Eq { path, value } => {
			let accessor = accessor(path)?;
			let literal = match value {
				FieldValue::Bool(flag) => Value::Bool(*flag),
				FieldValue::Number(number) => serde_json::Number::from_f64(*number).map(Value::Number)?,
				FieldValue::Text(text) => Value::String(text.clone()),
				FieldValue::Identifier(_) | FieldValue::DateRangeBound { .. } => return None,
			};

			Some(format!("{accessor} == {}", bind(vars, literal)))
		},
		Predicate::In { path, values } => {
			let accessor = accessor(path)?;

			if values.is_empty() {
				return None;
			}

			let parts: Vec<String> = values
				.iter()
				.map(|value| format!("{accessor} == {}", bind(vars, Value::String(value.clone()))))
				.collect();

			Some(format!("({})", parts.join(" || ")))
		},
		Predicate::Gte { .. } | Predicate::Lt { .. } | Predicate::NotDeleted | Predicate::Text(_) =>
			None,
	}
}

/// `@."a"."b"` for `a.b`. Index-like segments address array positions in process, which lax
/// member access cannot express.
fn accessor(path: &str) -> Option<String> {
	let mut accessor = String::from("@");

	for segment in path.split('.') {
		if segment.is_empty() || segment.bytes().all(|byte| byte.is_ascii_digit()) {
			return None;
		}

		accessor.push('.');
		accessor.push_str(&serde_json::to_string(segment).ok()?);
	}

	Some(accessor)
}

fn bind(vars: &mut Map<String, Value>, value: Value) -> String {
	let name = format!("v{}", vars.len());

	vars.insert(name.clone(), value);

	format!("${name}")
}
