use std::cmp::Ordering;

use serde_json::Value;

/// Collects every value reachable at a dotted path.
///
/// Arrays met before the last segment fan out over their elements, and a numeric segment also
/// indexes into an array. Missing segments contribute nothing.
pub fn resolve_path<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
	let mut current = vec![doc];

	for segment in path.split('.') {
		let mut next = Vec::new();

		for node in current {
			step(node, segment, &mut next);
		}

		if next.is_empty() {
			return next;
		}

		current = next;
	}

	current
}

/// First value at a dotted path, used where a single answer is needed (sorting).
pub fn first_at_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
	resolve_path(doc, path).into_iter().next()
}

/// Total order used by the sort stage: missing and null first, then numbers, strings,
/// objects, arrays and booleans.
pub fn compare_for_sort(left: Option<&Value>, right: Option<&Value>) -> Ordering {
	let left = left.unwrap_or(&Value::Null);
	let right = right.unwrap_or(&Value::Null);

	match type_rank(left).cmp(&type_rank(right)) {
		Ordering::Equal => {},
		other => return other,
	}

	match (left, right) {
		(Value::Number(a), Value::Number(b)) => {
			let a = a.as_f64().unwrap_or(0.0);
			let b = b.as_f64().unwrap_or(0.0);

			a.partial_cmp(&b).unwrap_or(Ordering::Equal)
		},
		(Value::String(a), Value::String(b)) => a.cmp(b),
		(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
		(Value::Array(a), Value::Array(b)) => {
			for (x, y) in a.iter().zip(b.iter()) {
				match compare_for_sort(Some(x), Some(y)) {
					Ordering::Equal => {},
					other => return other,
				}
			}

			a.len().cmp(&b.len())
		},
		_ => Ordering::Equal,
	}
}

fn step<'a>(node: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
	match node {
		Value::Object(map) =>
			if let Some(value) = map.get(segment) {
				out.push(value);
			},
		Value::Array(items) => {
			if let Ok(index) = segment.parse::<usize>()
				&& let Some(value) = items.get(index)
			{
				out.push(value);

				return;
			}

			for item in items {
				if let Value::Object(map) = item
					&& let Some(value) = map.get(segment)
				{
					out.push(value);
				}
			}
		},
		_ => {},
	}
}

fn type_rank(value: &Value) -> u8 {
	match value {
		Value::Null => 0,
		Value::Number(_) => 1,
		Value::String(_) => 2,
		Value::Object(_) => 3,
		Value::Array(_) => 4,
		Value::Bool(_) => 5,
	}
}

#[cfg(test)]
mod tests {
	use std::cmp::Ordering;

	use serde_json::json;

	use crate::document::{compare_for_sort, first_at_path, resolve_path};

	#[test]
	fn resolves_nested_objects_and_arrays() {
		let doc = json!({
			"issuedTo": { "type": "Company", "companyName": "Acme" },
			"outcomes": [{ "code": "A" }, { "code": "B" }, { "other": 1 }],
		});

		assert_eq!(resolve_path(&doc, "issuedTo.companyName"), vec![&json!("Acme")]);
		assert_eq!(resolve_path(&doc, "outcomes.code"), vec![&json!("A"), &json!("B")]);
		assert_eq!(resolve_path(&doc, "outcomes.1.code"), vec![&json!("B")]);
		assert!(resolve_path(&doc, "issuedTo.missing").is_empty());
		assert!(resolve_path(&doc, "issuedTo.type.deeper").is_empty());
	}

	#[test]
	fn sort_order_puts_missing_first_and_ranks_types() {
		let doc = json!({ "n": 3, "s": "abc" });

		assert_eq!(compare_for_sort(None, first_at_path(&doc, "n")), Ordering::Less);
		assert_eq!(
			compare_for_sort(first_at_path(&doc, "n"), first_at_path(&doc, "s")),
			Ordering::Less
		);
		assert_eq!(compare_for_sort(Some(&json!(2.5)), Some(&json!(2))), Ordering::Greater);
		assert_eq!(compare_for_sort(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
	}
}
