//! Role-based redaction.
//!
//! Every JSON object may carry a `read` list. The walk decides per object whether the caller
//! sees it whole, sees nothing of it, or needs its children checked one by one.

use serde_json::{Map, Value};

use crate::{record::READ, roles::RoleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	/// The caller holds one of the listed roles; the object is emitted unchanged.
	Keep,
	/// The object declares roles and the caller holds none of them.
	Prune,
	/// No restriction at this level; children are evaluated on their own.
	Descend,
}

/// Decides one object. A `read` that is neither `null` nor an array counts as an empty list.
pub fn decide(object: &Map<String, Value>, roles: &RoleSet) -> Decision {
	match object.get(READ) {
		None | Some(Value::Null) => Decision::Descend,
		Some(Value::Array(allowed)) =>
			if roles.intersects(allowed.iter().filter_map(Value::as_str)) {
				Decision::Keep
			} else {
				Decision::Prune
			},
		Some(_) => Decision::Prune,
	}
}

/// Redacts a document for the caller. Returns `None` when the document itself is pruned.
///
/// The top-level object sits at depth 1; objects nested deeper than `max_depth` are pruned.
/// Arrays do not count as a level.
pub fn redact(doc: Value, roles: &RoleSet, max_depth: usize) -> Option<Value> {
	redact_value(doc, roles, 1, max_depth)
}

fn redact_value(value: Value, roles: &RoleSet, depth: usize, max_depth: usize) -> Option<Value> {
	match value {
		Value::Object(map) => {
			if depth > max_depth {
				return None;
			}

			match decide(&map, roles) {
				Decision::Keep => Some(Value::Object(map)),
				Decision::Prune => None,
				Decision::Descend => {
					let mut kept = Map::with_capacity(map.len());

					for (key, child) in map {
						if let Some(child) = redact_value(child, roles, depth + 1, max_depth) {
							kept.insert(key, child);
						}
					}

					Some(Value::Object(kept))
				},
			}
		},
		Value::Array(items) => Some(Value::Array(
			items.into_iter().filter_map(|item| redact_value(item, roles, depth, max_depth)).collect(),
		)),
		scalar => Some(scalar),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use crate::{
		redaction::{Decision, decide, redact},
		roles::RoleSet,
	};

	fn public() -> RoleSet {
		RoleSet::new(["public"])
	}

	#[test]
	fn decisions_follow_read_lists() {
		let roles = public();

		let open = json!({ "a": 1 });
		let null = json!({ "read": null });
		let allowed = json!({ "read": ["public", "sysadmin"] });
		let hidden = json!({ "read": ["sysadmin"] });
		let empty = json!({ "read": [] });
		let garbled = json!({ "read": "public" });

		assert_eq!(decide(open.as_object().expect("object"), &roles), Decision::Descend);
		assert_eq!(decide(null.as_object().expect("object"), &roles), Decision::Descend);
		assert_eq!(decide(allowed.as_object().expect("object"), &roles), Decision::Keep);
		assert_eq!(decide(hidden.as_object().expect("object"), &roles), Decision::Prune);
		assert_eq!(decide(empty.as_object().expect("object"), &roles), Decision::Prune);
		assert_eq!(decide(garbled.as_object().expect("object"), &roles), Decision::Prune);
	}

	#[test]
	fn sysadmin_only_document_is_pruned_for_public_and_kept_for_admins() {
		let doc = json!({ "read": ["sysadmin"], "summary": "x" });

		assert_eq!(redact(doc.clone(), &public(), 32), None);
		assert_eq!(
			redact(doc.clone(), &RoleSet::new(["sysadmin", "public"]), 32),
			Some(doc)
		);
	}

	#[test]
	fn prunes_nested_objects_and_array_elements() {
		let doc = json!({
			"summary": "visible",
			"internal": { "read": ["sysadmin"], "note": "secret" },
			"attachments": [
				{ "read": ["public"], "name": "a.pdf" },
				{ "read": ["staff"], "name": "b.pdf" },
				{ "name": "c.pdf", "detail": { "read": [], "x": 1 } }
			]
		});
		let redacted = redact(doc, &public(), 32).expect("visible");

		assert_eq!(
			redacted,
			json!({
				"summary": "visible",
				"attachments": [
					{ "read": ["public"], "name": "a.pdf" },
					{ "name": "c.pdf" }
				]
			})
		);
	}

	#[test]
	fn kept_objects_are_not_descended() {
		let doc = json!({
			"read": ["public"],
			"inner": { "read": ["sysadmin"], "x": 1 }
		});

		assert_eq!(redact(doc.clone(), &public(), 32), Some(doc));
	}

	#[test]
	fn depth_bound_prunes_deep_objects() {
		let doc = json!({ "a": { "b": { "c": 1 } }, "list": [{ "x": 1 }] });

		assert_eq!(redact(doc.clone(), &public(), 2), Some(json!({ "a": {}, "list": [{ "x": 1 }] })));
		assert_eq!(redact(doc.clone(), &public(), 1), Some(json!({ "list": [] })));
	}

	#[test]
	fn redaction_is_idempotent() {
		let roles = public();
		let doc = json!({
			"read": null,
			"a": { "read": ["sysadmin"] },
			"b": [{ "read": ["public"], "c": { "read": ["x"] } }, { "d": { "e": { "f": {} } } }]
		});
		let once = redact(doc, &roles, 3).expect("visible");
		let twice = redact(once.clone(), &roles, 3).expect("visible");

		assert_eq!(once, twice);
	}
}
