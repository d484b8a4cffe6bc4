//! Filter parser.
//!
//! Turns the `and` / `or` request parameters into a flat, ordered mapping of dotted field paths
//! to raw values. Two encodings are accepted: the nested query-string form
//! (`status=active&issuedTo[type]=Company&kind=a&kind=b`) and a JSON object
//! (`{"status":"active","issuedTo":{"type":"Company"}}`).
//!
//! A key that cannot be decoded is dropped and reported in [`ParsedFilter::malformed`]; the
//! rest of the filter still applies.

use std::{
	borrow::Cow,
	fmt::{Display, Formatter},
};

use serde::Serialize;
use serde_json::Value;

use crate::record::MASTER_PREFIX;

pub const MAX_FILTER_PAIRS: usize = 256;
pub const MAX_LIST_ITEMS: usize = 128;
pub const MAX_KEY_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
	Scalar(String),
	List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterEntry {
	pub path: String,
	pub value: RawValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedFilter {
	pub key: String,
	pub reason: String,
}
impl Display for MalformedFilter {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.key, self.reason)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
	/// Paths evaluated against the record itself.
	Record,
	/// Paths under the master-linkage prefix, evaluated against the joined master.
	Master,
}
impl FilterScope {
	pub fn of(path: &str) -> Self {
		if path.starts_with(MASTER_PREFIX) { Self::Master } else { Self::Record }
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedFilter {
	pub entries: Vec<FilterEntry>,
	pub malformed: Vec<MalformedFilter>,
}
impl ParsedFilter {
	pub fn parse(raw: &str) -> Self {
		let trimmed = raw.trim();
		let mut parsed = Self::default();

		if trimmed.is_empty() {
			return parsed;
		}

		if trimmed.starts_with('{') {
			parsed.parse_json(trimmed);
		} else {
			parsed.parse_query(trimmed);
		}

		parsed
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries that belong to one scope, in input order.
	pub fn scoped(&self, scope: FilterScope) -> impl Iterator<Item = &FilterEntry> {
		self.entries.iter().filter(move |entry| FilterScope::of(&entry.path) == scope)
	}

	pub fn get(&self, path: &str) -> Option<&RawValue> {
		self.entries.iter().find(|entry| entry.path == path).map(|entry| &entry.value)
	}

	fn parse_query(&mut self, raw: &str) {
		for (index, pair) in raw.split('&').filter(|pair| !pair.is_empty()).enumerate() {
			if index >= MAX_FILTER_PAIRS {
				self.reject(pair, format!("filter exceeds pair limit ({MAX_FILTER_PAIRS})."));

				continue;
			}

			let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
			let key = match decode_component(raw_key) {
				Ok(key) => key,
				Err(reason) => {
					self.reject(raw_key, reason);

					continue;
				},
			};
			let value = match decode_component(raw_value) {
				Ok(value) => value,
				Err(reason) => {
					self.reject(&key, reason);

					continue;
				},
			};

			match parse_key(&key) {
				Ok(KeyPath { path, append }) => self.insert(path, value.into_owned(), append),
				Err(reason) => self.reject(&key, reason),
			}
		}
	}

	fn parse_json(&mut self, raw: &str) {
		match serde_json::from_str::<Value>(raw) {
			Ok(Value::Object(map)) =>
				for (key, value) in map {
					if self.entries.len() >= MAX_FILTER_PAIRS {
						self.reject(&key, format!("filter exceeds pair limit ({MAX_FILTER_PAIRS})."));

						continue;
					}

					self.flatten_json(key, value, 1);
				},
			Ok(_) => self.reject("$", "JSON filter must be an object.".to_string()),
			Err(err) => self.reject("$", format!("invalid JSON filter: {err}.")),
		}
	}

	fn flatten_json(&mut self, path: String, value: Value, depth: usize) {
		if let Err(reason) = validate_dotted(&path) {
			self.reject(&path, reason);

			return;
		}
		if depth > MAX_KEY_DEPTH {
			self.reject(&path, format!("key nesting exceeds depth limit ({MAX_KEY_DEPTH})."));

			return;
		}

		match value {
			Value::Object(map) =>
				for (key, child) in map {
					self.flatten_json(format!("{path}.{key}"), child, depth + 1);
				},
			Value::Array(items) => {
				let mut scalars = Vec::with_capacity(items.len());

				for item in items {
					match json_scalar(item) {
						Some(scalar) => scalars.push(scalar),
						None => {
							self.reject(&path, "list items must be scalars.".to_string());

							return;
						},
					}
				}

				for scalar in scalars {
					self.insert(path.clone(), scalar, true);
				}
			},
			other => match json_scalar(other) {
				Some(scalar) => self.insert(path, scalar, false),
				None => self.reject(&path, "null is not a filter value.".to_string()),
			},
		}
	}

	fn insert(&mut self, path: String, value: String, append: bool) {
		let Some(entry) = self.entries.iter_mut().find(|entry| entry.path == path) else {
			let value = if append { RawValue::List(vec![value]) } else { RawValue::Scalar(value) };

			self.entries.push(FilterEntry { path, value });

			return;
		};
		let overflow = match &mut entry.value {
			RawValue::List(items) if items.len() >= MAX_LIST_ITEMS => true,
			RawValue::List(items) => {
				items.push(value);

				false
			},
			RawValue::Scalar(existing) => {
				entry.value = RawValue::List(vec![std::mem::take(existing), value]);

				false
			},
		};

		if overflow {
			self.reject(&path, format!("list exceeds item limit ({MAX_LIST_ITEMS})."));
		}
	}

	fn reject(&mut self, key: &str, reason: String) {
		self.malformed.push(MalformedFilter { key: key.to_string(), reason });
	}
}

struct KeyPath {
	path: String,
	append: bool,
}

fn decode_component(raw: &str) -> Result<Cow<'_, str>, String> {
	if !raw.contains('+') {
		return urlencoding::decode(raw).map_err(|_| "invalid percent-encoding.".to_string());
	}

	let spaced = raw.replace('+', " ");

	urlencoding::decode(&spaced)
		.map(|decoded| Cow::Owned(decoded.into_owned()))
		.map_err(|_| "invalid percent-encoding.".to_string())
}

/// Parses `base[a][b]`, `base[]` and `base[0]` keys into a dotted path.
///
/// Empty and numeric bracket segments mark a list element instead of adding a path segment.
fn parse_key(key: &str) -> Result<KeyPath, String> {
	let (base, mut rest) = match key.find('[') {
		Some(index) => (&key[..index], &key[index..]),
		None => (key, ""),
	};

	if base.is_empty() {
		return Err("key has an empty base name.".to_string());
	}
	if base.contains(']') {
		return Err("key has an unbalanced bracket.".to_string());
	}

	let mut segments = vec![base.to_string()];
	let mut append = false;
	let mut depth = 1;

	while !rest.is_empty() {
		let Some(inner) = rest.strip_prefix('[') else {
			return Err("unexpected text after a bracket segment.".to_string());
		};
		let Some(close) = inner.find(']') else {
			return Err("key has an unbalanced bracket.".to_string());
		};
		let segment = &inner[..close];

		if segment.contains('[') {
			return Err("key has an unbalanced bracket.".to_string());
		}
		if append {
			return Err("list marker must be the last key segment.".to_string());
		}

		depth += 1;

		if depth > MAX_KEY_DEPTH {
			return Err(format!("key nesting exceeds depth limit ({MAX_KEY_DEPTH})."));
		}

		if segment.is_empty() || segment.bytes().all(|byte| byte.is_ascii_digit()) {
			append = true;
		} else {
			segments.push(segment.to_string());
		}

		rest = &inner[close + 1..];
	}

	let path = segments.join(".");

	validate_dotted(&path)?;

	Ok(KeyPath { path, append })
}

fn validate_dotted(path: &str) -> Result<(), String> {
	if path.split('.').any(str::is_empty) {
		return Err("key has an empty path segment.".to_string());
	}
	if path.split('.').count() > MAX_KEY_DEPTH {
		return Err(format!("key nesting exceeds depth limit ({MAX_KEY_DEPTH})."));
	}

	Ok(())
}

fn json_scalar(value: Value) -> Option<String> {
	match value {
		Value::String(value) => Some(value),
		Value::Number(value) => Some(value.to_string()),
		Value::Bool(value) => Some(value.to_string()),
		Value::Null | Value::Array(_) | Value::Object(_) => None,
	}
}

#[cfg(test)]
mod tests {
	use crate::filter::{
		FilterScope, MAX_FILTER_PAIRS, MAX_KEY_DEPTH, MAX_LIST_ITEMS, ParsedFilter, RawValue,
	};

	fn scalar(value: &str) -> RawValue {
		RawValue::Scalar(value.to_string())
	}

	fn list(values: &[&str]) -> RawValue {
		RawValue::List(values.iter().map(|value| value.to_string()).collect())
	}

	#[test]
	fn empty_input_yields_no_entries() {
		assert!(ParsedFilter::parse("").is_empty());
		assert!(ParsedFilter::parse("   ").is_empty());
		assert!(ParsedFilter::parse("&&").is_empty());
	}

	#[test]
	fn repeated_keys_become_ordered_lists() {
		let parsed = ParsedFilter::parse("status=open&status=closed&author=BCMI&status=pending");

		assert_eq!(parsed.get("status"), Some(&list(&["open", "closed", "pending"])));
		assert_eq!(parsed.get("author"), Some(&scalar("BCMI")));
		assert_eq!(parsed.entries[0].path, "status");
	}

	#[test]
	fn bracket_keys_flatten_to_dotted_paths() {
		let parsed = ParsedFilter::parse(
			"issuedTo[type]=Company&outcome%5Bcode%5D=A%20B&tags[]=x&tags[]=y&legislation[0]=Mines+Act",
		);

		assert_eq!(parsed.get("issuedTo.type"), Some(&scalar("Company")));
		assert_eq!(parsed.get("outcome.code"), Some(&scalar("A B")));
		assert_eq!(parsed.get("tags"), Some(&list(&["x", "y"])));
		assert_eq!(parsed.get("legislation"), Some(&list(&["Mines Act"])));
		assert!(parsed.malformed.is_empty());
	}

	#[test]
	fn malformed_keys_are_dropped_softly() {
		let parsed =
			ParsedFilter::parse("a[b=1&[x]=2&c[d]e=3&f..g=4&h=%ZZ&ok=yes&i[]=1&j[][k]=2");

		assert_eq!(parsed.entries.len(), 2);
		assert_eq!(parsed.get("ok"), Some(&scalar("yes")));
		assert_eq!(parsed.get("i"), Some(&list(&["1"])));
		assert_eq!(parsed.malformed.len(), 6);
		assert!(parsed.malformed.iter().any(|entry| entry.key == "a[b"));
	}

	#[test]
	fn rejects_keys_nested_too_deep() {
		let key = (0..MAX_KEY_DEPTH).fold("a".to_string(), |key, _| format!("{key}[n]"));
		let parsed = ParsedFilter::parse(&format!("{key}=1"));

		assert!(parsed.is_empty());
		assert_eq!(parsed.malformed.len(), 1);
	}

	#[test]
	fn enforces_pair_and_list_limits() {
		let many =
			(0..MAX_FILTER_PAIRS + 3).map(|i| format!("k{i}=v")).collect::<Vec<_>>().join("&");
		let parsed = ParsedFilter::parse(&many);

		assert_eq!(parsed.entries.len(), MAX_FILTER_PAIRS);
		assert_eq!(parsed.malformed.len(), 3);

		let long = (0..MAX_LIST_ITEMS + 1).map(|i| format!("k={i}")).collect::<Vec<_>>().join("&");
		let parsed = ParsedFilter::parse(&long);

		match parsed.get("k") {
			Some(RawValue::List(items)) => assert_eq!(items.len(), MAX_LIST_ITEMS),
			other => panic!("expected list, got {other:?}"),
		}
		assert_eq!(parsed.malformed.len(), 1);
	}

	#[test]
	fn json_form_flattens_objects_and_lists() {
		let parsed = ParsedFilter::parse(
			r#"{"decisionDateStart":"2022-06-01","issuedTo":{"type":"Company"},"year":2020,"flag":true,"kind":["a","b"],"bad":[{"x":1}],"nil":null}"#,
		);

		assert_eq!(parsed.get("decisionDateStart"), Some(&scalar("2022-06-01")));
		assert_eq!(parsed.get("issuedTo.type"), Some(&scalar("Company")));
		assert_eq!(parsed.get("year"), Some(&scalar("2020")));
		assert_eq!(parsed.get("flag"), Some(&scalar("true")));
		assert_eq!(parsed.get("kind"), Some(&list(&["a", "b"])));
		assert_eq!(parsed.malformed.len(), 2);
	}

	#[test]
	fn invalid_json_is_reported_not_fatal() {
		let parsed = ParsedFilter::parse("{not json");

		assert!(parsed.is_empty());
		assert_eq!(parsed.malformed.len(), 1);
	}

	#[test]
	fn splits_entries_by_master_prefix() {
		let parsed = ParsedFilter::parse("_master.status=active&status=draft&_master=abc");
		let record: Vec<_> = parsed.scoped(FilterScope::Record).map(|e| e.path.as_str()).collect();
		let master: Vec<_> = parsed.scoped(FilterScope::Master).map(|e| e.path.as_str()).collect();

		assert_eq!(record, vec!["status", "_master"]);
		assert_eq!(master, vec!["_master.status"]);
	}
}
