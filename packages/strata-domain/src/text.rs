use std::collections::HashSet;

use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;

use strata_config::SearchText;

use crate::record::{DOCUMENTS, ID, MASTER, PROJECT, READ, SCHEMA_NAME, SCORE, WRITE};

/// Keys whose values are bookkeeping and never searched as text.
const SYSTEM_KEYS: [&str; 8] = [ID, SCHEMA_NAME, MASTER, READ, WRITE, PROJECT, DOCUMENTS, SCORE];

/// Keyword query: a record matches when any term occurs as a word in one of its text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
	raw: String,
	terms: Vec<String>,
	case_sensitive: bool,
}
impl TextQuery {
	/// Returns `None` when the keywords contain no words.
	pub fn new(keywords: &str, case_sensitive: bool) -> Option<Self> {
		let mut seen = HashSet::new();
		let terms: Vec<String> = keywords
			.unicode_words()
			.map(|word| fold(word, case_sensitive))
			.filter(|word| seen.insert(word.clone()))
			.collect();

		if terms.is_empty() {
			return None;
		}

		Some(Self { raw: keywords.trim().to_string(), terms, case_sensitive })
	}

	pub fn matches(&self, doc: &Value) -> bool {
		self.tally(doc).matched_terms > 0
	}

	/// Relevance in `[0, 1]`.
	///
	/// Blends term coverage (share of distinct terms found) with a saturating hit count so that
	/// one repeated word cannot outrank a record that mentions every term.
	pub fn score(&self, doc: &Value, weights: &SearchText) -> f64 {
		let tally = self.tally(doc);

		if tally.matched_terms == 0 {
			return 0.0;
		}

		let coverage = tally.matched_terms as f64 / self.terms.len() as f64;
		let hits = tally.hits as f64;
		let saturation = hits / (hits + f64::from(weights.half_saturation));
		let weight = f64::from(weights.coverage_weight);

		(weight * coverage + (1.0 - weight) * saturation).clamp(0.0, 1.0)
	}

	pub fn to_value(&self) -> Value {
		serde_json::json!({
			"op": "text",
			"search": self.raw,
			"terms": self.terms,
			"case_sensitive": self.case_sensitive,
		})
	}

	fn tally(&self, doc: &Value) -> Tally {
		let mut counts = vec![0_usize; self.terms.len()];

		if let Value::Object(map) = doc {
			self.count_object(map, true, &mut counts);
		}

		Tally {
			matched_terms: counts.iter().filter(|count| **count > 0).count(),
			hits: counts.iter().sum(),
		}
	}

	fn count_object(&self, map: &Map<String, Value>, top_level: bool, counts: &mut [usize]) {
		for (key, value) in map {
			if top_level && SYSTEM_KEYS.contains(&key.as_str()) {
				continue;
			}

			self.count_value(value, counts);
		}
	}

	fn count_value(&self, value: &Value, counts: &mut [usize]) {
		match value {
			Value::String(text) =>
				for word in text.unicode_words() {
					let word = fold(word, self.case_sensitive);

					if let Some(index) = self.terms.iter().position(|term| *term == word) {
						counts[index] += 1;
					}
				},
			Value::Array(items) =>
				for item in items {
					self.count_value(item, counts);
				},
			Value::Object(map) => self.count_object(map, false, counts),
			Value::Null | Value::Bool(_) | Value::Number(_) => {},
		}
	}
}

struct Tally {
	matched_terms: usize,
	hits: usize,
}

fn fold(word: &str, case_sensitive: bool) -> String {
	if case_sensitive { word.to_string() } else { word.to_lowercase() }
}
