//! Per-query diagnostics.
//!
//! Each compiled query produces one [`QueryEvent`] describing what was parsed, what was dropped
//! and the pipeline that will run. Every search request also produces one [`SearchAudit`].

use serde::Serialize;
use serde_json::Value;

use strata_domain::{
	filter::ParsedFilter,
	pipeline::Pipeline,
	predicate::{CompiledFilters, InvalidDate},
};

use crate::QueryDiagnostics;

#[derive(Debug, Clone, Serialize)]
pub struct QueryEvent {
	/// Stable hash of the compiled pipeline; equal queries share it.
	pub fingerprint: String,
	pub kinds: Vec<String>,
	pub item_fetch: bool,
	pub and_filter: ParsedFilter,
	pub or_filter: ParsedFilter,
	pub invalid_dates: Vec<String>,
	pub record_group: Option<Value>,
	pub master_group: Option<Value>,
	pub stages: Vec<&'static str>,
	pub pipeline: Value,
}
impl QueryEvent {
	pub fn new(
		kinds: &[String],
		and_filter: ParsedFilter,
		or_filter: ParsedFilter,
		compiled: &CompiledFilters,
		pipeline: &Pipeline,
	) -> Self {
		let pipeline_value = pipeline.to_value();

		Self {
			fingerprint: fingerprint(&pipeline_value),
			kinds: kinds.to_vec(),
			item_fetch: false,
			and_filter,
			or_filter,
			invalid_dates: compiled.invalid_dates.iter().map(InvalidDate::to_string).collect(),
			record_group: compiled.record.as_ref().map(|group| group.to_value()),
			master_group: compiled.master.as_ref().map(|group| group.to_value()),
			stages: pipeline.shape(),
			pipeline: pipeline_value,
		}
	}

	pub fn item(kind: &str, pipeline: &Pipeline) -> Self {
		let mut event = Self::new(
			&[kind.to_string()],
			ParsedFilter::default(),
			ParsedFilter::default(),
			&CompiledFilters::default(),
			pipeline,
		);

		event.item_fetch = true;

		event
	}

	pub fn dropped_keys(&self) -> usize {
		self.and_filter.malformed.len() + self.or_filter.malformed.len()
	}
}

/// Who searched for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchAudit {
	pub action: &'static str,
	pub keywords: Option<String>,
	/// Caller display name, `public` for anonymous callers.
	pub actor: String,
}
impl SearchAudit {
	pub fn new(keywords: Option<&str>, display_name: Option<&str>) -> Self {
		Self {
			action: "Search",
			keywords: keywords.map(str::to_string),
			actor: display_name.unwrap_or("public").to_string(),
		}
	}
}

/// Emits each event as a single `debug` record and each audit as an `info` record.
pub struct TracingDiagnostics;

impl QueryDiagnostics for TracingDiagnostics {
	fn record(&self, event: &QueryEvent) {
		let malformed: Vec<String> = event
			.and_filter
			.malformed
			.iter()
			.chain(event.or_filter.malformed.iter())
			.map(ToString::to_string)
			.collect();
		let record_group = event.record_group.as_ref().map(ToString::to_string);
		let master_group = event.master_group.as_ref().map(ToString::to_string);

		tracing::debug!(
			fingerprint = %event.fingerprint,
			kinds = ?event.kinds,
			item_fetch = event.item_fetch,
			and_entries = ?event.and_filter.entries,
			or_entries = ?event.or_filter.entries,
			dropped_keys = ?malformed,
			invalid_dates = ?event.invalid_dates,
			record_group = ?record_group,
			master_group = ?master_group,
			stages = ?event.stages,
			pipeline = %event.pipeline,
			"Compiled search query."
		);
	}

	fn audit(&self, audit: &SearchAudit) {
		tracing::info!(
			action = audit.action,
			keywords = ?audit.keywords,
			actor = %audit.actor,
			"Recorded search action."
		);
	}
}

fn fingerprint(pipeline: &Value) -> String {
	blake3::hash(pipeline.to_string().as_bytes()).to_hex().to_string()
}
