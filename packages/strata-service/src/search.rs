pub mod pipeline;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use strata_config::ITEM_KIND;
use strata_domain::{
	filter::ParsedFilter,
	pipeline::{FacetOutput, Pipeline, RedactionScope, SortSpec},
	predicate::{InferenceRules, compile_filters},
	record::SCORE,
	text::TextQuery,
};

use crate::{
	Caller, Error, Result, StrataService,
	diagnostics::{QueryEvent, SearchAudit},
	search::pipeline::SearchPlanArgs,
};

/// Query parameters of a search request, as received.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchRequest {
	/// Comma-separated schema kinds.
	pub dataset: Option<String>,
	pub keywords: Option<String>,
	pub project: Option<String>,
	#[serde(rename = "pageNum")]
	pub page_num: Option<String>,
	#[serde(rename = "pageSize")]
	pub page_size: Option<String>,
	#[serde(rename = "sortBy")]
	pub sort_by: Option<String>,
	#[serde(rename = "caseSensitive", alias = "caseSensitiveSearch")]
	pub case_sensitive: Option<String>,
	pub and: Option<String>,
	pub or: Option<String>,
	pub populate: Option<String>,
	#[serde(rename = "_id")]
	pub item_id: Option<String>,
	#[serde(rename = "_schemaName")]
	pub item_kind: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchMeta {
	#[serde(rename = "searchResultsTotal")]
	pub search_results_total: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	#[serde(rename = "searchResults")]
	pub search_results: Vec<Value>,
	pub meta: Vec<SearchMeta>,
}
impl SearchResponse {
	pub fn total(&self) -> usize {
		self.meta.first().map(|meta| meta.search_results_total).unwrap_or_default()
	}
}
impl From<FacetOutput> for SearchResponse {
	fn from(output: FacetOutput) -> Self {
		Self {
			search_results: output.results,
			meta: vec![SearchMeta { search_results_total: output.total }],
		}
	}
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
	Page(SearchResponse),
	/// Item fetch: empty, or the single visible record.
	Item(Vec<Value>),
}

impl StrataService {
	pub async fn search(&self, caller: &Caller, req: SearchRequest) -> Result<SearchOutcome> {
		let dataset = parse_dataset(req.dataset.as_deref())?;

		self.providers
			.diagnostics
			.audit(&SearchAudit::new(req.keywords.as_deref(), caller.display_name.as_deref()));

		if dataset.first().map(String::as_str) == Some(ITEM_KIND) {
			return Ok(SearchOutcome::Item(self.fetch_item(caller, &req).await?));
		}

		let (pipeline, event) = self.plan_search(caller, &req, &dataset)?;

		self.providers.diagnostics.record(&event);

		let output = self.with_store_timeout(self.store.aggregate(&pipeline)).await?;

		Ok(SearchOutcome::Page(output.into()))
	}

	fn plan_search(
		&self,
		caller: &Caller,
		req: &SearchRequest,
		kinds: &[String],
	) -> Result<(Pipeline, QueryEvent)> {
		let search = &self.cfg.search;
		let resolved = self.registry.resolve(kinds)?;
		let project = parse_uuid("project", req.project.as_deref())?;
		let page_num = parse_count("pageNum", req.page_num.as_deref())?.unwrap_or(0);
		let page_size = match parse_count("pageSize", req.page_size.as_deref())? {
			Some(0) => {
				return Err(Error::InvalidRequest {
					message: "pageSize must be greater than zero.".to_string(),
				});
			},
			Some(size) => size.min(search.max_page_size as usize),
			None => search.default_page_size as usize,
		};
		let case_sensitive = parse_flag("caseSensitive", req.case_sensitive.as_deref())?;
		let text = req.keywords.as_deref().and_then(|raw| TextQuery::new(raw, case_sensitive));
		let sort = req
			.sort_by
			.as_deref()
			.and_then(SortSpec::parse)
			.or_else(|| text.as_ref().map(|_| SortSpec::descending(SCORE)));
		let and_filter = ParsedFilter::parse(req.and.as_deref().unwrap_or_default());
		let or_filter = ParsedFilter::parse(req.or.as_deref().unwrap_or_default());
		let compiled =
			compile_filters(&and_filter, &or_filter, &InferenceRules::from_config(search));
		let pipeline = pipeline::build_search_pipeline(SearchPlanArgs {
			kinds: resolved.kinds,
			includes_flavour: resolved.includes_flavour,
			project,
			text,
			compiled: &compiled,
			redaction: RedactionScope {
				roles: caller.roles.clone(),
				max_depth: search.max_redaction_depth,
			},
			weights: search.text,
			sort,
			skip: page_num.saturating_mul(page_size),
			limit: page_size,
		});
		let event = QueryEvent::new(kinds, and_filter, or_filter, &compiled, &pipeline);

		Ok((pipeline, event))
	}
}

pub(crate) fn parse_dataset(raw: Option<&str>) -> Result<Vec<String>> {
	let kinds: Vec<String> = raw
		.unwrap_or_default()
		.split(',')
		.map(str::trim)
		.filter(|kind| !kind.is_empty())
		.map(str::to_string)
		.collect();

	if kinds.is_empty() {
		return Err(Error::InvalidRequest { message: "dataset is required.".to_string() });
	}

	Ok(kinds)
}

pub(crate) fn parse_uuid(field: &str, raw: Option<&str>) -> Result<Option<Uuid>> {
	let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
		return Ok(None);
	};

	Uuid::parse_str(raw)
		.map(Some)
		.map_err(|_| Error::InvalidRequest { message: format!("{field} must be a valid id.") })
}

pub(crate) fn parse_flag(field: &str, raw: Option<&str>) -> Result<bool> {
	match raw.map(str::trim) {
		None | Some("") | Some("false") | Some("0") => Ok(false),
		Some("true") | Some("1") => Ok(true),
		Some(_) => Err(Error::InvalidRequest { message: format!("{field} must be true or false.") }),
	}
}

fn parse_count(field: &str, raw: Option<&str>) -> Result<Option<usize>> {
	let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
		return Ok(None);
	};

	raw.parse::<usize>().map(Some).map_err(|_| Error::InvalidRequest {
		message: format!("{field} must be a non-negative integer."),
	})
}
