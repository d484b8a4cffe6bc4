//! Assembles the stage list for a search.

use uuid::Uuid;

use strata_config::SearchText;
use strata_domain::{
	pipeline::{Facet, Lookup, Pipeline, RedactionScope, SortSpec, Stage},
	predicate::{CompiledFilters, FieldValue, Predicate},
	record::{MASTER, PROJECT, SCHEMA_NAME},
	text::TextQuery,
};

pub(crate) struct SearchPlanArgs<'a> {
	pub(crate) kinds: &'a [String],
	pub(crate) includes_flavour: bool,
	pub(crate) project: Option<Uuid>,
	pub(crate) text: Option<TextQuery>,
	pub(crate) compiled: &'a CompiledFilters,
	pub(crate) redaction: RedactionScope,
	pub(crate) weights: SearchText,
	pub(crate) sort: Option<SortSpec>,
	pub(crate) skip: usize,
	pub(crate) limit: usize,
}

/// Stage order: base match on system keys, redaction, field and keyword match, optional master
/// join, scoring, facet.
///
/// Field predicates and keywords only ever see the caller-redacted view of a record, so hidden
/// values cannot be inferred through filters.
pub(crate) fn build_search_pipeline(args: SearchPlanArgs<'_>) -> Pipeline {
	let SearchPlanArgs {
		kinds,
		includes_flavour,
		project,
		text,
		compiled,
		redaction,
		weights,
		sort,
		skip,
		limit,
	} = args;
	let mut base = vec![
		Predicate::In { path: SCHEMA_NAME.to_string(), values: kinds.to_vec() },
		Predicate::NotDeleted,
	];

	if let Some(project) = project {
		base.push(Predicate::Eq {
			path: PROJECT.to_string(),
			value: FieldValue::Identifier(project),
		});
	}

	let mut stages = vec![Stage::Match(Predicate::And(base)), Stage::Redact(redaction.clone())];
	let mut visible = Vec::new();

	if let Some(text) = &text {
		visible.push(Predicate::Text(text.clone()));
	}
	if let Some(group) = &compiled.record {
		visible.push(group.clone());
	}
	if !includes_flavour && let Some(group) = &compiled.master {
		visible.push(group.clone());
	}
	if !visible.is_empty() {
		stages.push(Stage::Match(Predicate::And(visible)));
	}

	if includes_flavour {
		stages.push(Stage::Lookup(Lookup {
			local_field: MASTER.to_string(),
			as_field: MASTER.to_string(),
			redaction: Some(redaction),
		}));

		if let Some(group) = &compiled.master {
			stages.push(Stage::Match(group.clone()));
		}

		stages.push(Stage::Unwind { path: MASTER.to_string() });
	}

	if let Some(query) = text {
		stages.push(Stage::Score { query, weights });
	}

	stages.push(Stage::Facet(Facet { sort, skip, limit }));

	Pipeline::new(stages)
}

#[cfg(test)]
mod tests {
	use strata_config::SearchText;
	use strata_domain::{
		filter::ParsedFilter,
		pipeline::{RedactionScope, SortSpec},
		predicate::{CompiledFilters, InferenceRules, compile_filters},
		roles::RoleSet,
		text::TextQuery,
	};

	use crate::search::pipeline::{SearchPlanArgs, build_search_pipeline};

	fn args<'a>(
		kinds: &'a [String],
		includes_flavour: bool,
		compiled: &'a CompiledFilters,
		text: Option<TextQuery>,
	) -> SearchPlanArgs<'a> {
		SearchPlanArgs {
			kinds,
			includes_flavour,
			project: None,
			text,
			compiled,
			redaction: RedactionScope { roles: RoleSet::new(["public"]), max_depth: 32 },
			weights: SearchText::default(),
			sort: SortSpec::parse("-dateIssued"),
			skip: 0,
			limit: 25,
		}
	}

	#[test]
	fn master_kinds_skip_the_join() {
		let kinds = vec!["Order".to_string()];
		let compiled = CompiledFilters::default();
		let pipeline = build_search_pipeline(args(&kinds, false, &compiled, None));

		assert_eq!(pipeline.shape(), vec!["match", "redact", "facet"]);
		assert_eq!(pipeline.candidate_scope().prefilter, None);
	}

	#[test]
	fn flavour_kinds_join_match_and_unwind_the_master() {
		let kinds = vec!["OrderLNG".to_string()];
		let compiled = compile_filters(
			&ParsedFilter::parse("_master.status=active&summary=x"),
			&ParsedFilter::default(),
			&InferenceRules::default(),
		);
		let text = TextQuery::new("dam", false);
		let pipeline = build_search_pipeline(args(&kinds, true, &compiled, text));

		assert_eq!(
			pipeline.shape(),
			vec!["match", "redact", "match", "lookup", "match", "unwind", "score", "facet"]
		);

		let without_master_group = CompiledFilters::default();
		let pipeline = build_search_pipeline(args(&kinds, true, &without_master_group, None));

		assert_eq!(pipeline.shape(), vec!["match", "redact", "lookup", "unwind", "facet"]);
	}

	#[test]
	fn base_match_pins_kinds_and_excludes_deleted() {
		let kinds = vec!["Order".to_string(), "Inspection".to_string()];
		let compiled = CompiledFilters::default();
		let pipeline = build_search_pipeline(args(&kinds, false, &compiled, None));
		let scope = pipeline.candidate_scope();

		assert_eq!(scope.kinds, kinds);
		assert!(scope.exclude_deleted);
	}

	#[test]
	fn field_filters_run_after_redaction_and_feed_the_prefilter() {
		let kinds = vec!["Order".to_string()];
		let compiled = compile_filters(
			&ParsedFilter::parse("internal.note=secret"),
			&ParsedFilter::default(),
			&InferenceRules::default(),
		);
		let text = TextQuery::new("dam", false);
		let pipeline = build_search_pipeline(args(&kinds, false, &compiled, text));

		assert_eq!(pipeline.shape(), vec!["match", "redact", "match", "score", "facet"]);

		let prefilter = pipeline.candidate_scope().prefilter.expect("prefilter");

		assert_eq!(prefilter.conjuncts().len(), 2);
	}
}
