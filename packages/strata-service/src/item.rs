use serde_json::Value;
use uuid::Uuid;

use strata_domain::{
	pipeline::{Pipeline, RedactionScope, Stage},
	predicate::{FieldValue, Predicate},
	record::{FLAVOUR_RECORDS, ID, MASTER, SCHEMA_NAME},
	schema::KindRole,
};

use crate::{
	Caller, Error, Result, StrataService,
	diagnostics::QueryEvent,
	search::{SearchRequest, parse_flag, parse_uuid},
};

impl StrataService {
	/// Point lookup of one record by `_id` within `_schemaName`.
	///
	/// Returns an empty list when the record is missing or hidden from the caller; the two cases
	/// look the same. With `populate` on a master kind, the record carries its visible live
	/// flavours under `_flavourRecords`.
	pub async fn fetch_item(&self, caller: &Caller, req: &SearchRequest) -> Result<Vec<Value>> {
		let Some(item_id) = parse_uuid("_id", req.item_id.as_deref())? else {
			return Err(Error::InvalidRequest { message: "_id is required.".to_string() });
		};
		let Some(kind) = req.item_kind.as_deref().map(str::trim).filter(|kind| !kind.is_empty())
		else {
			return Err(Error::InvalidRequest { message: "_schemaName is required.".to_string() });
		};
		let role = self.registry.role(kind)?.clone();
		let populate = parse_flag("populate", req.populate.as_deref())?;
		let redaction = RedactionScope {
			roles: caller.roles.clone(),
			max_depth: self.cfg.search.max_redaction_depth,
		};
		let pipeline = item_pipeline(item_id, kind, redaction.clone());

		self.providers.diagnostics.record(&QueryEvent::item(kind, &pipeline));

		let output = self.with_store_timeout(self.store.aggregate(&pipeline)).await?;
		let Some(mut record) = output.results.into_iter().next() else {
			return Ok(Vec::new());
		};

		if populate
			&& let KindRole::Master { flavours } = &role
			&& !flavours.is_empty()
		{
			let pipeline = flavour_pipeline(item_id, flavours, redaction);
			let output = self.with_store_timeout(self.store.aggregate(&pipeline)).await?;

			if let Value::Object(map) = &mut record {
				map.insert(FLAVOUR_RECORDS.to_string(), Value::Array(output.results));
			}
		}

		Ok(vec![record])
	}
}

fn item_pipeline(item_id: Uuid, kind: &str, redaction: RedactionScope) -> Pipeline {
	Pipeline::new(vec![
		Stage::Match(Predicate::And(vec![
			Predicate::Eq { path: ID.to_string(), value: FieldValue::Identifier(item_id) },
			Predicate::In { path: SCHEMA_NAME.to_string(), values: vec![kind.to_string()] },
		])),
		Stage::Redact(redaction),
	])
}

fn flavour_pipeline(master_id: Uuid, flavours: &[String], redaction: RedactionScope) -> Pipeline {
	Pipeline::new(vec![
		Stage::Match(Predicate::And(vec![
			Predicate::In { path: SCHEMA_NAME.to_string(), values: flavours.to_vec() },
			Predicate::Eq { path: MASTER.to_string(), value: FieldValue::Identifier(master_id) },
			Predicate::NotDeleted,
		])),
		Stage::Redact(redaction),
	])
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use strata_domain::{pipeline::RedactionScope, roles::RoleSet};

	use crate::item::{flavour_pipeline, item_pipeline};

	fn redaction() -> RedactionScope {
		RedactionScope { roles: RoleSet::new(["public"]), max_depth: 32 }
	}

	#[test]
	fn item_and_flavour_pipelines_push_down_their_keys() {
		let id = Uuid::new_v4();
		let item = item_pipeline(id, "Order", redaction()).candidate_scope();

		assert_eq!(item.ids, vec![id]);
		assert_eq!(item.kinds, vec!["Order".to_string()]);
		assert!(!item.exclude_deleted);

		let flavours = vec!["OrderLNG".to_string()];
		let flavour = flavour_pipeline(id, &flavours, redaction()).candidate_scope();

		assert_eq!(flavour.master, Some(id));
		assert_eq!(flavour.kinds, flavours);
		assert!(flavour.exclude_deleted);
	}
}
