use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use strata_domain::record::DOCUMENTS;

use crate::{Caller, Error, Result, StrataService};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachDocumentRequest {
	pub document_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentSetResponse {
	pub record_id: Uuid,
	pub documents: Vec<Value>,
}
impl DocumentSetResponse {
	fn from_record(record_id: Uuid, doc: &Value) -> Self {
		let documents = doc.get(DOCUMENTS).and_then(Value::as_array).cloned().unwrap_or_default();

		Self { record_id, documents }
	}
}

impl StrataService {
	pub async fn attach_document(
		&self,
		caller: &Caller,
		record_id: Uuid,
		req: AttachDocumentRequest,
	) -> Result<DocumentSetResponse> {
		require_authenticated(caller)?;

		let doc = self
			.with_store_timeout(self.store.attach_document(record_id, req.document_id))
			.await?;

		tracing::info!(%record_id, document_id = %req.document_id, "Document attached.");

		Ok(DocumentSetResponse::from_record(record_id, &doc))
	}

	pub async fn detach_document(
		&self,
		caller: &Caller,
		record_id: Uuid,
		document_id: Uuid,
	) -> Result<DocumentSetResponse> {
		require_authenticated(caller)?;

		let doc =
			self.with_store_timeout(self.store.detach_document(record_id, document_id)).await?;

		tracing::info!(%record_id, %document_id, "Document detached.");

		Ok(DocumentSetResponse::from_record(record_id, &doc))
	}
}

fn require_authenticated(caller: &Caller) -> Result<()> {
	if caller.is_authenticated {
		return Ok(());
	}

	Err(Error::Unauthenticated {
		message: "Document changes require an authenticated caller.".to_string(),
	})
}
