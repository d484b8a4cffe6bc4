pub mod access;
pub mod diagnostics;
pub mod documents;
pub mod item;
pub mod search;
pub mod store;

mod error;

pub use access::Caller;
pub use diagnostics::{QueryEvent, SearchAudit, TracingDiagnostics};
pub use documents::{AttachDocumentRequest, DocumentSetResponse};
pub use error::{Error, Result};
pub use search::{SearchMeta, SearchOutcome, SearchRequest, SearchResponse};
pub use store::PgStore;
pub use strata_providers::identity::Identity;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;
use uuid::Uuid;

use strata_config::Config;
use strata_domain::{
	pipeline::{FacetOutput, Pipeline},
	schema::SchemaRegistry,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backing collection of record documents.
pub trait DocumentStore
where
	Self: Send + Sync,
{
	/// Evaluates a pipeline over one consistent view of the collection.
	fn aggregate<'a>(&'a self, pipeline: &'a Pipeline) -> BoxFuture<'a, Result<FacetOutput>>;

	fn attach_document<'a>(
		&'a self,
		record_id: Uuid,
		document_id: Uuid,
	) -> BoxFuture<'a, Result<Value>>;

	fn detach_document<'a>(
		&'a self,
		record_id: Uuid,
		document_id: Uuid,
	) -> BoxFuture<'a, Result<Value>>;
}

pub trait IdentityProvider
where
	Self: Send + Sync,
{
	fn resolve<'a>(
		&'a self,
		cfg: &'a strata_config::Identity,
		token: &'a str,
	) -> BoxFuture<'a, Result<Identity>>;
}

/// Receives one event per compiled query and one audit per search request.
pub trait QueryDiagnostics
where
	Self: Send + Sync,
{
	fn record(&self, event: &QueryEvent);

	fn audit(&self, audit: &SearchAudit);
}

#[derive(Clone)]
pub struct Providers {
	pub identity: Arc<dyn IdentityProvider>,
	pub diagnostics: Arc<dyn QueryDiagnostics>,
}
impl Providers {
	pub fn new(identity: Arc<dyn IdentityProvider>, diagnostics: Arc<dyn QueryDiagnostics>) -> Self {
		Self { identity, diagnostics }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { identity: Arc::new(DefaultProviders), diagnostics: Arc::new(TracingDiagnostics) }
	}
}

pub struct StrataService {
	pub cfg: Config,
	pub registry: SchemaRegistry,
	pub store: Arc<dyn DocumentStore>,
	pub providers: Providers,
}
impl StrataService {
	pub fn new(cfg: Config, store: Arc<dyn DocumentStore>) -> Self {
		Self::with_providers(cfg, store, Providers::default())
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn DocumentStore>, providers: Providers) -> Self {
		let registry = SchemaRegistry::from_config(&cfg.schema.kinds);

		Self { cfg, registry, store, providers }
	}

	/// Runs a store call under the configured query timeout.
	pub(crate) async fn with_store_timeout<T>(
		&self,
		call: impl Future<Output = Result<T>>,
	) -> Result<T> {
		let timeout_ms = self.cfg.search.query_timeout_ms;

		match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
			Ok(result) => result,
			Err(_) => Err(Error::StoreTimeout { timeout_ms }),
		}
	}
}

struct DefaultProviders;

impl IdentityProvider for DefaultProviders {
	fn resolve<'a>(
		&'a self,
		cfg: &'a strata_config::Identity,
		token: &'a str,
	) -> BoxFuture<'a, Result<Identity>> {
		Box::pin(async move { Ok(strata_providers::identity::resolve(cfg, token).await?) })
	}
}
