use std::sync::Arc;

use strata_service::{PgStore, StrataService};
use strata_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<StrataService>,
}
impl AppState {
	pub async fn new(config: strata_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let store = PgStore::new(db, config.search.max_candidates);
		let service = StrataService::new(config, Arc::new(store));

		Ok(Self::from_service(service))
	}

	/// State over an already assembled service, e.g. one backed by another store.
	pub fn from_service(service: StrataService) -> Self {
		Self { service: Arc::new(service) }
	}
}
