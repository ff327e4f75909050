use std::sync::Arc;

use quarry_service::{Collaborators, QuarryService};
use quarry_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<QuarryService>,
}
impl AppState {
	/// Connects Postgres, bootstraps the schema, and wires the default collaborators.
	pub async fn new(config: quarry_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let collaborators = Collaborators::from_config(&config, Arc::new(db))?;

		Ok(Self::from_service(QuarryService::new(config, collaborators)))
	}

	pub fn from_service(service: QuarryService) -> Self {
		Self { service: Arc::new(service) }
	}
}
