use std::sync::Arc;

use wp_config::Config;
use wp_service::{
	Assistant, Collaborators, Providers, refresh::RefreshQueue, session::SessionCoordinator,
};
use wp_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub session: Arc<SessionCoordinator>,
	pub queue: Arc<dyn RefreshQueue>,
	/// Bearer token the upstream gateway must present. `None` disables the check.
	pub api_auth_token: Option<String>,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;

		let collaborators = Collaborators::postgres(db, &config.indexing);
		let assistant = Assistant::new(&config, collaborators, Providers::default());

		Ok(Self::from_assistant(&assistant, config.security.api_auth_token))
	}

	pub fn from_assistant(assistant: &Assistant, api_auth_token: Option<String>) -> Self {
		Self {
			session: assistant.session.clone(),
			queue: assistant.queue.clone(),
			api_auth_token,
		}
	}
}
