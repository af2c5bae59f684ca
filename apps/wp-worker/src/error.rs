pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] wp_storage::Error),
	#[error("Refresh workers did not shut down cleanly: {0}")]
	Join(#[from] tokio::task::JoinError),
}
