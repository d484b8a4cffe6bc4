#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
}
impl Error {
	/// Whether the failure came from reaching the database rather than from the request.
	pub fn is_unavailable(&self) -> bool {
		matches!(
			self,
			Self::Sqlx(
				sqlx::Error::Io(_)
					| sqlx::Error::Tls(_)
					| sqlx::Error::PoolTimedOut
					| sqlx::Error::PoolClosed
					| sqlx::Error::WorkerCrashed
			)
		)
	}
}
