use strata_domain::schema::UnknownSchemaKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unknown schema kind: {kind}")]
	UnknownSchemaKind { kind: String },
	#[error("Unauthenticated: {message}")]
	Unauthenticated { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Query matches more than {limit} candidate records. Narrow the filters.")]
	QueryTooBroad { limit: u32 },
	#[error("Store unavailable: {message}")]
	StoreUnavailable { message: String },
	#[error("Store timed out after {timeout_ms} ms.")]
	StoreTimeout { timeout_ms: u64 },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl Error {
	/// Whether the same request may succeed when sent again unchanged.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::StoreUnavailable { .. } | Self::StoreTimeout { .. })
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		strata_storage::Error::Sqlx(err).into()
	}
}

impl From<strata_storage::Error> for Error {
	fn from(err: strata_storage::Error) -> Self {
		if err.is_unavailable() {
			return Self::StoreUnavailable { message: err.to_string() };
		}

		match err {
			strata_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			strata_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			strata_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<strata_providers::Error> for Error {
	fn from(err: strata_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<UnknownSchemaKind> for Error {
	fn from(err: UnknownSchemaKind) -> Self {
		Self::UnknownSchemaKind { kind: err.kind }
	}
}
