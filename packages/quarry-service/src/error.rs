pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid key: {message}")]
	InvalidKey { message: String },
	#[error("Invalid token: {message}")]
	InvalidToken { message: String },
	#[error("Invalid format: {message}")]
	InvalidFormat { message: String },
	#[error("Resource not available: {message}")]
	ResourceNotAvailable { message: String },
	#[error("Resource exists: {message}")]
	ResourceExists { message: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("Queue error: {message}")]
	Queue { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	/// Stable machine-readable code for transports.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidKey { .. } => "INVALID_KEY",
			Self::InvalidToken { .. } => "INVALID_TOKEN",
			Self::InvalidFormat { .. } => "INVALID_FORMAT",
			Self::ResourceNotAvailable { .. } => "RESOURCE_NOT_AVAILABLE",
			Self::ResourceExists { .. } => "RESOURCE_EXISTS",
			Self::Backend { .. } => "BACKEND_ERROR",
			Self::Queue { .. } => "QUEUE_ERROR",
			Self::Storage { .. } => "STORAGE_ERROR",
		}
	}
}

impl From<quarry_domain::Error> for Error {
	fn from(err: quarry_domain::Error) -> Self {
		match err {
			quarry_domain::Error::InvalidFormat { message } => Self::InvalidFormat { message },
		}
	}
}

impl From<quarry_domain::TokenRejection> for Error {
	fn from(err: quarry_domain::TokenRejection) -> Self {
		Self::InvalidToken { message: err.to_string() }
	}
}

impl From<quarry_storage::Error> for Error {
	fn from(err: quarry_storage::Error) -> Self {
		match err {
			quarry_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			quarry_storage::Error::InvalidArgument(message) => Self::InvalidFormat { message },
			quarry_storage::Error::NotFound(message) => Self::ResourceNotAvailable { message },
			quarry_storage::Error::Conflict(message) => Self::ResourceExists { message },
		}
	}
}
