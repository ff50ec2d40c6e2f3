use thiserror::Error;

/// Error taxonomy shared by every askpdf crate.
///
/// Each variant maps to a distinct outward status (see [`Error::status_code`])
/// so a caller can tell bad input, missing knowledge and a failing backend apart.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No content indexed for source '{0}'")]
    NoContent(String),

    #[error("Document '{0}' produced no chunks")]
    EmptyDocument(String),

    #[error("{provider} provider failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Vector index table '{0}' has not been created yet")]
    IndexNotFound(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NoContent,
    EmptyDocument,
    Provider,
    IndexNotFound,
    DimensionMismatch,
    Tokenizer,
    InvalidConfig,
    Storage,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NoContent => "no_content",
            ErrorKind::EmptyDocument => "empty_document",
            ErrorKind::Provider => "provider",
            ErrorKind::IndexNotFound => "index_not_found",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::Tokenizer => "tokenizer",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Storage => "storage",
            ErrorKind::Io => "io",
        }
    }
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider { provider: provider.into(), message: message.into() }
    }

    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Storage(Box::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NoContent(_) => ErrorKind::NoContent,
            Error::EmptyDocument(_) => ErrorKind::EmptyDocument,
            Error::Provider { .. } => ErrorKind::Provider,
            Error::IndexNotFound(_) => ErrorKind::IndexNotFound,
            Error::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Error::Tokenizer(_) => ErrorKind::Tokenizer,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP-style status a front end should report for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NoContent => 404,
            ErrorKind::EmptyDocument => 422,
            ErrorKind::Provider => 502,
            ErrorKind::IndexNotFound => 503,
            ErrorKind::DimensionMismatch
            | ErrorKind::Tokenizer
            | ErrorKind::InvalidConfig
            | ErrorKind::Storage
            | ErrorKind::Io => 500,
        }
    }

    /// Only provider failures are worth retrying (with backoff, by the caller).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider { .. })
    }
}
