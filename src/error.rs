use thiserror::Error;

/// Main error type for RAGVal
#[derive(Error, Debug)]
pub enum RagvalError {
    /// top_k must be a positive integer
    #[error("Invalid top_k: {0} (must be greater than 0)")]
    InvalidTopK(usize),

    /// batch_size must be a positive integer
    #[error("Invalid batch_size: {0} (must be greater than 0)")]
    InvalidBatchSize(usize),

    /// Encoder output or query matrix disagrees with the expected shape
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Index construction requires at least one passage
    #[error("Empty corpus: cannot build an index over zero passages")]
    EmptyCorpus,

    /// Evaluation requires at least one query
    #[error("Empty query set")]
    EmptyQuerySet,

    /// Score and row arrays (or query ids) are not row-aligned
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The same query id appears twice in one query set
    #[error("Duplicate query id: {0}")]
    DuplicateQueryId(String),

    /// The same document id appears twice in one corpus
    #[error("Duplicate document id: {0}")]
    DuplicateDocumentId(String),

    /// NaN or infinite value in an embedding row
    #[error("Non-finite value in {context} embedding row {row}")]
    NonFiniteEmbedding { context: &'static str, row: usize },

    /// Index construction or search failure
    #[error("Index error: {0}")]
    Index(String),

    /// A search returned a row outside [-1, corpus_size)
    #[error("Consistency error: row {row} out of range for corpus of {corpus_size} passages (query {query})")]
    RowOutOfRange {
        query: usize,
        row: i64,
        corpus_size: usize,
    },

    /// Embedding API / encoder transport errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error class, used by callers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad parameters or inputs violating a precondition
    Validation,
    /// Non-recoverable index failure for the call
    Index,
    /// A collaborator broke its contract
    Consistency,
    /// Encoder transport, I/O, parsing, configuration
    External,
}

impl RagvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagvalError::InvalidTopK(_)
            | RagvalError::InvalidBatchSize(_)
            | RagvalError::DimensionMismatch { .. }
            | RagvalError::EmptyCorpus
            | RagvalError::EmptyQuerySet
            | RagvalError::ShapeMismatch(_)
            | RagvalError::DuplicateQueryId(_)
            | RagvalError::DuplicateDocumentId(_)
            | RagvalError::NonFiniteEmbedding { .. } => ErrorKind::Validation,
            RagvalError::Index(_) => ErrorKind::Index,
            RagvalError::RowOutOfRange { .. } => ErrorKind::Consistency,
            RagvalError::Embedding(_)
            | RagvalError::Io(_)
            | RagvalError::Parse(_)
            | RagvalError::Config(_) => ErrorKind::External,
        }
    }
}

/// Convenient Result type using RagvalError
pub type Result<T> = std::result::Result<T, RagvalError>;
