pub mod config;
pub mod error;
pub mod embeddings;
pub mod search;
pub mod eval;

pub use config::Config;
pub use error::{ErrorKind, RagvalError, Result};
