//! Exact nearest-neighbour search over corpus embeddings.
//!
//! [`FlatIndex`] scores every passage for every query (inner product) and
//! [`search_batched`] drives it over a query matrix in fixed-size batches.

pub mod batched;
pub mod index;

pub use batched::{search_batched, SearchHits};
pub use index::{FlatIndex, MISSING_ROW, MISSING_SCORE};

use crate::error::{RagvalError, Result};
use serde::{Deserialize, Serialize};

/// Default number of hits kept per query
pub const DEFAULT_TOP_K: usize = 20;

/// Default number of queries per search call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Caller-facing search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SearchParams {
    pub fn new(top_k: usize, batch_size: usize) -> Self {
        Self { top_k, batch_size }
    }

    /// Both values must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagvalError::InvalidTopK(self.top_k));
        }
        if self.batch_size == 0 {
            return Err(RagvalError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }
}
