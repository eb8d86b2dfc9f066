use crate::embeddings::matrix::coerce_to_f32;
use crate::embeddings::{Element, EmbeddingMatrix};
use crate::error::{RagvalError, Result};
use crate::search::FlatIndex;
use ndarray::{s, Array2};

/// Raw search output: `[query_count × top_k]` scores and rows.
///
/// `rows[[q, j]] == -1` marks an empty slot; its score is meaningless.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    pub scores: Array2<f32>,
    pub rows: Array2<i64>,
}

impl SearchHits {
    pub fn query_count(&self) -> usize {
        self.rows.nrows()
    }

    pub fn top_k(&self) -> usize {
        self.rows.ncols()
    }
}

/// Search `queries` against `index` in contiguous batches of `batch_size`.
///
/// Each batch is coerced to `f32` and issued as one search covering all of
/// its rows; batch outputs are written back at their original offsets, so
/// the result is identical for every `batch_size`. Only the coerced query
/// batch is held in addition to the index.
///
/// # Errors
///
/// * `InvalidTopK` / `InvalidBatchSize` when either is zero
/// * `DimensionMismatch` when the query dimension differs from the index
/// * `NonFiniteEmbedding` for NaN or infinite query values
pub fn search_batched<T: Element>(
    queries: &EmbeddingMatrix<T>,
    index: &FlatIndex,
    top_k: usize,
    batch_size: usize,
) -> Result<SearchHits> {
    if top_k == 0 {
        return Err(RagvalError::InvalidTopK(top_k));
    }
    if batch_size == 0 {
        return Err(RagvalError::InvalidBatchSize(batch_size));
    }
    if queries.dim() != index.dim() {
        return Err(RagvalError::DimensionMismatch {
            context: "query embeddings",
            expected: index.dim(),
            actual: queries.dim(),
        });
    }

    let query_count = queries.rows();
    let mut scores = Array2::<f32>::zeros((query_count, top_k));
    let mut rows = Array2::<i64>::zeros((query_count, top_k));
    let total_batches = query_count.div_ceil(batch_size);

    for (batch_no, start) in (0..query_count).step_by(batch_size).enumerate() {
        let end = (start + batch_size).min(query_count);
        let batch = coerce_to_f32(queries.view().slice(s![start..end, ..]), "query", start)?;
        let (batch_scores, batch_rows) = index.search(batch.view(), top_k)?;

        if batch_rows.dim() != (end - start, top_k) || batch_scores.dim() != batch_rows.dim() {
            return Err(RagvalError::Index(format!(
                "search returned shape {:?}/{:?} for a batch of {} queries with k={}",
                batch_scores.dim(),
                batch_rows.dim(),
                end - start,
                top_k
            )));
        }

        scores.slice_mut(s![start..end, ..]).assign(&batch_scores);
        rows.slice_mut(s![start..end, ..]).assign(&batch_rows);
        log::debug!(
            "Search batch {}/{}: queries {}..{}",
            batch_no + 1,
            total_batches,
            start,
            end
        );
    }

    Ok(SearchHits { scores, rows })
}
