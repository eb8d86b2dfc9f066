use crate::embeddings::matrix::coerce_to_f32;
use crate::embeddings::{Element, EmbeddingMatrix};
use crate::error::{RagvalError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Score assigned to slots that have no candidate (row `-1`).
pub const MISSING_SCORE: f32 = f32::NEG_INFINITY;

/// Row index reported for slots that have no candidate.
pub const MISSING_ROW: i64 = -1;

/// Exact inner-product index over a corpus embedding matrix.
///
/// Row `r` of every search result addresses passage `r` of the matrix the
/// index was built from. No normalisation is applied, so scores are cosine
/// similarities only when the encoder already emits unit vectors.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Build an index from corpus embeddings of any supported precision.
    ///
    /// The matrix is explicitly coerced to `f32` first (see
    /// [`Element::to_f32`]), so an `f64` corpus is indexed with the same
    /// rounding the search arithmetic will use. Fails with `EmptyCorpus` on a
    /// zero-row matrix and `NonFiniteEmbedding` if any value is NaN or infinite.
    pub fn build<T: Element>(corpus: &EmbeddingMatrix<T>) -> Result<Self> {
        if corpus.is_empty() {
            return Err(RagvalError::EmptyCorpus);
        }
        if corpus.dim() == 0 {
            return Err(RagvalError::Index("corpus embeddings have zero dimensions".to_string()));
        }
        let vectors = coerce_to_f32(corpus.view(), "corpus", 0)?;
        log::debug!(
            "Built flat inner-product index: {} vectors, dim {}",
            vectors.nrows(),
            vectors.ncols()
        );
        Ok(Self { vectors })
    }

    /// Number of indexed passages. Valid rows are `0..len()`.
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    /// Exhaustive top-`k` search for every row of `queries`.
    ///
    /// Returns `[queries × k]` score and row arrays. Hits are ordered by
    /// descending score, ties by ascending row. When `k` exceeds the corpus
    /// size the trailing slots hold [`MISSING_ROW`] / [`MISSING_SCORE`].
    /// Finite inputs can still overflow the inner product; a score that is
    /// not finite fails the search with an `Index` error.
    pub fn search(&self, queries: ArrayView2<'_, f32>, k: usize) -> Result<(Array2<f32>, Array2<i64>)> {
        if k == 0 {
            return Err(RagvalError::InvalidTopK(k));
        }
        if queries.ncols() != self.dim() {
            return Err(RagvalError::DimensionMismatch {
                context: "query embeddings",
                expected: self.dim(),
                actual: queries.ncols(),
            });
        }

        let mut scores = Array2::from_elem((queries.nrows(), k), MISSING_SCORE);
        let mut rows = Array2::from_elem((queries.nrows(), k), MISSING_ROW);

        for (qi, query) in queries.outer_iter().enumerate() {
            let hits = self.top_k(query, k).map_err(|row| {
                RagvalError::Index(format!(
                    "inner product of query {} with corpus row {} is not finite",
                    qi, row
                ))
            })?;
            for (slot, (score, row)) in hits.into_iter().enumerate() {
                scores[[qi, slot]] = score;
                rows[[qi, slot]] = row as i64;
            }
        }

        Ok((scores, rows))
    }

    /// Ranked `(score, row)` pairs, or the first row whose score overflowed.
    fn top_k(&self, query: ArrayView1<'_, f32>, k: usize) -> std::result::Result<Vec<(f32, usize)>, usize> {
        let sims: Vec<f32> = self.vectors.outer_iter().map(|v| v.dot(&query)).collect();
        if let Some(row) = sims.iter().position(|s| !s.is_finite()) {
            return Err(row);
        }

        // Descending score, then ascending row
        let rank = |a: &usize, b: &usize| sims[*b].total_cmp(&sims[*a]).then(a.cmp(b));

        let mut candidates: Vec<usize> = (0..sims.len()).collect();
        if k < candidates.len() {
            candidates.select_nth_unstable_by(k - 1, rank);
            candidates.truncate(k);
        }
        candidates.sort_by(rank);
        Ok(candidates.into_iter().map(|row| (sims[row], row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> EmbeddingMatrix {
        EmbeddingMatrix::from_rows(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.6, 0.8, 0.0],
            vec![0.0, 0.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_build_empty_corpus() {
        let empty = EmbeddingMatrix::<f32>::from_rows(Vec::new()).unwrap();
        assert!(matches!(FlatIndex::build(&empty), Err(RagvalError::EmptyCorpus)));
    }

    #[test]
    fn test_build_records_size() {
        let index = FlatIndex::build(&corpus()).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dim(), 3);
    }

    #[test]
    fn test_identity_query_is_top_hit() {
        let c = corpus();
        let index = FlatIndex::build(&c).unwrap();
        for r in 0..c.rows() {
            let (scores, rows) = index.search(c.view().slice(ndarray::s![r..r + 1, ..]), 2).unwrap();
            assert_eq!(rows[[0, 0]], r as i64);
            assert!((scores[[0, 0]] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_inner_product_scores() {
        let c = EmbeddingMatrix::from_rows(vec![
            vec![1.0f32, 0.0],
            vec![0.0, 1.0],
            vec![0.5, 1.0],
            vec![0.0, 0.0],
        ])
        .unwrap();
        let index = FlatIndex::build(&c).unwrap();
        let q = ndarray::arr2(&[[2.0f32, 1.0]]);
        let (scores, rows) = index.search(q.view(), 4).unwrap();
        // rows: 0 -> 2.0, 2 -> 2.0, 1 -> 1.0, 3 -> 0.0; ties by ascending row
        assert_eq!(rows.row(0).to_vec(), vec![0, 2, 1, 3]);
        assert_eq!(scores.row(0).to_vec(), vec![2.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_k_larger_than_corpus_pads_with_sentinel() {
        let index = FlatIndex::build(&corpus()).unwrap();
        let q = ndarray::arr2(&[[0.0f32, 0.0, 1.0]]);
        let (scores, rows) = index.search(q.view(), 6).unwrap();
        assert_eq!(rows[[0, 0]], 3);
        assert_eq!(rows[[0, 4]], MISSING_ROW);
        assert_eq!(rows[[0, 5]], MISSING_ROW);
        assert_eq!(scores[[0, 5]], MISSING_SCORE);
        let mut valid: Vec<i64> = rows.row(0).iter().copied().filter(|&r| r >= 0).collect();
        valid.sort();
        assert_eq!(valid, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_zero_k_rejected() {
        let index = FlatIndex::build(&corpus()).unwrap();
        let q = ndarray::arr2(&[[1.0f32, 0.0, 0.0]]);
        assert!(matches!(index.search(q.view(), 0), Err(RagvalError::InvalidTopK(0))));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = FlatIndex::build(&corpus()).unwrap();
        let q = ndarray::arr2(&[[1.0f32, 0.0]]);
        let err = index.search(q.view(), 1).unwrap_err();
        assert!(matches!(err, RagvalError::DimensionMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn test_f64_corpus_coerced_before_indexing() {
        // Both rows collapse to the same f32 vector, so they tie and the lower row wins.
        let eps = 2f64.powi(-40);
        let c = EmbeddingMatrix::from_rows(vec![vec![1.0 - eps, 0.0f64], vec![1.0, 0.0]]).unwrap();
        let index = FlatIndex::build(&c).unwrap();
        let q = ndarray::arr2(&[[1.0f32, 0.0]]);
        let (scores, rows) = index.search(q.view(), 2).unwrap();
        assert_eq!(scores[[0, 0]], scores[[0, 1]]);
        assert_eq!(rows.row(0).to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_overflowing_inner_product_rejected() {
        // Every value is finite, but 3e38 * 3e38 overflows and inf - inf is NaN.
        let mut data = vec![vec![3e38f32, 3e38]];
        data.extend((0..40).map(|i| vec![i as f32 * 0.01, 0.5]));
        let index = FlatIndex::build(&EmbeddingMatrix::from_rows(data).unwrap()).unwrap();
        let q = ndarray::arr2(&[[3e38f32, -3e38]]);
        let err = index.search(q.view(), 5).unwrap_err();
        assert!(matches!(err, RagvalError::Index(ref msg) if msg.contains("row 0")));
        assert_eq!(err.kind(), crate::error::ErrorKind::Index);
    }

    #[test]
    fn test_non_finite_corpus_rejected() {
        let c = EmbeddingMatrix::from_rows(vec![vec![1.0f32, 0.0], vec![f32::INFINITY, 0.0]]).unwrap();
        assert!(matches!(
            FlatIndex::build(&c),
            Err(RagvalError::NonFiniteEmbedding { row: 1, .. })
        ));
    }
}
