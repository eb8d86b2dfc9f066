//! Dense row-major embedding matrices.
//!
//! Row `i` always embeds input text `i`. The matrix is generic over the
//! source precision so encoders that produce `f64` can be consumed as-is;
//! everything that reaches the index goes through [`coerce_to_f32`] first.

use crate::error::{RagvalError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Scalar types an encoder may hand back.
///
/// `to_f32` is the single place precision is dropped. Downcasting `f64`
/// rounds to nearest, so scores that differ only below `f32` resolution
/// collapse to the same value once indexed.
pub trait Element: Copy + Send + Sync + 'static {
    fn to_f32(self) -> f32;
}

impl Element for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Element for f64 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
}

/// Dense `[rows × dim]` embedding matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix<T = f32> {
    data: Array2<T>,
}

impl<T: Element> EmbeddingMatrix<T> {
    /// Wrap an existing array.
    pub fn from_array(data: Array2<T>) -> Self {
        Self { data }
    }

    /// Build from per-text vectors, checking that every row has the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        let n = rows.len();
        let mut flat = Vec::with_capacity(n * dim);
        for row in rows {
            if row.len() != dim {
                return Err(RagvalError::DimensionMismatch {
                    context: "embedding rows",
                    expected: dim,
                    actual: row.len(),
                });
            }
            flat.extend(row);
        }
        let data = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| RagvalError::ShapeMismatch(e.to_string()))?;
        Ok(Self { data })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, T> {
        self.data.row(i)
    }

    pub fn into_inner(self) -> Array2<T> {
        self.data
    }
}

/// Coerce a block of embeddings to canonical `f32`, rejecting non-finite values.
///
/// `context` names the matrix in errors. `row_offset` is added to reported
/// row numbers so callers coercing one batch at a time report absolute rows.
pub(crate) fn coerce_to_f32<T: Element>(
    view: ArrayView2<'_, T>,
    context: &'static str,
    row_offset: usize,
) -> Result<Array2<f32>> {
    let out = view.mapv(T::to_f32);
    for (i, row) in out.outer_iter().enumerate() {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(RagvalError::NonFiniteEmbedding {
                context,
                row: row_offset + i,
            });
        }
    }
    Ok(out)
}
