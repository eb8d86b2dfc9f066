//! Encoder port and its adapters.
//!
//! The evaluation core only sees the [`Encoder`] trait; which model sits
//! behind it (a remote embeddings API, precomputed vectors, a test stub) is
//! decided by whoever calls [`crate::eval::evaluate`].

pub mod lookup;
pub mod matrix;
pub mod openai;

pub use lookup::LookupEncoder;
pub use matrix::{Element, EmbeddingMatrix};
pub use openai::OpenAIEncoder;

use crate::error::Result;

/// Turns ordered texts into row-aligned embedding matrices.
///
/// Implementations must return exactly one row per input text, in input
/// order, with the same dimension for queries and corpus. The evaluation
/// entry point checks this after every call and fails with
/// `DimensionMismatch` when it does not hold.
#[allow(async_fn_in_trait)]
pub trait Encoder {
    /// Scalar type of the produced vectors. Coerced to `f32` before indexing.
    type Elem: Element;

    /// Embed queries. Encoders with retrieval instructions apply them here.
    async fn encode_queries(&self, texts: &[String]) -> Result<EmbeddingMatrix<Self::Elem>>;

    /// Embed corpus passages.
    async fn encode_corpus(&self, texts: &[String]) -> Result<EmbeddingMatrix<Self::Elem>>;

    /// Model identifier, recorded in evaluation reports.
    fn model_name(&self) -> &str;
}
