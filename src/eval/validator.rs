//! Evaluation entry point: encode, index, search, aggregate.

use crate::embeddings::{Element, EmbeddingMatrix, Encoder};
use crate::error::{RagvalError, Result};
use crate::eval::aggregate::{aggregate_results, DocIds, ResultMap};
use crate::eval::dataset::{Corpus, QuerySet};
use crate::search::{search_batched, FlatIndex, SearchParams};
use std::time::Instant;

/// Output of one evaluation call.
#[derive(Debug, Clone)]
pub struct Evaluation<T = f32> {
    pub results: ResultMap,
    /// Corpus embeddings as the encoder produced them, handed back for reuse.
    pub corpus_embeddings: EmbeddingMatrix<T>,
}

/// Rank every corpus passage for every query and collect the top-k scores.
///
/// Parameters and inputs are validated before the encoder is called. The
/// corpus matrix and index live only for this call. Either the full
/// [`ResultMap`] is returned or the call fails with nothing partial.
///
/// # Example
///
/// ```no_run
/// use ragval::embeddings::LookupEncoder;
/// use ragval::eval::{evaluate, Corpus, QuerySet};
/// use ragval::search::SearchParams;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let encoder = LookupEncoder::from_jsonl("precomputed", Path::new("embeddings.jsonl"))?;
/// let corpus = Corpus::load_jsonl(Path::new("corpus.jsonl"))?;
/// let queries = QuerySet::load_jsonl(Path::new("queries.jsonl"))?;
///
/// let evaluation = evaluate(&encoder, &corpus, &queries, SearchParams::default()).await?;
/// for (query_id, docs) in &evaluation.results {
///     println!("{}: {} hits", query_id, docs.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn evaluate<E: Encoder>(
    encoder: &E,
    corpus: &Corpus,
    queries: &QuerySet,
    params: SearchParams,
) -> Result<Evaluation<E::Elem>> {
    let start = Instant::now();
    match run(encoder, corpus, queries, params).await {
        Ok(evaluation) => {
            log::info!(
                "Evaluation succeeded: {} queries against {} passages (top_k={}, batch_size={}) in {:?}",
                queries.len(),
                corpus.len(),
                params.top_k,
                params.batch_size,
                start.elapsed()
            );
            Ok(evaluation)
        }
        Err(e) => {
            log::error!(
                "Evaluation failed: {} queries against {} passages (top_k={}, batch_size={}, model={}): {}",
                queries.len(),
                corpus.len(),
                params.top_k,
                params.batch_size,
                encoder.model_name(),
                e
            );
            Err(e)
        }
    }
}

async fn run<E: Encoder>(
    encoder: &E,
    corpus: &Corpus,
    queries: &QuerySet,
    params: SearchParams,
) -> Result<Evaluation<E::Elem>> {
    params.validate()?;
    if corpus.is_empty() {
        return Err(RagvalError::EmptyCorpus);
    }
    if queries.is_empty() {
        return Err(RagvalError::EmptyQuerySet);
    }

    let embed_start = Instant::now();
    let query_embeddings = encoder.encode_queries(&queries.texts()).await?;
    check_rows(&query_embeddings, queries.len(), "query embedding rows")?;
    let corpus_embeddings = encoder.encode_corpus(&corpus.texts()).await?;
    check_rows(&corpus_embeddings, corpus.len(), "corpus embedding rows")?;
    log::debug!("Encoding took {:?}", embed_start.elapsed());

    let results = rank_corpus(
        &query_embeddings,
        &corpus_embeddings,
        &queries.ids(),
        DocIds::Explicit(&corpus.ids()),
        params,
    )?;

    Ok(Evaluation {
        results,
        corpus_embeddings,
    })
}

/// The synchronous core: index the corpus, search in batches, aggregate.
///
/// Usable directly when embeddings already exist. `query_ids` must be
/// row-aligned with `query_embeddings` and `doc_ids` with `corpus_embeddings`.
pub fn rank_corpus<Q: Element, C: Element>(
    query_embeddings: &EmbeddingMatrix<Q>,
    corpus_embeddings: &EmbeddingMatrix<C>,
    query_ids: &[String],
    doc_ids: DocIds<'_>,
    params: SearchParams,
) -> Result<ResultMap> {
    params.validate()?;
    if query_embeddings.is_empty() {
        return Err(RagvalError::EmptyQuerySet);
    }
    if query_embeddings.dim() != corpus_embeddings.dim() {
        return Err(RagvalError::DimensionMismatch {
            context: "query vs corpus embeddings",
            expected: corpus_embeddings.dim(),
            actual: query_embeddings.dim(),
        });
    }
    check_rows(query_embeddings, query_ids.len(), "query embedding rows")?;
    check_rows(corpus_embeddings, doc_ids.corpus_size(), "corpus embedding rows")?;

    let index = FlatIndex::build(corpus_embeddings)?;
    let hits = search_batched(query_embeddings, &index, params.top_k, params.batch_size)?;
    aggregate_results(&hits, query_ids, doc_ids)
}

fn check_rows<T: Element>(
    matrix: &EmbeddingMatrix<T>,
    expected: usize,
    context: &'static str,
) -> Result<()> {
    if matrix.rows() != expected {
        return Err(RagvalError::DimensionMismatch {
            context,
            expected,
            actual: matrix.rows(),
        });
    }
    Ok(())
}
