//! Turns raw search hits into the per-query score mapping.

use crate::error::{RagvalError, Result};
use crate::search::{SearchHits, MISSING_ROW};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::{BTreeMap, HashSet};

/// Query id -> (document id -> score).
///
/// Serialises as a plain nested JSON object. Keys are kept sorted so two
/// runs over the same inputs serialise byte-for-byte identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMap(BTreeMap<String, BTreeMap<String, f64>>);

impl ResultMap {
    pub fn get(&self, query_id: &str) -> Option<&BTreeMap<String, f64>> {
        self.0.get(query_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, BTreeMap<String, f64>> {
        self.0.iter()
    }

    /// Document ids for one query, best first. Equal scores fall back to id order.
    pub fn ranked(&self, query_id: &str) -> Vec<(&str, f64)> {
        let mut hits: Vec<(&str, f64)> = self
            .0
            .get(query_id)
            .map(|docs| docs.iter().map(|(id, s)| (id.as_str(), *s)).collect())
            .unwrap_or_default();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hits
    }

    pub fn into_inner(self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ResultMap {
    type Item = (&'a String, &'a BTreeMap<String, f64>);
    type IntoIter = btree_map::Iter<'a, String, BTreeMap<String, f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How a corpus row becomes a document id.
#[derive(Debug, Clone, Copy)]
pub enum DocIds<'a> {
    /// The row position itself, rendered as a decimal string.
    RowPosition { corpus_size: usize },
    /// `ids[row]`; the corpus size is `ids.len()`.
    Explicit(&'a [String]),
}

impl DocIds<'_> {
    pub fn corpus_size(&self) -> usize {
        match self {
            DocIds::RowPosition { corpus_size } => *corpus_size,
            DocIds::Explicit(ids) => ids.len(),
        }
    }

    fn resolve(&self, row: usize) -> String {
        match self {
            DocIds::RowPosition { .. } => row.to_string(),
            DocIds::Explicit(ids) => ids[row].clone(),
        }
    }
}

/// Build the [`ResultMap`] from search output.
///
/// Query `i` of `hits` is recorded under `query_ids[i]`. Sentinel rows are
/// skipped, so a query with fewer valid hits than `top_k` gets a shorter
/// mapping. Nothing is returned unless every query aggregates cleanly.
///
/// # Errors
///
/// * `ShapeMismatch` if scores and rows are not the same shape, or their row
///   count differs from `query_ids.len()`
/// * `DuplicateQueryId` if a query id repeats
/// * `DuplicateDocumentId` if an explicit document id repeats
/// * `RowOutOfRange` if a row lies outside `[-1, corpus_size)`
pub fn aggregate_results(
    hits: &SearchHits,
    query_ids: &[String],
    doc_ids: DocIds<'_>,
) -> Result<ResultMap> {
    if hits.scores.dim() != hits.rows.dim() {
        return Err(RagvalError::ShapeMismatch(format!(
            "scores are {:?} but rows are {:?}",
            hits.scores.dim(),
            hits.rows.dim()
        )));
    }
    if hits.rows.nrows() != query_ids.len() {
        return Err(RagvalError::ShapeMismatch(format!(
            "{} result rows for {} query ids",
            hits.rows.nrows(),
            query_ids.len()
        )));
    }

    if let DocIds::Explicit(ids) = doc_ids {
        let mut unique = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !unique.insert(id.as_str())) {
            return Err(RagvalError::DuplicateDocumentId(dup.clone()));
        }
    }

    let corpus_size = doc_ids.corpus_size();
    let mut seen = HashSet::with_capacity(query_ids.len());
    let mut results = BTreeMap::new();

    for (qi, (scores, rows)) in hits.scores.outer_iter().zip(hits.rows.outer_iter()).enumerate() {
        let query_id = &query_ids[qi];
        if !seen.insert(query_id.as_str()) {
            return Err(RagvalError::DuplicateQueryId(query_id.clone()));
        }

        let mut per_query = BTreeMap::new();
        for (&score, &row) in scores.iter().zip(rows.iter()) {
            if row == MISSING_ROW {
                continue;
            }
            if row < 0 || row as u64 >= corpus_size as u64 {
                return Err(RagvalError::RowOutOfRange {
                    query: qi,
                    row,
                    corpus_size,
                });
            }
            per_query.insert(doc_ids.resolve(row as usize), f64::from(score));
        }
        results.insert(query_id.clone(), per_query);
    }

    Ok(ResultMap(results))
}
