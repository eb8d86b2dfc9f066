//! Evaluation metrics: Precision@K, Recall@K, Hit Rate@K and Mean Reciprocal Rank (MRR).

use crate::eval::{Qrels, ResultMap};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Precision at K: proportion of top-K results that are relevant.
/// Returns (relevant count in top-K) / K. If k is 0, returns 0.0.
pub fn precision_at_k(ranked: &[&str], relevant: &[String], k: usize) -> f32 {
    if k == 0 {
        return 0.0;
    }
    let relevant: HashSet<&str> = relevant.iter().map(String::as_str).collect();
    let relevant_count = ranked.iter().take(k).filter(|id| relevant.contains(*id)).count();
    relevant_count as f32 / k as f32
}

/// Recall at K: proportion of all relevant documents that appear in top-K.
/// If there are no relevant documents (denominator 0), returns 0.0.
pub fn recall_at_k(ranked: &[&str], relevant: &[String], k: usize) -> f32 {
    let relevant: HashSet<&str> = relevant.iter().map(String::as_str).collect();
    if relevant.is_empty() {
        return 0.0;
    }
    let retrieved_relevant = ranked.iter().take(k).filter(|id| relevant.contains(*id)).count();
    retrieved_relevant as f32 / relevant.len() as f32
}

/// 1.0 if any relevant document appears in the top-K, else 0.0.
pub fn hit_rate_at_k(ranked: &[&str], relevant: &[String], k: usize) -> f32 {
    if ranked.iter().take(k).any(|id| relevant.iter().any(|r| r == id)) {
        1.0
    } else {
        0.0
    }
}

/// 1 / (rank of the first relevant document), 0.0 when none is retrieved.
pub fn reciprocal_rank(ranked: &[&str], relevant: &[String]) -> f32 {
    ranked
        .iter()
        .position(|id| relevant.iter().any(|r| r == id))
        .map_or(0.0, |rank| 1.0 / (rank + 1) as f32)
}

/// Averages over every query that has relevance judgments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Queries with at least one relevant document
    pub queries_evaluated: usize,
    pub recall: BTreeMap<usize, f32>,
    pub precision: BTreeMap<usize, f32>,
    pub hit_rate: BTreeMap<usize, f32>,
    pub mrr: f32,
}

/// Score a [`ResultMap`] against ground truth at each cut-off in `ks`.
///
/// Queries without judgments are skipped rather than counted as misses, so
/// an unjudged query never drags the averages down. A judged query missing
/// from `results` counts as retrieving nothing.
pub fn summarize(results: &ResultMap, qrels: &Qrels, ks: &[usize]) -> MetricsSummary {
    let mut judged: Vec<(&String, &Vec<String>)> =
        qrels.iter().filter(|(_, rel)| !rel.is_empty()).collect();
    judged.sort_by(|a, b| a.0.cmp(b.0));

    let mut summary = MetricsSummary {
        queries_evaluated: judged.len(),
        ..Default::default()
    };
    if judged.is_empty() {
        return summary;
    }

    let n = judged.len() as f32;
    let mut mrr_sum = 0.0;
    for (query_id, relevant) in &judged {
        let ranked: Vec<&str> = results
            .ranked(query_id)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        for &k in ks {
            *summary.recall.entry(k).or_insert(0.0) += recall_at_k(&ranked, relevant, k) / n;
            *summary.precision.entry(k).or_insert(0.0) += precision_at_k(&ranked, relevant, k) / n;
            *summary.hit_rate.entry(k).or_insert(0.0) += hit_rate_at_k(&ranked, relevant, k) / n;
        }
        mrr_sum += reciprocal_rank(&ranked, relevant);
    }
    summary.mrr = mrr_sum / n;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::aggregate::{aggregate_results, DocIds};
    use crate::search::SearchHits;
    use ndarray::arr2;

    fn rel(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn precision_at_k_all_relevant() {
        let ranked = ["a", "b", "c"];
        assert!((precision_at_k(&ranked, &rel(&["a", "b", "c"]), 3) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn precision_at_k_partial() {
        let ranked = ["a", "b", "x"];
        assert!((precision_at_k(&ranked, &rel(&["a", "b"]), 3) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn precision_at_k_zero_k() {
        assert_eq!(precision_at_k(&["a"], &rel(&["a"]), 0), 0.0);
    }

    #[test]
    fn recall_at_k_all_retrieved() {
        assert!((recall_at_k(&["a", "b"], &rel(&["a", "b"]), 10) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn recall_at_k_partial() {
        assert!((recall_at_k(&["a", "x"], &rel(&["a", "b"]), 10) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn recall_at_k_cutoff() {
        assert_eq!(recall_at_k(&["x", "a"], &rel(&["a"]), 1), 0.0);
        assert_eq!(recall_at_k(&["x", "a"], &rel(&["a"]), 2), 1.0);
    }

    #[test]
    fn recall_at_k_empty_relevant() {
        assert_eq!(recall_at_k(&["a"], &[], 10), 0.0);
    }

    #[test]
    fn reciprocal_rank_positions() {
        assert_eq!(reciprocal_rank(&["a", "b"], &rel(&["a"])), 1.0);
        assert!((reciprocal_rank(&["a", "b"], &rel(&["b"])) - 0.5).abs() < 1e-6);
        assert_eq!(reciprocal_rank(&["a", "b"], &rel(&["z"])), 0.0);
    }

    #[test]
    fn hit_rate() {
        assert_eq!(hit_rate_at_k(&["x", "a"], &rel(&["a"]), 1), 0.0);
        assert_eq!(hit_rate_at_k(&["x", "a"], &rel(&["a"]), 2), 1.0);
    }

    #[test]
    fn summarize_over_result_map() {
        // q0: d1 first (relevant), q1: d0 first, relevant d1 second
        let hits = SearchHits {
            scores: arr2(&[[0.9f32, 0.1], [0.8, 0.7]]),
            rows: arr2(&[[1i64, 0], [0, 1]]),
        };
        let docs = rel(&["d0", "d1"]);
        let results = aggregate_results(&hits, &rel(&["q0", "q1"]), DocIds::Explicit(&docs)).unwrap();

        let mut qrels = Qrels::new();
        qrels.insert("q0".to_string(), rel(&["d1"]));
        qrels.insert("q1".to_string(), rel(&["d1"]));
        qrels.insert("q2".to_string(), Vec::new());

        let summary = summarize(&results, &qrels, &[1, 2]);
        assert_eq!(summary.queries_evaluated, 2);
        assert!((summary.recall[&1] - 0.5).abs() < 1e-6);
        assert!((summary.recall[&2] - 1.0).abs() < 1e-6);
        assert!((summary.hit_rate[&1] - 0.5).abs() < 1e-6);
        assert!((summary.precision[&2] - 0.5).abs() < 1e-6);
        assert!((summary.mrr - 0.75).abs() < 1e-6);
    }

    #[test]
    fn summarize_without_judgments() {
        let summary = summarize(&ResultMap::default(), &Qrels::new(), &[1, 5]);
        assert_eq!(summary.queries_evaluated, 0);
        assert!(summary.recall.is_empty());
        assert_eq!(summary.mrr, 0.0);
    }
}
