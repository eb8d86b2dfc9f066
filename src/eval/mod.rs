//! Retrieval evaluation: datasets, the exact-search validator, result aggregation,
//! metrics (P@K, R@K, hit rate, MRR) and the JSON report.

pub mod aggregate;
pub mod dataset;
pub mod metrics;
pub mod report;
pub mod validator;

pub use aggregate::{aggregate_results, DocIds, ResultMap};
pub use dataset::{Corpus, Passage, Qrels, Query, QuerySet};
pub use metrics::{
    hit_rate_at_k, precision_at_k, recall_at_k, reciprocal_rank, summarize, MetricsSummary,
};
pub use report::{EvalReport, RunInfo};
pub use validator::{evaluate, rank_corpus, Evaluation};
