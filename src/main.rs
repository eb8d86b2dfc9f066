//! `ragval`: rank a corpus for a query set with exact search and report retrieval quality.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ragval::config::Provider;
use ragval::embeddings::{Encoder, LookupEncoder, OpenAIEncoder};
use ragval::eval::{evaluate, summarize, Corpus, EvalReport, QuerySet, RunInfo};
use ragval::search::SearchParams;
use ragval::Config;
use std::path::{Path, PathBuf};

/// Exact-search retrieval evaluation.
#[derive(Parser, Debug)]
#[command(name = "ragval", version)]
struct Args {
    /// Config file (default: $RAGVAL_CONFIG or ./config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Corpus JSONL (overrides eval.corpus_path).
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Queries JSONL (overrides eval.queries_path).
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Report destination (overrides eval.output_path).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Hits kept per query (overrides eval.top_k).
    #[arg(long)]
    top_k: Option<usize>,

    /// Queries per search call (overrides eval.batch_size).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Precomputed embeddings JSONL; uses the lookup encoder instead of the API.
    #[arg(long)]
    embeddings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::load_from(path)?
        }
        None => Config::load()?,
    };

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.ragval.log_level.as_str()),
    )
    .init();

    let corpus_path = args
        .corpus
        .clone()
        .or_else(|| config.eval.corpus_path.clone())
        .context("No corpus given: pass --corpus or set eval.corpus_path")?;
    let queries_path = args
        .queries
        .clone()
        .or_else(|| config.eval.queries_path.clone())
        .context("No queries given: pass --queries or set eval.queries_path")?;
    let output_path = args.output.clone().unwrap_or_else(|| config.eval.output_path.clone());
    let mut params = config.search_params();
    if let Some(top_k) = args.top_k {
        params.top_k = top_k;
    }
    if let Some(batch_size) = args.batch_size {
        params.batch_size = batch_size;
    }

    let corpus = Corpus::load_jsonl(&corpus_path)
        .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;
    let queries = QuerySet::load_jsonl(&queries_path)
        .with_context(|| format!("Failed to load queries {}", queries_path.display()))?;

    let lookup_path = args.embeddings.clone().or_else(|| match config.embeddings.provider {
        Provider::Lookup => config.embeddings.lookup_path.clone(),
        Provider::OpenAI => None,
    });

    match lookup_path {
        Some(path) => {
            let encoder = LookupEncoder::from_jsonl(config.embeddings.model.clone(), &path)
                .with_context(|| format!("Failed to load embeddings {}", path.display()))?;
            if let Some(expected) = config.embeddings.dimensions {
                encoder.check_dim(expected)?;
            }
            run(&encoder, &corpus, &queries, params, &config.eval.metric_ks, &output_path).await
        }
        None => {
            let dimensions = config
                .embeddings
                .dimensions
                .context("embeddings.dimensions is required for the openai provider")?;
            let encoder = OpenAIEncoder::new(
                config.api_key()?,
                config.embeddings.model.clone(),
                config.embeddings.batch_size,
                dimensions,
            )?
            .with_base_url(config.embeddings.base_url.clone())
            .with_query_instruction(config.embeddings.query_instruction.clone());
            run(&encoder, &corpus, &queries, params, &config.eval.metric_ks, &output_path).await
        }
    }
}

async fn run<E: Encoder>(
    encoder: &E,
    corpus: &Corpus,
    queries: &QuerySet,
    params: SearchParams,
    metric_ks: &[usize],
    output_path: &Path,
) -> Result<()> {
    println!(
        "Running evaluation on {} queries against {} passages (model: {}, top_k: {})\n",
        queries.len(),
        corpus.len(),
        encoder.model_name(),
        params.top_k
    );

    let evaluation = evaluate(encoder, corpus, queries, params).await?;

    let qrels = queries.qrels();
    let metrics = if qrels.is_empty() {
        None
    } else {
        Some(summarize(&evaluation.results, &qrels, metric_ks))
    };

    if let Some(summary) = &metrics {
        println!("=== Evaluation Results ({} judged queries) ===", summary.queries_evaluated);
        for (k, recall) in &summary.recall {
            println!("Recall@{:<3} {:.2}%", k, recall * 100.0);
        }
        for (k, precision) in &summary.precision {
            println!("P@{:<8} {:.2}%", k, precision * 100.0);
        }
        for (k, hit_rate) in &summary.hit_rate {
            println!("Hit@{:<6} {:.2}%", k, hit_rate * 100.0);
        }
        println!("MRR:        {:.3}", summary.mrr);
    } else {
        println!("No relevance judgments in the query set; writing rankings only.");
    }

    let report = EvalReport {
        run: RunInfo {
            generated_at: Utc::now(),
            model: encoder.model_name().to_string(),
            top_k: params.top_k,
            batch_size: params.batch_size,
            corpus_size: corpus.len(),
            query_count: queries.len(),
            embedding_dim: evaluation.corpus_embeddings.dim(),
            corpus_fingerprint: corpus.fingerprint(),
        },
        metrics,
        results: evaluation.results,
    };
    report.write_json(output_path)?;
    println!("\nReport written to {}", output_path.display());

    Ok(())
}
