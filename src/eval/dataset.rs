//! Corpus and query sets, loaded from JSON Lines files.
//!
//! Corpus lines: `{"id": "d0", "text": "cats purr"}`
//! Query lines:  `{"id": "q0", "text": "why do cats make sound", "relevant_ids": ["d0"]}`
//!
//! Iteration order is file order and never changes within one run; row `i`
//! of an embedding matrix always belongs to item `i`.

use crate::error::{RagvalError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

/// One indexed unit of corpus text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
}

/// One evaluation query, optionally with the passages judged relevant to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub relevant_ids: Vec<String>,
}

/// Ground-truth relevance: query id -> relevant passage ids.
pub type Qrels = HashMap<String, Vec<String>>;

/// Ordered, id-addressable passages. Ids are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    passages: Vec<Passage>,
}

impl Corpus {
    pub fn new(passages: Vec<Passage>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(passages.len());
        for p in &passages {
            if !seen.insert(p.id.as_str()) {
                return Err(RagvalError::DuplicateDocumentId(p.id.clone()));
            }
        }
        Ok(Self { passages })
    }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let corpus = Self::new(read_jsonl(path)?)?;
        log::info!("Loaded corpus: {} passages from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn ids(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.id.clone()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.text.clone()).collect()
    }

    /// SHA-256 over ids and texts in order, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for p in &self.passages {
            hasher.update(p.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(p.text.as_bytes());
            hasher.update([0xffu8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Ordered queries. Ids are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySet {
    queries: Vec<Query>,
}

impl QuerySet {
    pub fn new(queries: Vec<Query>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(queries.len());
        for q in &queries {
            if !seen.insert(q.id.as_str()) {
                return Err(RagvalError::DuplicateQueryId(q.id.clone()));
            }
        }
        Ok(Self { queries })
    }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let queries = Self::new(read_jsonl(path)?)?;
        log::info!("Loaded {} queries from {}", queries.len(), path.display());
        Ok(queries)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn ids(&self) -> Vec<String> {
        self.queries.iter().map(|q| q.id.clone()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.queries.iter().map(|q| q.text.clone()).collect()
    }

    /// Relevance judgments for queries that have at least one.
    pub fn qrels(&self) -> Qrels {
        self.queries
            .iter()
            .filter(|q| !q.relevant_ids.is_empty())
            .map(|q| (q.id.clone(), q.relevant_ids.clone()))
            .collect()
    }
}

/// Read one JSON object per non-blank line.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path)?;
    let mut items = Vec::new();
    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| {
            RagvalError::Parse(format!("{}:{}: {}", path.display(), line_no + 1, e))
        })?;
        items.push(item);
    }
    Ok(items)
}
