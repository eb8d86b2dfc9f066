//! Encoder over precomputed vectors.
//!
//! Useful when embeddings were produced offline (or by a model that is not
//! reachable over HTTP) and for deterministic tests.

use crate::embeddings::{Element, EmbeddingMatrix, Encoder};
use crate::error::{RagvalError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// One line of a precomputed-embeddings JSONL file.
#[derive(Debug, Deserialize)]
struct LookupRecord {
    text: String,
    embedding: Vec<f32>,
}

/// Maps exact text to a stored vector. Unknown text is an error, never a zero vector.
#[derive(Debug, Clone)]
pub struct LookupEncoder<T = f32> {
    name: String,
    dim: usize,
    vectors: HashMap<String, Vec<T>>,
}

impl<T: Element> LookupEncoder<T> {
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            dim,
            vectors: HashMap::new(),
        }
    }

    /// Register a vector for `text`, replacing any previous one.
    pub fn insert(&mut self, text: impl Into<String>, vector: Vec<T>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(RagvalError::DimensionMismatch {
                context: "lookup encoder entry",
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.vectors.insert(text.into(), vector);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, text: impl Into<String>, vector: Vec<T>) -> Result<Self> {
        self.insert(text, vector)?;
        Ok(self)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Fail unless the stored vectors have `expected` dimensions.
    pub fn check_dim(&self, expected: usize) -> Result<()> {
        if self.dim != expected {
            return Err(RagvalError::DimensionMismatch {
                context: "precomputed embeddings",
                expected,
                actual: self.dim,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn lookup(&self, texts: &[String]) -> Result<EmbeddingMatrix<T>> {
        let rows = texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| RagvalError::Embedding(format!("No stored embedding for text: {:?}", t)))
            })
            .collect::<Result<Vec<_>>>()?;
        EmbeddingMatrix::from_rows(rows)
    }
}

impl LookupEncoder<f32> {
    /// Load `{"text": ..., "embedding": [...]}` lines. The first record fixes the dimension.
    pub fn from_jsonl(name: impl Into<String>, path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut encoder: Option<Self> = None;
        let name = name.into();

        for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LookupRecord = serde_json::from_str(&line).map_err(|e| {
                RagvalError::Parse(format!("{}:{}: {}", path.display(), line_no + 1, e))
            })?;
            let enc = encoder.get_or_insert_with(|| Self::new(name.clone(), record.embedding.len()));
            enc.insert(record.text, record.embedding)?;
        }

        let encoder = encoder.unwrap_or_else(|| Self::new(name, 0));
        log::info!(
            "Loaded {} precomputed embeddings (dim {}) from {}",
            encoder.len(),
            encoder.dim,
            path.display()
        );
        Ok(encoder)
    }
}

impl<T: Element> Encoder for LookupEncoder<T> {
    type Elem = T;

    async fn encode_queries(&self, texts: &[String]) -> Result<EmbeddingMatrix<T>> {
        self.lookup(texts)
    }

    async fn encode_corpus(&self, texts: &[String]) -> Result<EmbeddingMatrix<T>> {
        self.lookup(texts)
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_lookup_preserves_order() {
        let enc = LookupEncoder::new("stub", 2)
            .with("a", vec![1.0f32, 0.0])
            .unwrap()
            .with("b", vec![0.0, 1.0])
            .unwrap();
        let texts = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        let m = enc.encode_corpus(&texts).await.unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(m.row(1).to_vec(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_lookup_unknown_text_fails() {
        let enc = LookupEncoder::new("stub", 2).with("a", vec![1.0f32, 0.0]).unwrap();
        let err = enc.encode_queries(&["missing".to_string()]).await.unwrap_err();
        assert!(matches!(err, RagvalError::Embedding(_)));
    }

    #[test]
    fn test_insert_wrong_dimension() {
        let mut enc = LookupEncoder::<f64>::new("stub", 3);
        assert!(enc.insert("a", vec![1.0, 2.0]).is_err());
        assert!(enc.is_empty());
    }

    #[test]
    fn test_from_jsonl() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text": "cats purr", "embedding": [1.0, 0.0]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text": "dogs bark", "embedding": [0.0, 1.0]}}"#).unwrap();
        let enc = LookupEncoder::from_jsonl("precomputed", file.path()).unwrap();
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.model_name(), "precomputed");
    }

    #[test]
    fn test_check_dim_against_configured_size() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text": "a", "embedding": [1.0, 0.0, 0.0]}}"#).unwrap();
        let enc = LookupEncoder::from_jsonl("stub", file.path()).unwrap();
        assert_eq!(enc.dim(), 3);
        assert!(enc.check_dim(3).is_ok());
        let err = enc.check_dim(1536).unwrap_err();
        assert!(matches!(
            err,
            RagvalError::DimensionMismatch { expected: 1536, actual: 3, .. }
        ));
    }

    #[test]
    fn test_from_jsonl_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        let err = LookupEncoder::from_jsonl("precomputed", file.path()).unwrap_err();
        assert!(err.to_string().contains(":1:"));
    }
}
