//! In-memory retrieval store over text embeddings

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Free-form metadata attached to each stored text
pub type Metadata = Map<String, Value>;

/// Number of neighbours returned when the caller does not choose
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum RetrievalError {
    #[error("Number of texts ({texts}) must match number of embeddings ({embeddings})")]
    LengthMismatch { texts: usize, embeddings: usize },

    #[error("Number of metadata entries ({metadata}) must match number of texts ({texts})")]
    MetadataMismatch { texts: usize, metadata: usize },

    #[error("Embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embeddings must contain only finite values")]
    NonFinite,

    #[error("Index is empty")]
    EmptyIndex,

    #[error("No index available for retrieval")]
    NoIndex,
}

/// Nearest-neighbour search over fixed-dimension vectors
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one vector per row
    fn add(&mut self, vectors: ArrayView2<'_, f32>) -> Result<(), RetrievalError>;

    /// Up to `k` `(row, squared distance)` pairs, nearest first
    fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<(usize, f32)>, RetrievalError>;
}

/// Exact index comparing the query against every stored vector
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    vectors: Array2<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
        }
    }
}

impl VectorIndex for FlatL2Index {
    fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    fn len(&self) -> usize {
        self.vectors.nrows()
    }

    fn add(&mut self, vectors: ArrayView2<'_, f32>) -> Result<(), RetrievalError> {
        let expected = self.dimension();
        if vectors.ncols() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: vectors.ncols(),
            });
        }
        if vectors.iter().any(|v| !v.is_finite()) {
            return Err(RetrievalError::NonFinite);
        }

        self.vectors
            .append(Axis(0), vectors)
            .map_err(|_| RetrievalError::DimensionMismatch {
                expected,
                actual: vectors.ncols(),
            })
    }

    fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<(usize, f32)>, RetrievalError> {
        if self.is_empty() {
            return Err(RetrievalError::EmptyIndex);
        }
        if query.len() != self.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .outer_iter()
            .enumerate()
            .map(|(row, vector)| {
                let distance = vector
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f32>();
                (row, distance)
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }
}

/// A stored text with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

/// A retrieval hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub metadata: Metadata,
    /// Squared L2 distance to the query
    pub distance: f32,
}

/// Append-only list of texts, optionally searchable through a [`VectorIndex`]
#[derive(Default)]
pub struct RetrievalStore {
    documents: Vec<StoredDocument>,
    index: Option<Box<dyn VectorIndex>>,
}

impl RetrievalStore {
    /// Store without an index; texts can be added but not retrieved
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: Box<dyn VectorIndex>) -> Self {
        Self {
            documents: Vec::new(),
            index: Some(index),
        }
    }

    /// Store backed by a [`FlatL2Index`] of the given dimension
    pub fn flat(dimension: usize) -> Self {
        Self::with_index(Box::new(FlatL2Index::new(dimension)))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Append texts with one embedding row each
    ///
    /// Missing metadata defaults to empty maps. Nothing is stored when any
    /// check fails.
    pub fn add_texts(
        &mut self,
        texts: Vec<String>,
        embeddings: Array2<f32>,
        metadata: Option<Vec<Metadata>>,
    ) -> Result<(), RetrievalError> {
        if texts.len() != embeddings.nrows() {
            return Err(RetrievalError::LengthMismatch {
                texts: texts.len(),
                embeddings: embeddings.nrows(),
            });
        }

        let metadata = match metadata {
            Some(metadata) if metadata.len() != texts.len() => {
                return Err(RetrievalError::MetadataMismatch {
                    texts: texts.len(),
                    metadata: metadata.len(),
                });
            }
            Some(metadata) => metadata,
            None => vec![Metadata::new(); texts.len()],
        };

        if let Some(index) = self.index.as_mut() {
            index.add(embeddings.view())?;
        }

        self.documents.extend(
            texts
                .into_iter()
                .zip(embeddings.outer_iter())
                .zip(metadata)
                .map(|((text, embedding), metadata)| StoredDocument {
                    text,
                    embedding: embedding.to_vec(),
                    metadata,
                }),
        );
        Ok(())
    }

    /// Every stored entry in insertion order
    pub fn get_all(&self) -> &[StoredDocument] {
        &self.documents
    }

    /// The `top_k` entries nearest to `query`, nearest first
    pub fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let index = self.index.as_ref().ok_or(RetrievalError::NoIndex)?;
        let hits = index.search(ArrayView1::from(query), top_k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(row, distance)| {
                self.documents.get(row).map(|doc| RetrievedDocument {
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                    distance,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn texts(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn seeded_store() -> RetrievalStore {
        let mut store = RetrievalStore::flat(2);
        store
            .add_texts(
                texts(&["origin", "far", "near"]),
                array![[0.0, 0.0], [10.0, 10.0], [1.0, 0.0]],
                None,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let mut store = RetrievalStore::flat(2);
        let err = store
            .add_texts(texts(&["a", "b"]), array![[0.0, 1.0]], None)
            .unwrap_err();
        assert_eq!(err, RetrievalError::LengthMismatch { texts: 2, embeddings: 1 });

        let err = store
            .add_texts(texts(&["a"]), array![[0.0, 1.0]], Some(vec![]))
            .unwrap_err();
        assert_eq!(err, RetrievalError::MetadataMismatch { texts: 1, metadata: 0 });
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_wrong_dimension_and_non_finite() {
        let mut store = RetrievalStore::flat(3);
        let err = store
            .add_texts(texts(&["a"]), array![[0.0, 1.0]], None)
            .unwrap_err();
        assert_eq!(err, RetrievalError::DimensionMismatch { expected: 3, actual: 2 });

        let err = store
            .add_texts(texts(&["a"]), array![[0.0, f32::NAN, 1.0]], None)
            .unwrap_err();
        assert_eq!(err, RetrievalError::NonFinite);
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_index_is_an_error() {
        let store = RetrievalStore::flat(2);
        assert_eq!(
            store.retrieve(&[0.0, 0.0], DEFAULT_TOP_K).unwrap_err(),
            RetrievalError::EmptyIndex
        );
    }

    #[test]
    fn test_store_without_index() {
        let mut store = RetrievalStore::new();
        store
            .add_texts(texts(&["kept"]), array![[1.0, 2.0]], None)
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.retrieve(&[1.0, 2.0], 1).unwrap_err(), RetrievalError::NoIndex);
    }

    #[test]
    fn test_retrieve_nearest_first() {
        let store = seeded_store();
        let hits = store.retrieve(&[0.9, 0.1], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert_eq!(hits[1].text, "origin");
        assert!(hits[0].distance <= hits[1].distance);
        assert!((hits[0].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_top_k_larger_than_store() {
        let store = seeded_store();
        let hits = store.retrieve(&[10.0, 10.0], DEFAULT_TOP_K).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "far");
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_query_dimension_checked() {
        let store = seeded_store();
        assert_eq!(
            store.retrieve(&[1.0, 2.0, 3.0], 1).unwrap_err(),
            RetrievalError::DimensionMismatch { expected: 2, actual: 3 }
        );
    }

    #[test]
    fn test_get_all_keeps_metadata() {
        let mut store = RetrievalStore::flat(1);
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), json!("https://example.com/10k.htm"));

        store
            .add_texts(texts(&["first"]), array![[0.5]], Some(vec![meta.clone()]))
            .unwrap();
        store.add_texts(texts(&["second"]), array![[1.5]], None).unwrap();

        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].metadata, meta);
        assert_eq!(all[0].embedding, vec![0.5]);
        assert!(all[1].metadata.is_empty());

        let json = serde_json::to_value(&all[0]).unwrap();
        assert_eq!(json["text"], "first");
        assert_eq!(json["metadata"]["source"], "https://example.com/10k.htm");
    }
}
