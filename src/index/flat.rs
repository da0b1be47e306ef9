/// Exact inner-product index over unit-normalized vectors
use crate::error::{KindexError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Search hit: store position and cosine similarity in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub score: f32,
}

/// L2 normalize a vector in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Row-major matrix of normalized vectors, one row per document position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    matrix: Array2<f32>,
}

impl FlatIndex {
    /// Normalize and pack `vectors`; all must share one non-zero dimension
    pub fn from_vectors(vectors: &[Vec<f32>]) -> Result<Self> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(KindexError::InvalidArgument(
                "cannot index zero-dimensional vectors".to_string(),
            ));
        }

        let mut flat = Vec::with_capacity(vectors.len() * dimension);
        for vector in vectors {
            if vector.len() != dimension {
                return Err(KindexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let start = flat.len();
            flat.extend_from_slice(vector);
            normalize(&mut flat[start..]);
        }

        let matrix = Array2::from_shape_vec((vectors.len(), dimension), flat)
            .map_err(|e| KindexError::InvalidArgument(e.to_string()))?;

        Ok(Self { matrix })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    /// Normalized vector stored at `position`
    pub fn row(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.len()).then(|| self.matrix.row(position))
    }

    /// Top `k` rows by descending similarity; equal scores keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension() {
            return Err(KindexError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);
        let scores = self.matrix.dot(&Array1::from(query));

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        for (position, &score) in scores.iter().enumerate() {
            heap.push(HeapEntry {
                score: score.clamp(-1.0, 1.0),
                position,
            });
            if heap.len() > k {
                heap.pop();
            }
        }

        // Ascending in heap order is best-first
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| SearchHit {
                position: e.position,
                score: e.score,
            })
            .collect())
    }
}

/// Heap entry ordered so that the worst candidate sits on top
#[derive(Debug)]
struct HeapEntry {
    score: f32,
    position: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower score is "greater"; on equal scores the later position is
        other
            .score
            .total_cmp(&self.score)
            .then(self.position.cmp(&other.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let index = FlatIndex::from_vectors(&[vec![3.0, 4.0], vec![0.0, 2.0]]).unwrap();
        for position in 0..index.len() {
            let row = index.row(position).unwrap();
            assert!((row.dot(&row) - 1.0).abs() < 1e-6);
        }
        assert!(index.row(2).is_none());
    }

    #[test]
    fn test_cosine_ranking() {
        let index =
            FlatIndex::from_vectors(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = FlatIndex::from_vectors(&[
            vec![0.0, 1.0],
            vec![2.0, 0.0],
            vec![0.0, 3.0],
            vec![5.0, 0.0],
        ])
        .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[1].position, 3);

        let all = index.search(&[1.0, 0.0], 10).unwrap();
        let positions: Vec<usize> = all.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_top_k_bound() {
        let vectors: Vec<Vec<f32>> = (0..7).map(|i| vec![1.0, i as f32]).collect();
        let index = FlatIndex::from_vectors(&vectors).unwrap();

        assert_eq!(index.search(&[1.0, 0.0], 3).unwrap().len(), 3);
        assert_eq!(index.search(&[1.0, 0.0], 50).unwrap().len(), 7);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = FlatIndex::from_vectors(&[vec![1.0, 0.0]]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        assert!(FlatIndex::from_vectors(&[vec![1.0, 0.0], vec![1.0]]).is_err());
        assert!(FlatIndex::from_vectors(&[]).is_err());
    }
}
