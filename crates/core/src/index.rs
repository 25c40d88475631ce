use crate::embeddings::l2_normalize;
use crate::error::RetrievalError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub slot: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self, RetrievalError> {
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            if vector.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let start = data.len();
            data.extend_from_slice(vector);
            l2_normalize(&mut data[start..]);
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, slot: usize) -> Option<&[f32]> {
        if slot >= self.len() {
            return None;
        }
        let start = slot * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.dimension == 0 {
            return Err(RetrievalError::CorruptArtifact(
                "index dimension is zero".to_string(),
            ));
        }
        if self.data.len() % self.dimension != 0 {
            return Err(RetrievalError::CorruptArtifact(format!(
                "vector block of {} floats is not a multiple of dimension {}",
                self.data.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    // Ties go to the lower slot.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, RetrievalError> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = vector.to_vec();
        l2_normalize(&mut query);

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, stored)| Neighbor {
                slot,
                score: stored.iter().zip(&query).map(|(a, b)| a * b).sum(),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, rank);
            neighbors.truncate(k);
        }
        neighbors.sort_by(rank);
        Ok(neighbors)
    }
}

fn rank(left: &Neighbor, right: &Neighbor) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.slot.cmp(&right.slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dimension: usize, axis: usize) -> Vec<f32> {
        let mut vector = vec![0.0; dimension];
        vector[axis] = 1.0;
        vector
    }

    #[test]
    fn query_orders_by_descending_inner_product() {
        let index = FlatIndex::build(
            2,
            &[vec![1.0, 0.0], vec![0.6, 0.8], vec![-1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();

        let hits = index.query(&[1.0, 0.0], 3).unwrap();
        let slots: Vec<usize> = hits.iter().map(|hit| hit.slot).collect();
        assert_eq!(slots, vec![0, 1, 3]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn query_returns_fewer_than_k_on_small_index() {
        let index = FlatIndex::build(3, &[axis(3, 0), axis(3, 1)]).unwrap();
        assert_eq!(index.query(&axis(3, 2), 10).unwrap().len(), 2);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatIndex::empty(4);
        assert!(index.is_empty());
        assert!(index.query(&axis(4, 0), 5).unwrap().is_empty());
    }

    #[test]
    fn ties_prefer_lower_slots() {
        let index = FlatIndex::build(2, &[axis(2, 1), axis(2, 0), axis(2, 0)]).unwrap();
        let hits = index.query(&axis(2, 0), 2).unwrap();
        assert_eq!(hits[0].slot, 1);
        assert_eq!(hits[1].slot, 2);
    }

    #[test]
    fn build_normalizes_inserted_vectors() {
        let index = FlatIndex::build(2, &[vec![3.0, 4.0]]).unwrap();
        let stored = index.vector(0).unwrap();
        assert!((stored[0] - 0.6).abs() < 1e-6);
        assert!((stored[1] - 0.8).abs() < 1e-6);
        assert!(index.vector(1).is_none());
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        assert!(matches!(
            FlatIndex::build(3, &[vec![1.0, 0.0]]),
            Err(RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        let index = FlatIndex::build(2, &[vec![1.0, 0.0]]).unwrap();
        assert!(index.query(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn validate_catches_ragged_vector_block() {
        let index = FlatIndex {
            dimension: 3,
            data: vec![1.0; 4],
        };
        assert!(matches!(
            index.validate(),
            Err(RetrievalError::CorruptArtifact(_))
        ));
    }
}
