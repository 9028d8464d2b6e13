//! Exact nearest-neighbor search over a flat, row-major vector buffer.

use crate::error::{Result, RetrievalError};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Brute-force squared-L2 index.
///
/// An index that has never seen an [`add`](FlatL2Index::add) call refuses to
/// search, which is how callers tell "never built" apart from "built from
/// nothing".
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimensions: usize,
    data: Vec<f32>,
    initialized: bool,
}

impl FlatL2Index {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
            initialized: false,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.data.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        self.data.get(start..start + self.dimensions)
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimensions.max(1))
    }

    /// Appends rows. Either every row is appended or none is.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|row| row.len() != self.dimensions) {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                found: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimensions);
        for row in vectors {
            self.data.extend_from_slice(row);
        }
        self.initialized = true;
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if !self.initialized {
            return Err(RetrievalError::IndexNotInitialized);
        }
        if query.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                found: query.len(),
            });
        }

        let mut scored: Vec<Neighbor> = self
            .vectors()
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();

        let k = k.min(scored.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, compare_neighbors);
            scored.truncate(k);
        }
        scored.sort_by(compare_neighbors);

        Ok(scored)
    }
}

fn compare_neighbors(left: &Neighbor, right: &Neighbor) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then(left.position.cmp(&right.position))
}

pub fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}
