//! Embedding vectors and similarity scoring.

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A fixed-length embedding vector.
///
/// The dimension travels with the value so vectors from different models can
/// be told apart instead of being compared element by element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|x| (*x as f64).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|x| *x == 0.0)
    }

    /// Scales to unit length. A zero vector is left as is.
    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for x in self.values.iter_mut() {
                *x = (*x as f64 / norm) as f32;
            }
        }
        self
    }

    /// Fails when the vector does not have the expected dimension.
    pub fn ensure_dimension(&self, expected: usize) -> Result<(), RagError> {
        if self.dimension() == expected {
            Ok(())
        } else {
            Err(RagError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            })
        }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Decodes a little-endian `f32` blob. Returns `None` when the byte count is
    /// not a whole number of floats.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self { values })
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

impl std::ops::Neg for Embedding {
    type Output = Embedding;

    fn neg(self) -> Self::Output {
        Embedding::new(self.values.into_iter().map(|x| -x).collect())
    }
}

/// Cosine similarity for scoring stored chunks.
///
/// Scores 0 instead of failing when either vector is all zeros, empty, or the
/// dimensions differ: a malformed vector is irrelevant, not fatal.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f64 {
    try_cosine_similarity(a, b).unwrap_or(0.0)
}

/// Cosine similarity that reports a dimension mismatch.
pub fn try_cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f64, RagError> {
    b.ensure_dimension(a.dimension())?;
    if a.dimension() == 0 {
        return Ok(0.0);
    }

    let dot: f64 = a
        .values
        .iter()
        .zip(b.values.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let denom = a.norm() * b.norm();

    if denom == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-6
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let v = Embedding::new(vec![1.0, 2.0, 3.0, 4.0]);
        assert!(approx_eq(cosine_similarity(&v, &v), 1.0));
    }

    #[test]
    fn cosine_is_minus_one_for_opposite_vectors() {
        let v = Embedding::new(vec![0.3, -1.5, 2.0]);
        let neg = -v.clone();
        assert!(approx_eq(cosine_similarity(&v, &neg), -1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(approx_eq(cosine_similarity(&a, &b), 0.0));
    }

    #[test]
    fn zero_vector_scores_zero() {
        let zero = Embedding::zeros(3);
        let v = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn dimension_mismatch_scores_zero_but_strict_variant_fails() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);

        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert!(matches!(
            try_cosine_similarity(&a, &b),
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn normalized_has_unit_length() {
        let v = Embedding::new(vec![3.0, 4.0]).normalized();
        assert!(approx_eq(v.norm(), 1.0));
        assert!(Embedding::zeros(4).normalized().is_zero());
    }

    #[test]
    fn blob_encoding_is_little_endian_f32() {
        let v = Embedding::new(vec![1.0, -0.5, 0.25]);
        let bytes = v.to_le_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(Embedding::from_le_bytes(&bytes), Some(v));
        assert_eq!(Embedding::from_le_bytes(&bytes[..5]), None);
    }
}
