//! Pairwise similarity and distance primitives between embedding batches.
//!
//! Both functions take an (m × d) and an (n × d) batch and produce an
//! (m × n) matrix. Cosine returns raw similarity in [-1, 1]; the loss layer
//! applies `1 - cos` when it needs a distance. Euclidean returns distance
//! directly.

use ndarray::{Array2, ArrayView2};

use crate::error::TrainError;
use crate::math::{l2_normalize_rows, row_sq_norms};

fn check_dims(a: &ArrayView2<f32>, b: &ArrayView2<f32>) -> Result<(), TrainError> {
    if a.ncols() != b.ncols() {
        return Err(TrainError::ShapeMismatch {
            expected: a.ncols(),
            got: b.ncols(),
        });
    }
    Ok(())
}

/// Pairwise cosine similarity: rows are unit-normalized, then dot-producted.
pub fn cosine_similarity(
    a: &ArrayView2<f32>,
    b: &ArrayView2<f32>,
) -> Result<Array2<f32>, TrainError> {
    check_dims(a, b)?;
    let a_n = l2_normalize_rows(a);
    let b_n = l2_normalize_rows(b);
    Ok(a_n.dot(&b_n.t()))
}

/// Pairwise Euclidean distance via the expanded form
/// `||a - b||² = ||a||² + ||b||² - 2·a·b`, clamped at zero before the sqrt.
pub fn euclidean_similarity(
    a: &ArrayView2<f32>,
    b: &ArrayView2<f32>,
) -> Result<Array2<f32>, TrainError> {
    check_dims(a, b)?;
    let a_sq = row_sq_norms(a);
    let b_sq = row_sq_norms(b);
    let mut dist = a.dot(&b.t());
    for ((i, j), v) in dist.indexed_iter_mut() {
        let sq = a_sq[i] + b_sq[j] - 2.0 * *v;
        *v = sq.max(0.0).sqrt();
    }
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_identical_rows() {
        let a = array![[1.0, 0.0], [0.0, 2.0]];
        let sim = cosine_similarity(&a.view(), &a.view()).unwrap();
        assert!((sim[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((sim[[1, 1]] - 1.0).abs() < 1e-6);
        assert!(sim[[0, 1]].abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_rows() {
        let a = array![[1.0, 1.0]];
        let b = array![[-1.0, -1.0]];
        let sim = cosine_similarity(&a.view(), &b.view()).unwrap();
        assert!((sim[[0, 0]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_known_distance() {
        let a = array![[0.0, 0.0]];
        let b = array![[3.0, 4.0], [0.0, 0.0]];
        let dist = euclidean_similarity(&a.view(), &b.view()).unwrap();
        assert!((dist[[0, 0]] - 5.0).abs() < 1e-5);
        assert!(dist[[0, 1]].abs() < 1e-5);
    }

    #[test]
    fn test_euclidean_symmetric() {
        let a = array![[1.0, 2.0], [3.0, -1.0]];
        let dist = euclidean_similarity(&a.view(), &a.view()).unwrap();
        assert!((dist[[0, 1]] - dist[[1, 0]]).abs() < 1e-5);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            cosine_similarity(&a.view(), &b.view()),
            Err(TrainError::ShapeMismatch {
                expected: 2,
                got: 3
            })
        ));
        assert!(euclidean_similarity(&a.view(), &b.view()).is_err());
    }
}
