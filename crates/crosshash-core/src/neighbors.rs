//! Label-neighbor computation.
//!
//! Multi-hot label vectors are turned into a pairwise binary matrix:
//! entry (i, j) is 1 when samples i and j share at least one category.

use ndarray::{Array2, ArrayView2};

use crate::error::TrainError;

/// Binary label-similarity matrix between two label batches.
///
/// Entry (i, j) = 1.0 iff `a[i] · b[j] > 0`, else 0.0.
pub fn calc_neighbors(
    a: &ArrayView2<f32>,
    b: &ArrayView2<f32>,
) -> Result<Array2<f32>, TrainError> {
    if a.ncols() != b.ncols() {
        return Err(TrainError::ShapeMismatch {
            expected: a.ncols(),
            got: b.ncols(),
        });
    }
    let mut sim = a.dot(&b.t());
    sim.mapv_inplace(|v| if v > 0.0 { 1.0 } else { 0.0 });
    Ok(sim)
}

/// Identity supervision for datasets without multi-label annotations:
/// each sample is its own sole neighbor.
pub fn identity_neighbors(n: usize) -> Array2<f32> {
    Array2::from_diag_elem(n, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_self_similarity_symmetric_with_unit_diagonal() {
        let labels = array![
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let sim = calc_neighbors(&labels.view(), &labels.view()).unwrap();
        for i in 0..3 {
            // Non-zero rows always share a label with themselves
            assert_eq!(sim[[i, i]], 1.0);
            for j in 0..3 {
                assert_eq!(sim[[i, j]], sim[[j, i]]);
            }
        }
        // Rows 0 and 1 are disjoint; rows 0 and 2 share category 0
        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[0, 2]], 1.0);
    }

    #[test]
    fn test_zero_row_has_no_neighbors() {
        let labels = array![[0.0, 0.0], [1.0, 0.0]];
        let sim = calc_neighbors(&labels.view(), &labels.view()).unwrap();
        assert_eq!(sim[[0, 0]], 0.0);
        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[1, 1]], 1.0);
    }

    #[test]
    fn test_rectangular_pairing() {
        let q = array![[1.0, 0.0]];
        let r = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let sim = calc_neighbors(&q.view(), &r.view()).unwrap();
        assert_eq!(sim.shape(), &[1, 3]);
        assert_eq!(sim[[0, 0]], 1.0);
        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[0, 2]], 1.0);
    }

    #[test]
    fn test_category_count_mismatch_rejected() {
        let a = array![[1.0, 0.0]];
        let b = array![[1.0, 0.0, 0.0]];
        assert!(calc_neighbors(&a.view(), &b.view()).is_err());
    }

    #[test]
    fn test_identity_neighbors() {
        let sim = identity_neighbors(3);
        assert_eq!(sim[[0, 0]], 1.0);
        assert_eq!(sim[[1, 2]], 0.0);
        assert_eq!(sim.sum(), 3.0);
    }
}
