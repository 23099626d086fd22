//! Shared math utilities.

use ndarray::{Array2, ArrayView2, Axis};

/// L2-normalize every row of a matrix, returning a new matrix.
///
/// Zero rows are left as zeros rather than producing NaN.
pub fn l2_normalize_rows(m: &ArrayView2<f32>) -> Array2<f32> {
    let mut out = m.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            row.mapv_inplace(|x| x / norm);
        }
    }
    out
}

/// Squared L2 norm of every row, as a column of length `nrows`.
pub fn row_sq_norms(m: &ArrayView2<f32>) -> Vec<f32> {
    m.axis_iter(Axis(0))
        .map(|row| row.iter().map(|x| x * x).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_l2_normalize_rows() {
        let m = array![[3.0, 4.0], [0.0, 2.0]];
        let n = l2_normalize_rows(&m.view());
        assert!((n[[0, 0]] - 0.6).abs() < 1e-6);
        assert!((n[[0, 1]] - 0.8).abs() < 1e-6);
        assert!((n[[1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_row() {
        let m = array![[0.0, 0.0, 0.0]];
        let n = l2_normalize_rows(&m.view());
        assert_eq!(n, array![[0.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_row_sq_norms() {
        let m = array![[1.0, 2.0], [3.0, 0.0]];
        assert_eq!(row_sq_norms(&m.view()), vec![5.0, 9.0]);
    }
}
