//! Hash-code encoding from raw model outputs.
//!
//! A select hash layer emits one logit block per hash slot; encoding takes
//! the argmax per slot (first maximum wins, so ties are deterministic) and
//! remaps index 0 to -1. A linear hash layer emits continuous codes that are
//! sign-binarized. Either way the result is a discrete (batch × code_len)
//! matrix with no fractional values.

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::TrainError;

/// Raw model output before binarization, tagged by hash-layer kind.
#[derive(Debug, Clone)]
pub enum RawCodes {
    /// Continuous codes from a linear hash layer: (batch × code_len)
    Linear(Array2<f32>),
    /// Per-slot logits from a select hash layer: each (batch × slot_width)
    Select(Vec<Array2<f32>>),
}

impl RawCodes {
    /// Batch size of the raw output.
    pub fn batch_len(&self) -> usize {
        match self {
            Self::Linear(x) => x.nrows(),
            Self::Select(slots) => slots.first().map(|s| s.nrows()).unwrap_or(0),
        }
    }

    /// Flatten to a single continuous (batch × total_width) matrix for the
    /// loss computation. Select slots are concatenated along the feature
    /// axis; linear output is returned as-is.
    pub fn flatten(&self) -> Result<Array2<f32>, TrainError> {
        match self {
            Self::Linear(x) => Ok(x.clone()),
            Self::Select(slots) => {
                if slots.is_empty() {
                    return Err(TrainError::EmptySlots);
                }
                let views: Vec<ArrayView2<f32>> = slots.iter().map(|s| s.view()).collect();
                ndarray::concatenate(Axis(1), &views).map_err(|_| TrainError::RowMismatch {
                    context: "select slot concatenation",
                    left: slots[0].nrows(),
                    right: slots.iter().map(|s| s.nrows()).max().unwrap_or(0),
                })
            }
        }
    }
}

/// Index of the first maximum in a row. Ties break toward the lowest index.
fn argmax_first(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate().skip(1) {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// Encode raw model output into a discrete hash-code matrix.
///
/// Deterministic: identical input always yields identical codes.
pub fn encode_hash(raw: &RawCodes) -> Result<Array2<f32>, TrainError> {
    match raw {
        RawCodes::Linear(x) => Ok(x.mapv(|v| if v >= 0.0 { 1.0 } else { -1.0 })),
        RawCodes::Select(slots) => {
            if slots.is_empty() {
                return Err(TrainError::EmptySlots);
            }
            let batch = slots[0].nrows();
            for slot in slots.iter().skip(1) {
                if slot.nrows() != batch {
                    return Err(TrainError::RowMismatch {
                        context: "select slots",
                        left: batch,
                        right: slot.nrows(),
                    });
                }
            }

            let mut code = Array2::<f32>::zeros((batch, slots.len()));
            for (j, slot) in slots.iter().enumerate() {
                for (i, row) in slot.axis_iter(Axis(0)).enumerate() {
                    let arg = match row.as_slice() {
                        Some(s) => argmax_first(s),
                        None => argmax_first(&row.to_vec()),
                    };
                    // Slot value 0 becomes -1; higher indices keep their value
                    code[[i, j]] = if arg == 0 { -1.0 } else { arg as f32 };
                }
            }
            Ok(code)
        }
    }
}
