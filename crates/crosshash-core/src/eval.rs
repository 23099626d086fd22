//! Retrieval evaluation: code buffers and mean Average Precision.
//!
//! Validation encodes the query and retrieval splits batch by batch into
//! fixed-size buffers, then ranks every retrieval code against every query
//! code. The inner product of ±1 codes is a monotone proxy for Hamming
//! distance, so ranking by descending inner product ranks by ascending
//! Hamming distance. The Q×R similarity and relevance matrices are computed
//! as two matrix products; only the per-query sort remains.

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::TrainError;

/// Fixed-size hash-code buffer written incrementally by sample index.
///
/// Allocated once per evaluation pass, then treated as immutable input to
/// the mAP computation.
pub struct CodeBuffer {
    codes: Array2<f32>,
}

impl CodeBuffer {
    /// Allocate a zeroed (len × code_len) buffer.
    pub fn new(len: usize, code_len: usize) -> Self {
        Self {
            codes: Array2::zeros((len, code_len)),
        }
    }

    /// Write one encoded batch at the given sample indices.
    pub fn write(
        &mut self,
        indices: &[usize],
        batch: &ArrayView2<f32>,
    ) -> Result<(), TrainError> {
        if batch.ncols() != self.codes.ncols() {
            return Err(TrainError::ShapeMismatch {
                expected: self.codes.ncols(),
                got: batch.ncols(),
            });
        }
        if indices.len() != batch.nrows() {
            return Err(TrainError::RowMismatch {
                context: "code buffer write",
                left: indices.len(),
                right: batch.nrows(),
            });
        }
        for (&index, row) in indices.iter().zip(batch.axis_iter(Axis(0))) {
            if index >= self.codes.nrows() {
                return Err(TrainError::IndexOutOfBounds {
                    index,
                    len: self.codes.nrows(),
                });
            }
            self.codes.row_mut(index).assign(&row);
        }
        Ok(())
    }

    /// View of the accumulated codes.
    pub fn codes(&self) -> ArrayView2<f32> {
        self.codes.view()
    }

    /// Take ownership of the accumulated codes.
    pub fn into_codes(self) -> Array2<f32> {
        self.codes
    }
}

/// Mean Average Precision of `query_codes` against `retrieval_codes`.
///
/// A retrieval item is relevant to a query when their label vectors share at
/// least one category. `top_k` truncates each ranking; `None` ranks the full
/// retrieval set. Queries with no relevant item contribute an AP of 0 rather
/// than failing.
pub fn mean_average_precision(
    query_codes: &ArrayView2<f32>,
    retrieval_codes: &ArrayView2<f32>,
    query_labels: &ArrayView2<f32>,
    retrieval_labels: &ArrayView2<f32>,
    top_k: Option<usize>,
) -> Result<f32, TrainError> {
    if query_codes.ncols() != retrieval_codes.ncols() {
        return Err(TrainError::ShapeMismatch {
            expected: query_codes.ncols(),
            got: retrieval_codes.ncols(),
        });
    }
    if query_labels.ncols() != retrieval_labels.ncols() {
        return Err(TrainError::ShapeMismatch {
            expected: query_labels.ncols(),
            got: retrieval_labels.ncols(),
        });
    }
    if query_codes.nrows() != query_labels.nrows() {
        return Err(TrainError::RowMismatch {
            context: "query codes vs labels",
            left: query_codes.nrows(),
            right: query_labels.nrows(),
        });
    }
    if retrieval_codes.nrows() != retrieval_labels.nrows() {
        return Err(TrainError::RowMismatch {
            context: "retrieval codes vs labels",
            left: retrieval_codes.nrows(),
            right: retrieval_labels.nrows(),
        });
    }

    let num_queries = query_codes.nrows();
    let num_retrieval = retrieval_codes.nrows();
    if num_queries == 0 || num_retrieval == 0 {
        return Ok(0.0);
    }

    // One GEMM each for similarity and relevance; the per-query work below
    // is just a sort over precomputed rows.
    let similarity = query_codes.dot(&retrieval_codes.t());
    let relevance = query_labels.dot(&retrieval_labels.t());

    let cutoff = top_k.unwrap_or(num_retrieval).min(num_retrieval);
    let mut ap_sum = 0.0f64;

    let mut order: Vec<usize> = Vec::with_capacity(num_retrieval);
    for q in 0..num_queries {
        let sim_row = similarity.row(q);
        order.clear();
        order.extend(0..num_retrieval);
        // Descending similarity, index ascending on ties for determinism.
        order.sort_unstable_by(|&i, &j| {
            sim_row[j]
                .partial_cmp(&sim_row[i])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(i.cmp(&j))
        });

        let rel_row = relevance.row(q);
        let mut hits = 0u32;
        let mut precision_sum = 0.0f64;
        for (rank, &idx) in order[..cutoff].iter().enumerate() {
            if rel_row[idx] > 0.0 {
                hits += 1;
                precision_sum += hits as f64 / (rank + 1) as f64;
            }
        }
        if hits > 0 {
            ap_sum += precision_sum / hits as f64;
        }
        // Zero-relevant queries contribute AP = 0.
    }

    Ok((ap_sum / num_queries as f64) as f32)
}

/// mAP scores for the four query/retrieval direction pairs.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EvalScores {
    pub i2t: f32,
    pub t2i: f32,
    pub i2i: f32,
    pub t2t: f32,
}

/// Evaluate all four modality directions from encoded split buffers.
pub fn evaluate_directions(
    query_img: &ArrayView2<f32>,
    query_txt: &ArrayView2<f32>,
    retrieval_img: &ArrayView2<f32>,
    retrieval_txt: &ArrayView2<f32>,
    query_labels: &ArrayView2<f32>,
    retrieval_labels: &ArrayView2<f32>,
    top_k: Option<usize>,
) -> Result<EvalScores, TrainError> {
    Ok(EvalScores {
        i2t: mean_average_precision(query_img, retrieval_txt, query_labels, retrieval_labels, top_k)?,
        t2i: mean_average_precision(query_txt, retrieval_img, query_labels, retrieval_labels, top_k)?,
        i2i: mean_average_precision(query_img, retrieval_img, query_labels, retrieval_labels, top_k)?,
        t2t: mean_average_precision(query_txt, retrieval_txt, query_labels, retrieval_labels, top_k)?,
    })
}
