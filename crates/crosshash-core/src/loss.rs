//! Similarity-preserving loss terms and the composite training objective.
//!
//! The objective combines one cross-modal (image/text) similarity loss with
//! two same-modality self-comparison losses, all masked by a label-similarity
//! matrix, plus a quantization penalty for continuous (linear) hash layers.
//! Positive pairs inside the clipping threshold τ contribute zero loss;
//! negative pairs are rewarded for separation only up to a distance ceiling
//! (1.0 for cosine, `sqrt(2·code_len·ϑ)` for Euclidean) so training never
//! chases unbounded distances.

use ndarray::{Array2, ArrayView2};

use crate::config::{DistanceKind, HashLayerKind, LossNorm, TrainConfig};
use crate::error::TrainError;
use crate::neighbors::calc_neighbors;
use crate::similarity::{cosine_similarity, euclidean_similarity};

/// Down-weighting of the text-text terms under Euclidean distance.
///
/// Empirically tuned: text embedding statistics differ enough from image
/// embeddings that an equal weight destabilizes the Euclidean objective.
const TEXT_TERM_WEIGHT: f32 = 0.1;

/// Distance matrix plus the reduced positive/negative terms of one pairing.
#[derive(Debug, Clone)]
pub struct SimilarityTerms {
    /// Raw pairwise distance matrix before masking
    pub distance: Array2<f32>,
    /// Reduced loss over same-label pairs
    pub positive: f32,
    /// Reduced loss over different-label pairs
    pub negative: f32,
}

/// Label-similarity-weighted loss between two embedding batches.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityLoss {
    distance: DistanceKind,
    norm: LossNorm,
    /// Clipping threshold τ
    threshold: f32,
    /// Error-code rate ϑ for the Euclidean distance ceiling
    vartheta: f32,
    code_len: usize,
}

impl SimilarityLoss {
    pub fn new(
        distance: DistanceKind,
        norm: LossNorm,
        threshold: f32,
        vartheta: f32,
        code_len: usize,
    ) -> Self {
        Self {
            distance,
            norm,
            threshold,
            vartheta,
            code_len,
        }
    }

    /// Distance ceiling for negative pairs under Euclidean distance.
    pub fn max_value(&self) -> f32 {
        (2.0 * self.code_len as f32 * self.vartheta).sqrt()
    }

    /// Compute the positive and negative terms for batches `a` and `b` with
    /// label-similarity matrix `label_sim` (entries in {0, 1}).
    pub fn compute(
        &self,
        a: &ArrayView2<f32>,
        b: &ArrayView2<f32>,
        label_sim: &ArrayView2<f32>,
    ) -> Result<SimilarityTerms, TrainError> {
        let distance = match self.distance {
            DistanceKind::Cosine => {
                let mut d = cosine_similarity(a, b)?;
                d.mapv_inplace(|v| 1.0 - v);
                d
            }
            DistanceKind::Euclidean => euclidean_similarity(a, b)?,
        };
        if distance.shape() != label_sim.shape() {
            return Err(TrainError::RowMismatch {
                context: "label-similarity matrix",
                left: distance.nrows(),
                right: label_sim.nrows(),
            });
        }

        let inverse_sim = label_sim.mapv(|v| 1.0 - v);
        let mut positive = &distance * label_sim;
        let mut negative = &distance * &inverse_sim;

        match self.distance {
            DistanceKind::Cosine => {
                // Positives inside τ cost nothing; negatives are pushed out
                // only until distance reaches 1.
                let tau = self.threshold;
                positive.mapv_inplace(|v| v.max(tau) - tau);
                negative = &inverse_sim - &negative.mapv(|v| v.min(1.0));
            }
            DistanceKind::Euclidean => {
                let max_value = self.max_value();
                negative =
                    inverse_sim.mapv(|v| v * max_value) - negative.mapv(|v| v.min(max_value));
            }
        }

        let (positive, negative) = match self.norm {
            LossNorm::L1 => (
                positive.mean().unwrap_or(0.0),
                negative.mean().unwrap_or(0.0),
            ),
            LossNorm::L2 => (
                positive.mapv(|v| v * v).mean().unwrap_or(0.0),
                negative.mapv(|v| v * v).mean().unwrap_or(0.0),
            ),
        };

        Ok(SimilarityTerms {
            distance,
            positive,
            negative,
        })
    }
}

/// Quantization penalty: mean squared distance of each value to its nearest
/// ±1 target. Zero only when the batch is already exactly binary.
pub fn quantization_loss(a: &ArrayView2<f32>) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    a.mapv(|v| {
        let d = v.abs() - 1.0;
        d * d
    })
    .mean()
    .unwrap_or(0.0)
}

/// Sub-term breakdown of one composite loss evaluation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LossReport {
    /// Scalar training objective
    pub total: f32,
    /// Cross-modal image/text terms
    pub cross_positive: f32,
    pub cross_negative: f32,
    /// Image self-comparison terms
    pub image_positive: f32,
    pub image_negative: f32,
    /// Text self-comparison terms
    pub text_positive: f32,
    pub text_negative: f32,
    /// Quantization penalty; `None` for select hash layers, whose codes are
    /// discrete by construction
    pub quantization: Option<f32>,
}

/// Composite training objective over one mini-batch.
#[derive(Debug, Clone)]
pub struct CompositeLoss {
    similarity: SimilarityLoss,
    distance: DistanceKind,
    hash_layer: HashLayerKind,
    display_step: u64,
    epochs: usize,
}

impl CompositeLoss {
    pub fn new(config: &TrainConfig) -> Self {
        let similarity = SimilarityLoss::new(
            config.similarity_function,
            config.loss_type,
            config.effective_threshold(),
            config.vartheta,
            config.output_dim,
        );
        Self {
            similarity,
            distance: config.similarity_function,
            hash_layer: config.hash_layer,
            display_step: config.display_step,
            epochs: config.epochs,
        }
    }

    /// Compute the composite objective for one batch.
    ///
    /// `labels` is the multi-hot label batch; single-label datasets pass an
    /// identity matrix instead (each sample its own neighbor). `epoch`,
    /// `step`, and `lrs` only feed the periodic log record.
    pub fn compute(
        &self,
        image: &ArrayView2<f32>,
        text: &ArrayView2<f32>,
        labels: &ArrayView2<f32>,
        epoch: usize,
        step: u64,
        lrs: &[f64],
    ) -> Result<LossReport, TrainError> {
        let label_sim = calc_neighbors(labels, labels)?;
        let label_sim = label_sim.view();

        let cross = self.similarity.compute(image, text, &label_sim)?;
        let image_self = self.similarity.compute(image, image, &label_sim)?;
        let text_self = self.similarity.compute(text, text, &label_sim)?;

        let cross_term = cross.positive + cross.negative;
        let self_term = match self.distance {
            // Text embedding statistics run hotter under Euclidean distance;
            // both text terms are down-weighted.
            DistanceKind::Euclidean => {
                image_self.positive
                    + TEXT_TERM_WEIGHT * text_self.positive
                    + image_self.negative
                    + TEXT_TERM_WEIGHT * text_self.negative
            }
            DistanceKind::Cosine => {
                image_self.positive + text_self.positive + image_self.negative + text_self.negative
            }
        };

        let quantization = match self.hash_layer {
            HashLayerKind::Select => None,
            HashLayerKind::Linear => {
                Some((quantization_loss(image) + quantization_loss(text)) / 2.0)
            }
        };

        let total = cross_term + self_term + quantization.unwrap_or(0.0);

        let report = LossReport {
            total,
            cross_positive: cross.positive,
            cross_negative: cross.negative,
            image_positive: image_self.positive,
            image_negative: image_self.negative,
            text_positive: text_self.positive,
            text_negative: text_self.negative,
            quantization,
        };

        if step % self.display_step == 0 {
            let lr_display = format_learning_rates(lrs);
            tracing::info!(
                epoch,
                total_epochs = self.epochs,
                step,
                total = report.total,
                cross_positive = report.cross_positive,
                cross_negative = report.cross_negative,
                image_positive = report.image_positive,
                image_negative = report.image_negative,
                text_positive = report.text_positive,
                text_negative = report.text_negative,
                quantization = report.quantization,
                lr = %lr_display,
                "loss breakdown"
            );
        }

        Ok(report)
    }
}

/// Sorted, deduplicated learning rates joined for display.
pub fn format_learning_rates(lrs: &[f64]) -> String {
    let mut sorted: Vec<f64> = lrs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    sorted
        .iter()
        .map(|lr| format!("{lr:.9}"))
        .collect::<Vec<_>>()
        .join("-")
}
