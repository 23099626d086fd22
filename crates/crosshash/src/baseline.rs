//! Non-learned baseline model: seeded random projections.
//!
//! A locality-sensitive-hashing style baseline that projects each modality
//! through a fixed random matrix. It trains nothing (the backward pass is a
//! no-op) but exercises the full session machinery and gives a floor score
//! that a learned model has to beat.

use ndarray::{s, Array2, ArrayView2};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crosshash_core::{
    HashLayerKind, HashModel, LossReport, Optimizer, RawCodes, TrainConfig, TrainError,
    TrainResult,
};

/// Slot width of the select head: each output bit picks between two logits.
const SELECT_SLOT_WIDTH: usize = 2;

fn xavier_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f32> {
    let bound = (6.0 / (rows + cols) as f32).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Array2::from_shape_simple_fn((rows, cols), || rng.sample(dist))
}

#[derive(Serialize, Deserialize)]
struct ProjectionState {
    image_weights: Vec<Vec<f32>>,
    text_weights: Vec<Vec<f32>>,
}

fn weights_to_rows(w: &Array2<f32>) -> Vec<Vec<f32>> {
    w.rows().into_iter().map(|r| r.to_vec()).collect()
}

fn rows_to_weights(rows: &[Vec<f32>], expected: (usize, usize)) -> TrainResult<Array2<f32>> {
    let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
    if rows.len() != expected.0 || ncols != expected.1 || rows.iter().any(|r| r.len() != ncols) {
        return Err(TrainError::Model(format!(
            "checkpoint weight shape ({}, {ncols}) does not match model ({}, {})",
            rows.len(),
            expected.0,
            expected.1
        )));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec(expected, flat).map_err(|e| TrainError::Model(e.to_string()))
}

/// Fixed random-projection hashing model for both modalities.
pub struct RandomProjectionModel {
    w_img: Array2<f32>,
    w_txt: Array2<f32>,
    hash_layer: HashLayerKind,
    output_dim: usize,
}

impl RandomProjectionModel {
    pub fn new(config: &TrainConfig, image_dim: usize, text_dim: usize, seed: u64) -> Self {
        let proj_dim = match config.hash_layer {
            HashLayerKind::Linear => config.output_dim,
            HashLayerKind::Select => config.output_dim * SELECT_SLOT_WIDTH,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            w_img: xavier_matrix(&mut rng, image_dim, proj_dim),
            w_txt: xavier_matrix(&mut rng, text_dim, proj_dim),
            hash_layer: config.hash_layer,
            output_dim: config.output_dim,
        }
    }

    fn project(&self, features: &ArrayView2<f32>, weights: &Array2<f32>) -> TrainResult<RawCodes> {
        if features.ncols() != weights.nrows() {
            return Err(TrainError::ShapeMismatch {
                expected: weights.nrows(),
                got: features.ncols(),
            });
        }
        let projected = features.dot(weights);
        Ok(match self.hash_layer {
            HashLayerKind::Linear => RawCodes::Linear(projected.mapv(f32::tanh)),
            HashLayerKind::Select => {
                let slots = (0..self.output_dim)
                    .map(|slot| {
                        let start = slot * SELECT_SLOT_WIDTH;
                        projected
                            .slice(s![.., start..start + SELECT_SLOT_WIDTH])
                            .to_owned()
                    })
                    .collect();
                RawCodes::Select(slots)
            }
        })
    }
}

impl HashModel for RandomProjectionModel {
    fn forward(
        &mut self,
        images: &ArrayView2<f32>,
        texts: &ArrayView2<f32>,
    ) -> TrainResult<(RawCodes, RawCodes)> {
        Ok((
            self.project(images, &self.w_img)?,
            self.project(texts, &self.w_txt)?,
        ))
    }

    fn encode_image(&self, images: &ArrayView2<f32>) -> TrainResult<RawCodes> {
        self.project(images, &self.w_img)
    }

    fn encode_text(&self, texts: &ArrayView2<f32>) -> TrainResult<RawCodes> {
        self.project(texts, &self.w_txt)
    }

    fn backward(&mut self, _report: &LossReport) -> TrainResult<()> {
        // The projections are fixed; nothing to update.
        Ok(())
    }

    fn state_bytes(&self) -> TrainResult<Vec<u8>> {
        let state = ProjectionState {
            image_weights: weights_to_rows(&self.w_img),
            text_weights: weights_to_rows(&self.w_txt),
        };
        serde_json::to_vec(&state).map_err(|e| TrainError::Model(e.to_string()))
    }

    fn load_state(&mut self, bytes: &[u8]) -> TrainResult<()> {
        let state: ProjectionState =
            serde_json::from_slice(bytes).map_err(|e| TrainError::Model(e.to_string()))?;
        self.w_img = rows_to_weights(&state.image_weights, self.w_img.dim())?;
        self.w_txt = rows_to_weights(&state.text_weights, self.w_txt.dim())?;
        Ok(())
    }
}

/// Constant learning rate with stepped multiplicative decay.
pub struct DecayLr {
    lr: f64,
    decay: f64,
    decay_freq: usize,
}

impl DecayLr {
    pub fn new(config: &TrainConfig) -> Self {
        Self {
            lr: config.lr,
            decay: config.lr_decay,
            decay_freq: config.lr_decay_freq.max(1),
        }
    }
}

impl Optimizer for DecayLr {
    fn step(&mut self) {}

    fn learning_rates(&self) -> Vec<f64> {
        vec![self.lr]
    }

    fn on_epoch_end(&mut self, epoch: usize) {
        if (epoch + 1) % self.decay_freq == 0 {
            self.lr *= self.decay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_config() -> TrainConfig {
        TrainConfig {
            hash_layer: HashLayerKind::Linear,
            output_dim: 4,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_linear_projection_shapes_and_range() {
        let config = linear_config();
        let model = RandomProjectionModel::new(&config, 3, 5, 42);
        let images = array![[0.1, 0.2, 0.3], [1.0, -1.0, 0.5]];
        let codes = model.encode_image(&images.view()).unwrap();
        let raw = codes.flatten().unwrap();
        assert_eq!(raw.dim(), (2, 4));
        // tanh-squashed outputs stay inside (-1, 1)
        assert!(raw.iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_select_projection_slot_layout() {
        let config = TrainConfig {
            hash_layer: HashLayerKind::Select,
            output_dim: 4,
            ..TrainConfig::default()
        };
        let model = RandomProjectionModel::new(&config, 3, 5, 42);
        let images = array![[0.1, 0.2, 0.3]];
        match model.encode_image(&images.view()).unwrap() {
            RawCodes::Select(slots) => {
                assert_eq!(slots.len(), 4);
                assert!(slots.iter().all(|s| s.dim() == (1, SELECT_SLOT_WIDTH)));
            }
            RawCodes::Linear(_) => panic!("expected select codes"),
        }
    }

    #[test]
    fn test_seed_determinism() {
        let config = linear_config();
        let a = RandomProjectionModel::new(&config, 3, 5, 7);
        let b = RandomProjectionModel::new(&config, 3, 5, 7);
        let c = RandomProjectionModel::new(&config, 3, 5, 8);
        assert_eq!(a.w_img, b.w_img);
        assert_ne!(a.w_img, c.w_img);
    }

    #[test]
    fn test_feature_dim_mismatch_rejected() {
        let config = linear_config();
        let model = RandomProjectionModel::new(&config, 3, 5, 42);
        let wrong = array![[0.1, 0.2]];
        assert!(model.encode_image(&wrong.view()).is_err());
    }

    #[test]
    fn test_state_roundtrip() {
        let config = linear_config();
        let a = RandomProjectionModel::new(&config, 3, 5, 7);
        let mut b = RandomProjectionModel::new(&config, 3, 5, 99);
        assert_ne!(a.w_img, b.w_img);
        b.load_state(&a.state_bytes().unwrap()).unwrap();
        assert_eq!(a.w_img, b.w_img);
        assert_eq!(a.w_txt, b.w_txt);
    }

    #[test]
    fn test_state_shape_mismatch_rejected() {
        let config = linear_config();
        let a = RandomProjectionModel::new(&config, 3, 5, 7);
        let mut b = RandomProjectionModel::new(&config, 4, 5, 7);
        assert!(b.load_state(&a.state_bytes().unwrap()).is_err());
    }

    #[test]
    fn test_decay_lr_schedule() {
        let config = TrainConfig {
            lr: 1e-3,
            lr_decay: 0.5,
            lr_decay_freq: 2,
            ..TrainConfig::default()
        };
        let mut opt = DecayLr::new(&config);
        assert_eq!(opt.learning_rates(), vec![1e-3]);
        opt.on_epoch_end(0);
        assert_eq!(opt.learning_rates(), vec![1e-3]);
        opt.on_epoch_end(1);
        assert_eq!(opt.learning_rates(), vec![5e-4]);
        opt.on_epoch_end(2);
        opt.on_epoch_end(3);
        assert_eq!(opt.learning_rates(), vec![2.5e-4]);
    }
}
