//! Training session controller.
//!
//! One session owns the config, the composite loss, the global step counter,
//! and the running best-mAP state. The model, optimizer, and data loaders
//! are external collaborators behind the [`HashModel`], [`Optimizer`], and
//! [`BatchSource`] traits; a training run is a plain sequential loop of
//! forward → loss → backward → optimizer step per mini-batch, with a
//! validation pass and a checkpoint after every epoch.

use std::path::PathBuf;

use ndarray::{Array2, ArrayView2};

use crate::artifact::EvalArtifact;
use crate::config::TrainConfig;
use crate::encoder::{encode_hash, RawCodes};
use crate::error::{ConfigError, Result, TrainError, TrainResult};
use crate::eval::{evaluate_directions, CodeBuffer, EvalScores};
use crate::loss::{format_learning_rates, CompositeLoss};

/// One mini-batch of paired image/text features with supervision.
///
/// `labels` is the multi-hot label batch; single-label datasets substitute
/// identity rows (each sample its own neighbor). `indices` locate the
/// samples inside their split for code-buffer writes.
#[derive(Debug, Clone)]
pub struct TrainBatch {
    pub images: Array2<f32>,
    pub texts: Array2<f32>,
    pub labels: Array2<f32>,
    pub indices: Vec<usize>,
}

/// A data split that can be iterated in mini-batches.
pub trait BatchSource {
    /// Total number of samples in the split.
    fn num_samples(&self) -> usize;

    /// Iterate the split once, in mini-batches.
    fn batches(&mut self) -> Box<dyn Iterator<Item = TrainBatch> + '_>;
}

/// The hashing model: paired encoders plus hash heads.
///
/// The architecture, its parameters, and its gradient computation live
/// outside this crate; the session only needs forward passes, encoding
/// passes, and an opaque parameter state for checkpoints.
pub trait HashModel {
    /// Training forward pass for one batch of both modalities.
    fn forward(
        &mut self,
        images: &ArrayView2<f32>,
        texts: &ArrayView2<f32>,
    ) -> TrainResult<(RawCodes, RawCodes)>;

    /// Inference-mode encoding of an image feature batch.
    fn encode_image(&self, images: &ArrayView2<f32>) -> TrainResult<RawCodes>;

    /// Inference-mode encoding of a text feature batch.
    fn encode_text(&self, texts: &ArrayView2<f32>) -> TrainResult<RawCodes>;

    /// Backward pass for the most recent forward, given the loss breakdown.
    fn backward(&mut self, report: &crate::loss::LossReport) -> TrainResult<()>;

    /// Opaque parameter state for checkpointing.
    fn state_bytes(&self) -> TrainResult<Vec<u8>>;

    /// Restore parameters from a checkpoint.
    fn load_state(&mut self, bytes: &[u8]) -> TrainResult<()>;
}

/// The parameter updater paired with a [`HashModel`].
pub trait Optimizer {
    /// Clear accumulated gradients before the backward pass.
    fn zero_grad(&mut self) {}

    /// Apply one parameter update.
    fn step(&mut self);

    /// Current learning rates, one per parameter group.
    fn learning_rates(&self) -> Vec<f64>;

    /// Epoch-boundary hook (learning-rate decay schedules).
    fn on_epoch_end(&mut self, _epoch: usize) {}
}

/// Running best validation scores, tracked per retrieval direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestScores {
    pub map_i2t: f32,
    pub map_t2i: f32,
    pub epoch_i2t: Option<usize>,
    pub epoch_t2i: Option<usize>,
}

/// Training session: epoch/step iteration, loss invocation, validation, and
/// checkpoint triggering.
pub struct TrainSession {
    config: TrainConfig,
    loss: CompositeLoss,
    global_step: u64,
    best: BestScores,
}

impl TrainSession {
    /// Create a session from a validated configuration.
    pub fn new(config: TrainConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let loss = CompositeLoss::new(&config);
        Ok(Self {
            config,
            loss,
            global_step: 0,
            best: BestScores::default(),
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn best(&self) -> &BestScores {
        &self.best
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Run one training epoch. Returns the mean batch loss.
    pub fn train_epoch(
        &mut self,
        model: &mut dyn HashModel,
        optimizer: &mut dyn Optimizer,
        train: &mut dyn BatchSource,
        epoch: usize,
    ) -> Result<f32> {
        tracing::info!(epoch, total_epochs = self.config.epochs, "training epoch");
        let lrs = optimizer.learning_rates();
        let mut total = 0.0f64;
        let mut batches = 0u64;

        let mut step = 0u64;
        let mut global_step = self.global_step;
        for batch in train.batches() {
            global_step += 1;
            step += 1;

            let (raw_img, raw_txt) = model.forward(&batch.images.view(), &batch.texts.view())?;
            let image = raw_img.flatten()?;
            let text = raw_txt.flatten()?;

            let report = self.loss.compute(
                &image.view(),
                &text.view(),
                &batch.labels.view(),
                epoch,
                global_step,
                &lrs,
            )?;

            optimizer.zero_grad();
            model.backward(&report)?;
            optimizer.step();

            total += report.total as f64;
            batches += 1;
        }

        self.global_step = global_step;

        let mean = if batches > 0 {
            (total / batches as f64) as f32
        } else {
            0.0
        };
        tracing::info!(
            epoch,
            total_epochs = self.config.epochs,
            steps = step,
            mean_loss = mean,
            lr = %format_learning_rates(&lrs),
            "epoch finished"
        );
        Ok(mean)
    }

    /// Encode one split into fixed-size image and text code buffers.
    ///
    /// The buffers are indexed by the per-split sample indices carried on
    /// each batch, so shuffled loaders still land every code in its slot.
    pub fn encode_split(
        &self,
        model: &dyn HashModel,
        source: &mut dyn BatchSource,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let len = source.num_samples();
        let mut img_buffer = CodeBuffer::new(len, self.config.output_dim);
        let mut txt_buffer = CodeBuffer::new(len, self.config.output_dim);

        for batch in source.batches() {
            let img_code = encode_hash(&model.encode_image(&batch.images.view())?)?;
            let txt_code = encode_hash(&model.encode_text(&batch.texts.view())?)?;
            img_buffer.write(&batch.indices, &img_code.view())?;
            txt_buffer.write(&batch.indices, &txt_code.view())?;
        }

        Ok((img_buffer.into_codes(), txt_buffer.into_codes()))
    }

    /// Validation pass: encode both splits, score all four directions, and
    /// update the running best scores (saving an artifact on a new best).
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &mut self,
        model: &dyn HashModel,
        query: &mut dyn BatchSource,
        retrieval: &mut dyn BatchSource,
        query_labels: &ArrayView2<f32>,
        retrieval_labels: &ArrayView2<f32>,
        epoch: usize,
    ) -> Result<EvalScores> {
        let (query_img, query_txt) = self.encode_split(model, query)?;
        let (retrieval_img, retrieval_txt) = self.encode_split(model, retrieval)?;

        let scores = evaluate_directions(
            &query_img.view(),
            &query_txt.view(),
            &retrieval_img.view(),
            &retrieval_txt.view(),
            query_labels,
            retrieval_labels,
            None,
        )?;

        if scores.i2t > self.best.map_i2t {
            self.best.map_i2t = scores.i2t;
            self.best.epoch_i2t = Some(epoch);
            self.save_artifact(
                &query_img, &query_txt, &retrieval_img, &retrieval_txt,
                query_labels, retrieval_labels, "i2t",
            )?;
        }
        if scores.t2i > self.best.map_t2i {
            self.best.map_t2i = scores.t2i;
            self.best.epoch_t2i = Some(epoch);
            self.save_artifact(
                &query_img, &query_txt, &retrieval_img, &retrieval_txt,
                query_labels, retrieval_labels, "t2i",
            )?;
        }

        tracing::info!(
            epoch,
            total_epochs = self.config.epochs,
            map_i2t = scores.i2t,
            map_t2i = scores.t2i,
            map_i2i = scores.i2i,
            map_t2t = scores.t2t,
            best_i2t = self.best.map_i2t,
            best_t2i = self.best.map_t2i,
            "validation"
        );
        Ok(scores)
    }

    /// Full training run: epochs of train/validate/checkpoint.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        model: &mut dyn HashModel,
        optimizer: &mut dyn Optimizer,
        train: &mut dyn BatchSource,
        query: &mut dyn BatchSource,
        retrieval: &mut dyn BatchSource,
        query_labels: &ArrayView2<f32>,
        retrieval_labels: &ArrayView2<f32>,
    ) -> Result<()> {
        tracing::info!(
            epochs = self.config.epochs,
            train_samples = train.num_samples(),
            query_samples = query.num_samples(),
            retrieval_samples = retrieval.num_samples(),
            "starting training"
        );

        for epoch in 0..self.config.epochs {
            self.train_epoch(model, optimizer, train, epoch)?;
            self.validate(model, query, retrieval, query_labels, retrieval_labels, epoch)?;
            self.save_checkpoint(model, epoch)?;
            optimizer.on_epoch_end(epoch);
        }

        tracing::info!(
            best_epoch_i2t = self.best.epoch_i2t,
            best_map_i2t = self.best.map_i2t,
            best_epoch_t2i = self.best.epoch_t2i,
            best_map_t2i = self.best.map_t2i,
            "training finished"
        );
        Ok(())
    }

    /// Evaluation-only pass. Requires a `pretrained` checkpoint path in the
    /// config; refuses to score an uninitialized model.
    pub fn evaluate(
        &mut self,
        model: &mut dyn HashModel,
        query: &mut dyn BatchSource,
        retrieval: &mut dyn BatchSource,
        query_labels: &ArrayView2<f32>,
        retrieval_labels: &ArrayView2<f32>,
    ) -> Result<EvalScores> {
        let path = self
            .config
            .pretrained
            .clone()
            .ok_or(TrainError::MissingCheckpoint)?;
        let bytes = std::fs::read(&path).map_err(|e| TrainError::Checkpoint {
            path: path.clone(),
            message: e.to_string(),
        })?;
        model.load_state(&bytes)?;
        tracing::info!(path = %path.display(), "loaded checkpoint");

        let (query_img, query_txt) = self.encode_split(model, query)?;
        let (retrieval_img, retrieval_txt) = self.encode_split(model, retrieval)?;
        let scores = evaluate_directions(
            &query_img.view(),
            &query_txt.view(),
            &retrieval_img.view(),
            &retrieval_txt.view(),
            query_labels,
            retrieval_labels,
            None,
        )?;
        self.save_artifact(
            &query_img, &query_txt, &retrieval_img, &retrieval_txt,
            query_labels, retrieval_labels, "test",
        )?;
        tracing::info!(
            map_i2t = scores.i2t,
            map_t2i = scores.t2i,
            map_i2i = scores.i2i,
            map_t2t = scores.t2t,
            "evaluation"
        );
        Ok(scores)
    }

    /// Write the model's parameter state for this epoch.
    pub fn save_checkpoint(&self, model: &dyn HashModel, epoch: usize) -> Result<PathBuf> {
        let dir = self.config.save_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("checkpoint-epoch-{}.bin", epoch + 1));
        let bytes = model.state_bytes()?;
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), "saved checkpoint");
        Ok(path)
    }

    #[allow(clippy::too_many_arguments)]
    fn save_artifact(
        &self,
        query_img: &Array2<f32>,
        query_txt: &Array2<f32>,
        retrieval_img: &Array2<f32>,
        retrieval_txt: &Array2<f32>,
        query_labels: &ArrayView2<f32>,
        retrieval_labels: &ArrayView2<f32>,
        tag: &str,
    ) -> Result<()> {
        let artifact = EvalArtifact::from_matrices(
            &query_img.view(),
            &query_txt.view(),
            &retrieval_img.view(),
            &retrieval_txt.view(),
            query_labels,
            retrieval_labels,
        );
        artifact.save(
            &self.config.save_dir(),
            self.config.output_dim,
            &self.config.dataset,
            tag,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DistanceKind, HashLayerKind, LossNorm};
    use ndarray::array;

    /// Pass-through model: features already are the raw codes.
    struct ToyModel {
        loaded: bool,
    }

    impl HashModel for ToyModel {
        fn forward(
            &mut self,
            images: &ArrayView2<f32>,
            texts: &ArrayView2<f32>,
        ) -> TrainResult<(RawCodes, RawCodes)> {
            Ok((
                RawCodes::Linear(images.to_owned()),
                RawCodes::Linear(texts.to_owned()),
            ))
        }

        fn encode_image(&self, images: &ArrayView2<f32>) -> TrainResult<RawCodes> {
            Ok(RawCodes::Linear(images.to_owned()))
        }

        fn encode_text(&self, texts: &ArrayView2<f32>) -> TrainResult<RawCodes> {
            Ok(RawCodes::Linear(texts.to_owned()))
        }

        fn backward(&mut self, _report: &crate::loss::LossReport) -> TrainResult<()> {
            Ok(())
        }

        fn state_bytes(&self) -> TrainResult<Vec<u8>> {
            Ok(vec![0xC0, 0xDE])
        }

        fn load_state(&mut self, bytes: &[u8]) -> TrainResult<()> {
            if bytes != [0xC0, 0xDE] {
                return Err(TrainError::Model("unexpected state".into()));
            }
            self.loaded = true;
            Ok(())
        }
    }

    struct ToyOptimizer {
        steps: usize,
        lr: f64,
    }

    impl Optimizer for ToyOptimizer {
        fn step(&mut self) {
            self.steps += 1;
        }
        fn learning_rates(&self) -> Vec<f64> {
            vec![self.lr]
        }
        fn on_epoch_end(&mut self, _epoch: usize) {
            self.lr *= 0.9;
        }
    }

    struct VecSource {
        batches: Vec<TrainBatch>,
        samples: usize,
    }

    impl BatchSource for VecSource {
        fn num_samples(&self) -> usize {
            self.samples
        }
        fn batches(&mut self) -> Box<dyn Iterator<Item = TrainBatch> + '_> {
            Box::new(self.batches.clone().into_iter())
        }
    }

    fn toy_source() -> VecSource {
        VecSource {
            samples: 2,
            batches: vec![TrainBatch {
                images: array![[0.9, -0.8], [-0.7, 0.6]],
                texts: array![[0.8, -0.9], [-0.6, 0.7]],
                labels: array![[1.0, 0.0], [0.0, 1.0]],
                indices: vec![0, 1],
            }],
        }
    }

    fn toy_config(save_dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            dataset: "toy".into(),
            save_dir: save_dir.to_path_buf(),
            similarity_function: DistanceKind::Cosine,
            loss_type: LossNorm::L1,
            hash_layer: HashLayerKind::Linear,
            output_dim: 2,
            epochs: 2,
            batch_size: 2,
            query_num: 2,
            train_num: 2,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_run_trains_validates_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let config = toy_config(dir.path());
        let mut session = TrainSession::new(config).unwrap();
        let mut model = ToyModel { loaded: false };
        let mut optimizer = ToyOptimizer { steps: 0, lr: 1e-4 };

        let mut train = toy_source();
        let mut query = toy_source();
        let mut retrieval = toy_source();
        let labels = array![[1.0, 0.0], [0.0, 1.0]];

        session
            .run(
                &mut model,
                &mut optimizer,
                &mut train,
                &mut query,
                &mut retrieval,
                &labels.view(),
                &labels.view(),
            )
            .unwrap();

        // One optimizer step per batch per epoch, lr decayed twice.
        assert_eq!(optimizer.steps, 2);
        assert!((optimizer.lr - 1e-4 * 0.81).abs() < 1e-12);
        assert_eq!(session.global_step(), 2);

        // Identical query/retrieval codes with matching labels: perfect mAP.
        assert!((session.best().map_i2t - 1.0).abs() < 1e-6);
        assert_eq!(session.best().epoch_i2t, Some(0));

        assert!(dir.path().join("checkpoint-epoch-1.bin").exists());
        assert!(dir.path().join("checkpoint-epoch-2.bin").exists());
        assert!(dir
            .path()
            .join("pr_curve")
            .join("2-ours-toy-i2t.json")
            .exists());
        assert!(dir
            .path()
            .join("pr_curve")
            .join("2-ours-toy-t2i.json")
            .exists());
    }

    #[test]
    fn test_encode_split_fills_buffers_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let session = TrainSession::new(toy_config(dir.path())).unwrap();
        let model = ToyModel { loaded: false };
        let mut source = toy_source();

        let (img, txt) = session.encode_split(&model, &mut source).unwrap();
        assert_eq!(img, array![[1.0, -1.0], [-1.0, 1.0]]);
        assert_eq!(txt, array![[1.0, -1.0], [-1.0, 1.0]]);
    }

    #[test]
    fn test_evaluate_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = TrainSession::new(toy_config(dir.path())).unwrap();
        let mut model = ToyModel { loaded: false };
        let mut query = toy_source();
        let mut retrieval = toy_source();
        let labels = array![[1.0, 0.0], [0.0, 1.0]];

        let result = session.evaluate(
            &mut model,
            &mut query,
            &mut retrieval,
            &labels.view(),
            &labels.view(),
        );
        assert!(matches!(
            result,
            Err(crate::error::CrosshashError::Train(
                TrainError::MissingCheckpoint
            ))
        ));
    }

    #[test]
    fn test_evaluate_loads_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("checkpoint-epoch-1.bin");
        std::fs::write(&checkpoint, [0xC0, 0xDE]).unwrap();

        let config = TrainConfig {
            pretrained: Some(checkpoint),
            ..toy_config(dir.path())
        };
        let mut session = TrainSession::new(config).unwrap();
        let mut model = ToyModel { loaded: false };
        let mut query = toy_source();
        let mut retrieval = toy_source();
        let labels = array![[1.0, 0.0], [0.0, 1.0]];

        let scores = session
            .evaluate(
                &mut model,
                &mut query,
                &mut retrieval,
                &labels.view(),
                &labels.view(),
            )
            .unwrap();
        assert!(model.loaded);
        assert!((scores.i2t - 1.0).abs() < 1e-6);
        assert!(dir
            .path()
            .join("pr_curve")
            .join("2-ours-toy-test.json")
            .exists());
    }
}
