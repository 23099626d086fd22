//! The `crosshash train` command for training a hashing model.

use std::path::PathBuf;

use clap::Args;
use crosshash_core::{
    BatchSource, DistanceKind, HashLayerKind, LossNorm, TrainBatch, TrainConfig, TrainSession,
};

use crate::baseline::{DecayLr, RandomProjectionModel};
use crate::dataset::FeatureDataset;

/// Arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Paired feature file (JSON with images/texts/labels)
    #[arg(required = true)]
    pub features: PathBuf,

    /// Config file (defaults to the standard config path)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset name used in artifact file names
    #[arg(long)]
    pub dataset: Option<String>,

    /// Directory for checkpoints and evaluation artifacts
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Hash code length in bits
    #[arg(long)]
    pub output_dim: Option<usize>,

    /// Number of training epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Mini-batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Similarity function: cosine or euclidean
    #[arg(long)]
    pub similarity_function: Option<DistanceKind>,

    /// Loss reduction norm: l1 or l2
    #[arg(long)]
    pub loss_type: Option<LossNorm>,

    /// Hash head kind: select or linear
    #[arg(long)]
    pub hash_layer: Option<HashLayerKind>,

    /// Number of query samples held out of retrieval
    #[arg(long)]
    pub query_num: Option<usize>,

    /// Number of retrieval samples used for training
    #[arg(long)]
    pub train_num: Option<usize>,

    /// Log the loss breakdown every N steps
    #[arg(long)]
    pub display_step: Option<u64>,

    /// Shuffle and weight-init seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Initial learning rate
    #[arg(long)]
    pub lr: Option<f64>,

    /// Euclidean distance ceiling factor
    #[arg(long)]
    pub vartheta: Option<f32>,

    /// Positive-pair cosine distance tolerance
    #[arg(long)]
    pub sim_threshold: Option<f32>,

    /// Train with identity supervision (each sample its own neighbor)
    #[arg(long)]
    pub identity_supervision: bool,
}

impl TrainArgs {
    /// Fold CLI overrides into a loaded configuration.
    fn apply(&self, config: &mut TrainConfig) {
        if let Some(dataset) = &self.dataset {
            config.dataset = dataset.clone();
        }
        if let Some(save_dir) = &self.save_dir {
            config.save_dir = save_dir.clone();
        }
        if let Some(output_dim) = self.output_dim {
            config.output_dim = output_dim;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(similarity_function) = self.similarity_function {
            config.similarity_function = similarity_function;
        }
        if let Some(loss_type) = self.loss_type {
            config.loss_type = loss_type;
        }
        if let Some(hash_layer) = self.hash_layer {
            config.hash_layer = hash_layer;
        }
        if let Some(query_num) = self.query_num {
            config.query_num = query_num;
        }
        if let Some(train_num) = self.train_num {
            config.train_num = train_num;
        }
        if let Some(display_step) = self.display_step {
            config.display_step = display_step;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(lr) = self.lr {
            config.lr = lr;
        }
        if let Some(vartheta) = self.vartheta {
            config.vartheta = vartheta;
        }
        if let Some(sim_threshold) = self.sim_threshold {
            config.sim_threshold = sim_threshold;
        }
    }
}

/// Execute the train command.
pub fn execute(args: TrainArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::load_from(path)?,
        None => TrainConfig::load()?,
    };
    args.apply(&mut config);

    let dataset = FeatureDataset::load(&args.features)?;
    let (train, mut query, mut retrieval) = dataset.split(
        config.query_num,
        config.train_num,
        config.seed,
        config.batch_size,
        args.identity_supervision,
    )?;
    let query_labels = query.labels();
    let retrieval_labels = retrieval.labels();

    let mut model =
        RandomProjectionModel::new(&config, dataset.image_dim(), dataset.text_dim(), config.seed);
    let mut optimizer = DecayLr::new(&config);
    let mut train = ProgressSource::new(train);

    let mut session = TrainSession::new(config)?;
    session.run(
        &mut model,
        &mut optimizer,
        &mut train,
        &mut query,
        &mut retrieval,
        &query_labels.view(),
        &retrieval_labels.view(),
    )?;

    let best = session.best();
    println!("best mAP i->t: {:.4} (epoch {})", best.map_i2t, display_epoch(best.epoch_i2t));
    println!("best mAP t->i: {:.4} (epoch {})", best.map_t2i, display_epoch(best.epoch_t2i));
    Ok(())
}

fn display_epoch(epoch: Option<usize>) -> String {
    match epoch {
        Some(e) => (e + 1).to_string(),
        None => "-".to_string(),
    }
}

/// Wraps a batch source with a progress bar that advances per batch.
struct ProgressSource<S> {
    inner: S,
    bar: indicatif::ProgressBar,
}

impl<S: BatchSource> ProgressSource<S> {
    fn new(inner: S) -> Self {
        let bar = create_progress_bar(inner.num_samples() as u64);
        Self { inner, bar }
    }
}

impl<S: BatchSource> BatchSource for ProgressSource<S> {
    fn num_samples(&self) -> usize {
        self.inner.num_samples()
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = TrainBatch> + '_> {
        self.bar.set_position(0);
        let bar = self.bar.clone();
        Box::new(self.inner.batches().map(move |batch| {
            bar.inc(batch.indices.len() as u64);
            batch
        }))
    }
}

/// Create a progress bar for the training split.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_message("training...");
    pb
}
