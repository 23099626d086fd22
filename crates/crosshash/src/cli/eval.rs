//! The `crosshash eval` command for scoring retrieval quality.
//!
//! Two modes: re-score a saved evaluation artifact, or run a checkpointed
//! model over a feature file.

use std::path::PathBuf;

use clap::Args;
use crosshash_core::{evaluate_directions, EvalArtifact, EvalScores, TrainConfig, TrainSession};

use crate::baseline::RandomProjectionModel;
use crate::dataset::FeatureDataset;

/// Arguments for the `eval` command.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Saved evaluation artifact to re-score
    #[arg(long, conflicts_with = "features")]
    pub artifact: Option<PathBuf>,

    /// Paired feature file to encode with a checkpointed model
    #[arg(required_unless_present = "artifact")]
    pub features: Option<PathBuf>,

    /// Model checkpoint to load (required with a feature file)
    #[arg(long, requires = "features")]
    pub pretrained: Option<PathBuf>,

    /// Config file (defaults to the standard config path)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Truncate each ranking to the top K retrieved samples
    #[arg(long)]
    pub top_k: Option<usize>,
}

/// Execute the eval command.
pub fn execute(args: EvalArgs) -> anyhow::Result<()> {
    let scores = match (&args.artifact, &args.features) {
        (Some(artifact), _) => score_artifact(artifact, args.top_k)?,
        (None, Some(features)) => score_checkpoint(&args, features)?,
        (None, None) => anyhow::bail!("pass either --artifact or a feature file"),
    };
    print_scores(&scores);
    Ok(())
}

/// Recompute all four mAP directions from a saved artifact.
fn score_artifact(path: &PathBuf, top_k: Option<usize>) -> anyhow::Result<EvalScores> {
    let artifact = EvalArtifact::load(path)?;
    let (q_img, q_txt, r_img, r_txt, q_l, r_l) = artifact.matrices();
    let scores = evaluate_directions(
        &q_img.view(),
        &q_txt.view(),
        &r_img.view(),
        &r_txt.view(),
        &q_l.view(),
        &r_l.view(),
        top_k,
    )?;
    tracing::info!(path = %path.display(), "re-scored artifact");
    Ok(scores)
}

/// Encode a feature file with a checkpointed model and score it.
fn score_checkpoint(args: &EvalArgs, features: &PathBuf) -> anyhow::Result<EvalScores> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::load_from(path)?,
        None => TrainConfig::load()?,
    };
    if args.pretrained.is_some() {
        config.pretrained = args.pretrained.clone();
    }

    let dataset = FeatureDataset::load(features)?;
    let (_, mut query, mut retrieval) = dataset.split(
        config.query_num,
        config.train_num,
        config.seed,
        config.batch_size,
        false,
    )?;
    let query_labels = query.labels();
    let retrieval_labels = retrieval.labels();

    let mut model =
        RandomProjectionModel::new(&config, dataset.image_dim(), dataset.text_dim(), config.seed);

    let mut session = TrainSession::new(config)?;
    let scores = session.evaluate(
        &mut model,
        &mut query,
        &mut retrieval,
        &query_labels.view(),
        &retrieval_labels.view(),
    )?;
    Ok(scores)
}

fn print_scores(scores: &EvalScores) {
    println!("mAP i->t: {:.4}", scores.i2t);
    println!("mAP t->i: {:.4}", scores.t2i);
    println!("mAP i->i: {:.4}", scores.i2i);
    println!("mAP t->t: {:.4}", scores.t2t);
}
