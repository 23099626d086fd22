//! Paired feature-file dataset: loading, splitting, and batching.
//!
//! The `train` command consumes a JSON feature file holding pre-extracted
//! image features, text features, and multi-hot labels, one row per sample:
//!
//! ```json
//! { "images": [[...]], "texts": [[...]], "labels": [[...]] }
//! ```
//!
//! The file is split with a seeded shuffle: the first `query_num` samples
//! become the query split, the remainder is the retrieval split, and the
//! first `train_num` retrieval samples form the train split.

use std::path::Path;

use anyhow::{bail, Context};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crosshash_core::{identity_neighbors, BatchSource, TrainBatch};

#[derive(Deserialize)]
struct FeatureFile {
    images: Vec<Vec<f32>>,
    texts: Vec<Vec<f32>>,
    labels: Vec<Vec<f32>>,
}

fn to_matrix(rows: &[Vec<f32>], name: &str) -> anyhow::Result<Array2<f32>> {
    let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
    if rows.iter().any(|r| r.len() != ncols) {
        bail!("ragged rows in {name}");
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((rows.len(), ncols), flat)?)
}

/// A loaded feature file: paired image/text features plus labels.
pub struct FeatureDataset {
    images: Array2<f32>,
    texts: Array2<f32>,
    labels: Array2<f32>,
}

impl FeatureDataset {
    /// Load and validate a feature file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feature file {}", path.display()))?;
        let file: FeatureFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse feature file {}", path.display()))?;

        let images = to_matrix(&file.images, "images")?;
        let texts = to_matrix(&file.texts, "texts")?;
        let labels = to_matrix(&file.labels, "labels")?;

        if images.nrows() != texts.nrows() || images.nrows() != labels.nrows() {
            bail!(
                "feature file rows disagree: {} images, {} texts, {} labels",
                images.nrows(),
                texts.nrows(),
                labels.nrows()
            );
        }
        if images.nrows() == 0 {
            bail!("feature file is empty");
        }

        tracing::info!(
            samples = images.nrows(),
            image_dim = images.ncols(),
            text_dim = texts.ncols(),
            categories = labels.ncols(),
            "loaded feature file"
        );
        Ok(Self {
            images,
            texts,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.images.nrows()
    }

    pub fn image_dim(&self) -> usize {
        self.images.ncols()
    }

    pub fn text_dim(&self) -> usize {
        self.texts.ncols()
    }

    /// Seeded query/retrieval/train split.
    ///
    /// Returns `(train, query, retrieval)` splits. The query cut must leave
    /// at least one retrieval sample behind; `train_num` is clamped to the
    /// retrieval split size.
    pub fn split(
        &self,
        query_num: usize,
        train_num: usize,
        seed: u64,
        batch_size: usize,
        identity_supervision: bool,
    ) -> anyhow::Result<(Split, Split, Split)> {
        if query_num == 0 {
            bail!("query_num must be > 0");
        }
        if query_num >= self.len() {
            bail!(
                "query_num {} leaves no retrieval samples (feature file has {})",
                query_num,
                self.len()
            );
        }

        let mut order: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let (query_idx, retrieval_idx) = order.split_at(query_num);
        let train_num = train_num.clamp(1, retrieval_idx.len());
        let train_idx = &retrieval_idx[..train_num];

        let query = self.subset(query_idx, batch_size, false);
        let retrieval = self.subset(retrieval_idx, batch_size, false);
        let train = self.subset(train_idx, batch_size, identity_supervision);

        tracing::info!(
            train = train.num_samples(),
            query = query.num_samples(),
            retrieval = retrieval.num_samples(),
            "split dataset"
        );
        Ok((train, query, retrieval))
    }

    fn subset(&self, indices: &[usize], batch_size: usize, identity_supervision: bool) -> Split {
        Split {
            images: self.images.select(Axis(0), indices),
            texts: self.texts.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            batch_size: batch_size.max(1),
            identity_supervision,
        }
    }
}

/// One split of the dataset, iterated in sequential mini-batches.
pub struct Split {
    images: Array2<f32>,
    texts: Array2<f32>,
    labels: Array2<f32>,
    batch_size: usize,
    /// Substitute identity supervision for single-label data
    identity_supervision: bool,
}

impl Split {
    /// Label matrix of the whole split (query/retrieval evaluation input).
    pub fn labels(&self) -> Array2<f32> {
        self.labels.clone()
    }
}

impl BatchSource for Split {
    fn num_samples(&self) -> usize {
        self.images.nrows()
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = TrainBatch> + '_> {
        let n = self.num_samples();
        let batch_size = self.batch_size;
        let starts: Vec<usize> = (0..n).step_by(batch_size).collect();
        let identity = self.identity_supervision;
        let images = &self.images;
        let texts = &self.texts;
        let labels = &self.labels;

        Box::new(starts.into_iter().map(move |start| {
            let end = (start + batch_size).min(n);
            let indices: Vec<usize> = (start..end).collect();
            let batch_labels = if identity {
                identity_neighbors(end - start)
            } else {
                labels.slice(ndarray::s![start..end, ..]).to_owned()
            };
            TrainBatch {
                images: images.slice(ndarray::s![start..end, ..]).to_owned(),
                texts: texts.slice(ndarray::s![start..end, ..]).to_owned(),
                labels: batch_labels,
                indices,
            }
        }))
    }
}
