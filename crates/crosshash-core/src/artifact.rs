//! Persisted evaluation artifacts.
//!
//! On a new best validation score the session saves the full query/retrieval
//! code matrices and label matrices for both modalities, keyed by code
//! length, dataset name, and direction tag (e.g. `128-ours-or5k-i2t.json`).
//! Downstream tooling draws precision-recall curves from these files.

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Directory name under `save_dir` where artifacts land.
pub const ARTIFACT_DIR: &str = "pr_curve";

/// Full evaluation state: codes and labels for both modalities and splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalArtifact {
    pub q_img: Vec<Vec<f32>>,
    pub q_txt: Vec<Vec<f32>>,
    pub r_img: Vec<Vec<f32>>,
    pub r_txt: Vec<Vec<f32>>,
    pub q_l: Vec<Vec<f32>>,
    pub r_l: Vec<Vec<f32>>,
}

fn to_rows(m: &ArrayView2<f32>) -> Vec<Vec<f32>> {
    m.outer_iter().map(|row| row.to_vec()).collect()
}

fn from_rows(rows: &[Vec<f32>]) -> Array2<f32> {
    let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), ncols), flat)
        .unwrap_or_else(|_| Array2::zeros((0, ncols)))
}

impl EvalArtifact {
    #[allow(clippy::too_many_arguments)]
    pub fn from_matrices(
        q_img: &ArrayView2<f32>,
        q_txt: &ArrayView2<f32>,
        r_img: &ArrayView2<f32>,
        r_txt: &ArrayView2<f32>,
        q_l: &ArrayView2<f32>,
        r_l: &ArrayView2<f32>,
    ) -> Self {
        Self {
            q_img: to_rows(q_img),
            q_txt: to_rows(q_txt),
            r_img: to_rows(r_img),
            r_txt: to_rows(r_txt),
            q_l: to_rows(q_l),
            r_l: to_rows(r_l),
        }
    }

    /// Rebuild the six matrices for re-evaluation.
    pub fn matrices(
        &self,
    ) -> (
        Array2<f32>,
        Array2<f32>,
        Array2<f32>,
        Array2<f32>,
        Array2<f32>,
        Array2<f32>,
    ) {
        (
            from_rows(&self.q_img),
            from_rows(&self.q_txt),
            from_rows(&self.r_img),
            from_rows(&self.r_txt),
            from_rows(&self.q_l),
            from_rows(&self.r_l),
        )
    }

    /// Artifact file name: `<dim>-ours-<dataset>-<tag>.json`.
    pub fn file_name(output_dim: usize, dataset: &str, tag: &str) -> String {
        format!("{output_dim}-ours-{dataset}-{tag}.json")
    }

    /// Save as pretty JSON under `<save_dir>/pr_curve/`.
    ///
    /// Returns the written path.
    pub fn save(
        &self,
        save_dir: &Path,
        output_dim: usize,
        dataset: &str,
        tag: &str,
    ) -> Result<PathBuf> {
        let dir = save_dir.join(ARTIFACT_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(Self::file_name(output_dim, dataset, tag));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json.as_bytes())?;
        tracing::info!(path = %path.display(), "saved evaluation artifact");
        Ok(path)
    }

    /// Load a previously saved artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_file_name() {
        assert_eq!(
            EvalArtifact::file_name(128, "or5k", "i2t"),
            "128-ours-or5k-i2t.json"
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let codes = array![[1.0, -1.0], [-1.0, 1.0]];
        let labels = array![[1.0, 0.0], [0.0, 1.0]];
        let artifact = EvalArtifact::from_matrices(
            &codes.view(),
            &codes.view(),
            &codes.view(),
            &codes.view(),
            &labels.view(),
            &labels.view(),
        );

        let path = artifact.save(dir.path(), 2, "toy", "i2t").unwrap();
        assert!(path.ends_with("pr_curve/2-ours-toy-i2t.json"));

        let loaded = EvalArtifact::load(&path).unwrap();
        let (q_img, _, _, _, q_l, _) = loaded.matrices();
        assert_eq!(q_img, codes);
        assert_eq!(q_l, labels);
    }

    #[test]
    fn test_from_rows_empty() {
        let artifact = EvalArtifact {
            q_img: vec![],
            q_txt: vec![],
            r_img: vec![],
            r_txt: vec![],
            q_l: vec![],
            r_l: vec![],
        };
        let (q_img, ..) = artifact.matrices();
        assert_eq!(q_img.nrows(), 0);
    }
}
