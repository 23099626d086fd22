//! Crosshash Core - Cross-modal hashing training library.
//!
//! Crosshash trains models that map images and paired text captions to
//! compact ±1 hash codes, so semantically similar pairs land close together
//! in Hamming space for cross-modal retrieval.
//!
//! # Architecture
//!
//! The crate owns the training core and nothing else:
//!
//! ```text
//! features → HashModel (external) → raw codes → CompositeLoss → backward
//!                                  ↘ encode_hash → CodeBuffer → mAP
//! ```
//!
//! The encoders, optimizer internals, and data loading live behind the
//! [`HashModel`], [`Optimizer`], and [`BatchSource`] traits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crosshash_core::{TrainConfig, TrainSession};
//!
//! fn main() -> crosshash_core::Result<()> {
//!     let config = TrainConfig::load()?;
//!     let mut session = TrainSession::new(config)?;
//!     session.run(&mut model, &mut optimizer, &mut train, &mut query,
//!                 &mut retrieval, &q_labels.view(), &r_labels.view())?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod artifact;
pub mod config;
pub mod encoder;
pub mod error;
pub mod eval;
pub mod loss;
pub mod math;
pub mod neighbors;
pub mod session;
pub mod similarity;

// Re-exports for convenient access
pub use artifact::EvalArtifact;
pub use config::{DistanceKind, HashLayerKind, LossNorm, TrainConfig};
pub use encoder::{encode_hash, RawCodes};
pub use error::{ConfigError, CrosshashError, Result, TrainError, TrainResult};
pub use eval::{evaluate_directions, mean_average_precision, CodeBuffer, EvalScores};
pub use loss::{quantization_loss, CompositeLoss, LossReport, SimilarityLoss};
pub use neighbors::{calc_neighbors, identity_neighbors};
pub use session::{BatchSource, BestScores, HashModel, Optimizer, TrainBatch, TrainSession};
pub use similarity::{cosine_similarity, euclidean_similarity};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
