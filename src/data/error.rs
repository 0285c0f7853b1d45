// ============================================================
// Layer 4 — Data Errors
// ============================================================
// Everything that can go wrong between opening the dataset file
// and handing a batch to the training thread. All variants are
// fatal: the loop has no retry path.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read dataset '{path}': {source}")]
    Open {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset '{path}' is not a valid safetensors file: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("dataset is missing tensor '{key}'")]
    MissingTensor { key: String },

    #[error("tensor '{key}' is unusable: {reason}")]
    BadTensor { key: String, reason: String },

    #[error("noisy {noisy:?} and clean {clean:?} volumes differ in shape")]
    ShapeMismatch { noisy: [usize; 3], clean: [usize; 3] },

    #[error("crop size {crop} exceeds slice dimensions {height}x{width}")]
    CropTooLarge { crop: usize, height: usize, width: usize },

    #[error("input depth {depth} exceeds the {slices} available slices")]
    DepthTooLarge { depth: usize, slices: usize },

    #[error("invalid sampler setting: {0}")]
    InvalidSetting(String),

    #[cfg(test)]
    #[error("prefetch queue is full")]
    QueueFull,

    #[error("batch consumer has gone away")]
    ConsumerGone,

    #[error("batch producer terminated")]
    ProducerGone,

    #[error("no batch produced within {0:?}")]
    ProducerStalled(Duration),

    #[error("cannot start batch producer thread: {0}")]
    Spawn(#[source] std::io::Error),
}
