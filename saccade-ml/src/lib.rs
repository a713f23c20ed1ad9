//! Classifier event source (`ml` mode).
//!
//! An alternative to the threshold detectors: dual-channel EOG windows are
//! reduced to a small feature vector and scored by a pre-trained linear
//! model loaded from a JSON blob at startup. Training happens offline,
//! outside this repository; here we only load and evaluate.

pub mod classifier;
pub mod features;

pub use classifier::{GestureClass, WindowClassifier};

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum MlError {
    #[error("classifier blob not found: {0}")]
    MissingModel(PathBuf),
    #[error("reading classifier blob {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing classifier blob {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("classifier blob is inconsistent: {0}")]
    ModelShape(String),
    #[error("classifier blob names unknown class `{0}`")]
    UnknownClass(String),
}
