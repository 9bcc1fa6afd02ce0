//! 帧 → 眼部/嘴部状态分类流水线
//!
//! decode → landmark detection → feature extraction → classification,
//! with the bounding box derived from the same landmark selection.

pub mod bbox;
pub mod classifier;
pub mod decoder;
pub mod detector;
pub mod engine;
pub mod error;
pub mod features;
pub mod metrics;
pub mod pipeline;
pub mod types;

pub use classifier::{Classifier, ModelClassifier};
pub use detector::{DetectorConfig, LandmarkDetector};
pub use engine::VisionEngine;
pub use error::{ClassifierError, DecodeError, VisionError};
pub use pipeline::VisionPipeline;
pub use types::{BoundingBox, ClassLabel, FeatureVector, Landmark, LandmarkSet, VisionResult};
