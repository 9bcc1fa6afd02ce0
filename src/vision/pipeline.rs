use std::sync::Arc;

use image::RgbImage;

use crate::constants::SELECTED_INDICES;

use super::bbox::bbox_from_selection;
use super::classifier::Classifier;
use super::decoder::decode_frame;
use super::detector::LandmarkDetector;
use super::error::VisionError;
use super::features::{features_from_selection, select_landmarks};
use super::types::VisionResult;

/// Frame → classification orchestrator.
///
/// Owns one detector instance (not shareable) and a handle to the shared,
/// read-only classifier. Each call is independent of the previous one.
pub struct VisionPipeline {
    detector: Box<dyn LandmarkDetector>,
    classifier: Arc<dyn Classifier>,
    indices: Vec<usize>,
}

impl VisionPipeline {
    pub fn new(detector: Box<dyn LandmarkDetector>, classifier: Arc<dyn Classifier>) -> Self {
        Self::with_indices(detector, classifier, SELECTED_INDICES.to_vec())
    }

    pub fn with_indices(
        detector: Box<dyn LandmarkDetector>,
        classifier: Arc<dyn Classifier>,
        indices: Vec<usize>,
    ) -> Self {
        Self {
            detector,
            classifier,
            indices,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Decode, detect, and classify one encoded frame.
    ///
    /// "No face" is a normal result; decode and classifier faults propagate.
    pub fn classify(&mut self, encoded_frame: &[u8]) -> Result<VisionResult, VisionError> {
        let raster = decode_frame(encoded_frame)?;
        self.classify_raster(&raster)
    }

    pub fn classify_raster(&mut self, raster: &RgbImage) -> Result<VisionResult, VisionError> {
        let faces = self.detector.detect(raster)?;

        // 仅使用第一张人脸，其余丢弃
        let Some(face) = faces.first() else {
            return Ok(VisionResult::no_face());
        };
        if faces.len() > 1 {
            tracing::debug!(faces = faces.len(), "Multiple faces detected, using the first");
        }

        let selected = select_landmarks(face, &self.indices)?;
        let features = features_from_selection(&selected);
        let label = self.classifier.classify(&features)?;
        let bbox = bbox_from_selection(&selected, raster.width(), raster.height())
            .ok_or(VisionError::EmptySelection)?;

        Ok(VisionResult::detected(&label, bbox))
    }
}
