//! Landmark detector contract.
//!
//! The detector is an opaque collaborator: given an RGB raster it returns zero
//! or more landmark sets in normalized coordinates. Instances are not assumed
//! to be thread-safe, so `detect` takes `&mut self` and the engine gives each
//! worker its own instance.

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::FaceMeshDetector;

use image::RgbImage;

use crate::constants::DEFAULT_MIN_DETECTION_CONFIDENCE;

use super::error::VisionError;
use super::types::LandmarkSet;

pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<LandmarkSet>, VisionError>;
}

impl<F> LandmarkDetector for F
where
    F: FnMut(&RgbImage) -> Result<Vec<LandmarkSet>, VisionError> + Send,
{
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<LandmarkSet>, VisionError> {
        self(frame)
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub max_faces: usize,
    /// Adds the iris refinement points (478-point topology).
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub face_detector_model: String,
    pub face_mesh_model: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            face_detector_model: "./models/face_detection.onnx".to_string(),
            face_mesh_model: "./models/face_mesh.onnx".to_string(),
        }
    }
}

/// Build the detector backend compiled into this binary.
#[cfg(feature = "onnx")]
pub fn build_detector(config: &DetectorConfig) -> Result<Box<dyn LandmarkDetector>, VisionError> {
    Ok(Box::new(FaceMeshDetector::new(config)?))
}

#[cfg(not(feature = "onnx"))]
pub fn build_detector(_config: &DetectorConfig) -> Result<Box<dyn LandmarkDetector>, VisionError> {
    Err(VisionError::Detector(
        "no landmark backend compiled in; rebuild with `--features onnx`".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::types::Landmark;

    #[test]
    fn closures_act_as_detectors() {
        let mut calls = 0;
        let mut detector = |_: &RgbImage| {
            calls += 1;
            Ok::<_, VisionError>(vec![LandmarkSet::new(vec![Landmark::new(0.5, 0.5)])])
        };
        let frame = RgbImage::new(2, 2);
        let faces = LandmarkDetector::detect(&mut detector, &frame).unwrap();
        assert_eq!(faces.len(), 1);
        drop(detector);
        assert_eq!(calls, 1);
    }

    #[test]
    fn default_config_is_single_face_refined() {
        let cfg = DetectorConfig::default();
        assert_eq!(cfg.max_faces, 1);
        assert!(cfg.refine_landmarks);
        assert_eq!(cfg.min_detection_confidence, 0.5);
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn missing_backend_is_reported() {
        let err = build_detector(&DetectorConfig::default()).err().unwrap();
        assert!(err.to_string().contains("onnx"));
    }
}
