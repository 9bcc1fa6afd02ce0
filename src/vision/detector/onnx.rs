//! Face-mesh backend on ONNX Runtime.
//!
//! Two stages: an UltraFace box detector (320×240 input) finds face regions,
//! then each padded crop goes through the 192×192 face-mesh regressor.
//! Mesh output is in crop pixels and is mapped back to frame-normalized
//! coordinates.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::constants::{MESH_POINTS, REFINED_MESH_POINTS};
use crate::vision::error::VisionError;
use crate::vision::types::{Landmark, LandmarkSet};

use super::{DetectorConfig, LandmarkDetector};

const DET_W: u32 = 320;
const DET_H: u32 = 240;
const MESH_SIZE: u32 = 192;
/// 裁剪框相对人脸框的外扩比例
const ROI_PADDING: f32 = 0.25;
const NMS_IOU: f32 = 0.3;

#[derive(Debug, Clone, Copy)]
struct FaceBox {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    score: f32,
}

impl FaceBox {
    fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.w * self.h + other.w * other.h - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

pub struct FaceMeshDetector {
    box_session: Session,
    mesh_session: Session,
    anchors: Vec<(f32, f32, f32, f32)>,
    config: DetectorConfig,
}

fn ort_err(e: ort::Error) -> VisionError {
    VisionError::Detector(e.to_string())
}

fn open_session(path: &str) -> Result<Session, VisionError> {
    Session::builder()
        .map_err(ort_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(ort_err)?
        .with_intra_threads(1)
        .map_err(ort_err)?
        .commit_from_file(path)
        .map_err(|e| VisionError::Detector(format!("failed to load {path}: {e}")))
}

impl FaceMeshDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self, VisionError> {
        let box_session = open_session(&config.face_detector_model)?;
        let mesh_session = open_session(&config.face_mesh_model)?;
        tracing::info!(
            detector = %config.face_detector_model,
            mesh = %config.face_mesh_model,
            refine = config.refine_landmarks,
            "Face mesh detector loaded"
        );
        Ok(Self {
            box_session,
            mesh_session,
            anchors: generate_anchors(DET_W as usize, DET_H as usize),
            config: config.clone(),
        })
    }

    fn detect_boxes(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>, VisionError> {
        let resized = imageops::resize(frame, DET_W, DET_H, FilterType::Triangle);

        // NCHW, (p - 127) / 128
        let plane = (DET_W * DET_H) as usize;
        let mut input = vec![0.0f32; 3 * plane];
        for (x, y, p) in resized.enumerate_pixels() {
            let i = (y * DET_W + x) as usize;
            for c in 0..3 {
                input[c * plane + i] = (f32::from(p[c]) - 127.0) / 128.0;
            }
        }

        let tensor = Tensor::from_array((vec![1, 3, DET_H as i64, DET_W as i64], input))
            .map_err(ort_err)?;
        let outputs = self.box_session.run(ort::inputs![tensor]).map_err(ort_err)?;
        let (_, scores) = outputs["scores"]
            .try_extract_tensor::<f32>()
            .map_err(ort_err)?;
        let (_, boxes) = outputs["boxes"].try_extract_tensor::<f32>().map_err(ort_err)?;

        let sx = frame.width() as f32;
        let sy = frame.height() as f32;
        let mut candidates: Vec<FaceBox> = self
            .anchors
            .iter()
            .enumerate()
            .filter_map(|(i, &(ax, ay, aw, ah))| {
                let score = *scores.get(i * 2 + 1)?;
                if score < self.config.min_detection_confidence {
                    return None;
                }
                let enc = boxes.get(i * 4..i * 4 + 4)?;
                let cx = enc[0] * 0.1 * aw + ax;
                let cy = enc[1] * 0.1 * ah + ay;
                let w = (enc[2] * 0.2).exp() * aw;
                let h = (enc[3] * 0.2).exp() * ah;
                Some(FaceBox {
                    x: (cx - w / 2.0) * sx,
                    y: (cy - h / 2.0) * sy,
                    w: w * sx,
                    h: h * sy,
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        let mut kept: Vec<FaceBox> = Vec::new();
        for candidate in candidates {
            if kept.len() >= self.config.max_faces {
                break;
            }
            if kept.iter().all(|k| k.iou(&candidate) < NMS_IOU) {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }

    fn mesh_for(
        &mut self,
        frame: &RgbImage,
        face: &FaceBox,
    ) -> Result<Option<LandmarkSet>, VisionError> {
        let (fw, fh) = (frame.width() as f32, frame.height() as f32);
        let x = (face.x - face.w * ROI_PADDING / 2.0).max(0.0);
        let y = (face.y - face.h * ROI_PADDING / 2.0).max(0.0);
        let w = (face.w * (1.0 + ROI_PADDING)).min(fw - x);
        let h = (face.h * (1.0 + ROI_PADDING)).min(fh - y);
        if w < 1.0 || h < 1.0 {
            return Ok(None);
        }

        let crop = imageops::crop_imm(frame, x as u32, y as u32, w as u32, h as u32).to_image();
        let resized = imageops::resize(&crop, MESH_SIZE, MESH_SIZE, FilterType::Triangle);

        // NHWC, [-1, 1]
        let mut input = Vec::with_capacity((MESH_SIZE * MESH_SIZE * 3) as usize);
        for p in resized.pixels() {
            for c in 0..3 {
                input.push(f32::from(p[c]) / 127.5 - 1.0);
            }
        }

        let tensor = Tensor::from_array((
            vec![1, MESH_SIZE as i64, MESH_SIZE as i64, 3],
            input,
        ))
        .map_err(ort_err)?;
        let outputs = self.mesh_session.run(ort::inputs![tensor]).map_err(ort_err)?;
        let (_, coords) = outputs[0].try_extract_tensor::<f32>().map_err(ort_err)?;

        // Face presence logit, when the model exports one.
        if outputs.len() > 1 {
            let (_, presence) = outputs[1].try_extract_tensor::<f32>().map_err(ort_err)?;
            if let Some(&logit) = presence.first() {
                let score = 1.0 / (1.0 + (-logit).exp());
                if score < self.config.min_detection_confidence {
                    return Ok(None);
                }
            }
        }

        let wanted = if self.config.refine_landmarks && coords.len() >= REFINED_MESH_POINTS * 3 {
            REFINED_MESH_POINTS
        } else {
            MESH_POINTS
        };
        if coords.len() < wanted * 3 {
            return Err(VisionError::Detector(format!(
                "face mesh produced {} values, expected at least {}",
                coords.len(),
                wanted * 3
            )));
        }

        let (scale_x, scale_y) = (w / MESH_SIZE as f32, h / MESH_SIZE as f32);
        let points = coords
            .chunks_exact(3)
            .take(wanted)
            .map(|c| {
                Landmark::new(
                    f64::from((x + c[0] * scale_x) / fw),
                    f64::from((y + c[1] * scale_y) / fh),
                )
            })
            .collect();
        Ok(Some(LandmarkSet::new(points)))
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<LandmarkSet>, VisionError> {
        let faces = self.detect_boxes(frame)?;
        let mut sets = Vec::with_capacity(faces.len());
        for face in &faces {
            if let Some(set) = self.mesh_for(frame, face)? {
                sets.push(set);
            }
        }
        Ok(sets)
    }
}

/// UltraFace prior boxes, normalized (cx, cy, w, h).
fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkage_list = [8usize, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];
    let (w, h) = (width as f32, height as f32);
    let mut anchors = Vec::new();

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let s = shrinkage as f32;
        let feature_h = (h / s).ceil() as usize;
        let feature_w = (w / s).ceil() as usize;
        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * s + s / 2.0) / w;
                let cy = (v as f32 * s + s / 2.0) / h;
                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}
