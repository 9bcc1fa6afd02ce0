use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};

use drowsiness_vision::constants::{REFINED_MESH_POINTS, SELECTED_INDICES};
use drowsiness_vision::vision::{Landmark, LandmarkSet};

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

/// 测试帧的左上角像素决定脚本化检测器的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Empty,
    EyesOpen,
    EyesClosed,
}

impl Scene {
    fn marker(self) -> Rgb<u8> {
        match self {
            Scene::Empty => Rgb([0, 0, 0]),
            Scene::EyesOpen => Rgb([0, 255, 0]),
            Scene::EyesClosed => Rgb([255, 0, 0]),
        }
    }

    pub fn from_frame(frame: &RgbImage) -> Self {
        let Rgb([r, g, _]) = *frame.get_pixel(0, 0);
        if r > 128 {
            Scene::EyesClosed
        } else if g > 128 {
            Scene::EyesOpen
        } else {
            Scene::Empty
        }
    }
}

pub fn png_frame(scene: Scene) -> Vec<u8> {
    let mut img = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);
    img.put_pixel(0, 0, scene.marker());
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    buf.into_inner()
}

pub fn b64_frame(scene: Scene) -> String {
    STANDARD.encode(png_frame(scene))
}

/// 选中关键点的范围固定为 (0.3, 0.2)-(0.6, 0.5)，其余点放在远处，
/// 用于确认只有选中的点影响边界框。
///
/// 第一个眼部点位于最小角时特征 0 为 0（闭眼），
/// 位于最大角时为 0.3（睁眼）。
pub fn face_mesh(eyes_open: bool) -> LandmarkSet {
    let (first, second) = if eyes_open {
        (Landmark::new(0.6, 0.5), Landmark::new(0.3, 0.2))
    } else {
        (Landmark::new(0.3, 0.2), Landmark::new(0.6, 0.5))
    };

    let mut points = vec![Landmark::new(0.95, 0.95); REFINED_MESH_POINTS];
    for (rank, &idx) in SELECTED_INDICES.iter().enumerate() {
        points[idx] = match rank {
            0 => first,
            1 => second,
            _ => Landmark::new(0.45, 0.35),
        };
    }
    LandmarkSet::new(points)
}

/// 特征 0 不超过 0.1 判为 Closed，否则 Open
pub fn model_json() -> String {
    serde_json::json!({
        "format_version": 1,
        "input_dim": 66,
        "labels": ["Open", "Closed", "Yawning"],
        "model": {
            "kind": "random_forest",
            "trees": [
                { "nodes": [
                    { "split": { "feature": 0, "threshold": 0.1, "left": 1, "right": 2 } },
                    { "leaf": { "value": [0.0, 5.0, 1.0] } },
                    { "leaf": { "value": [7.0, 1.0, 0.0] } }
                ]}
            ]
        }
    })
    .to_string()
}
