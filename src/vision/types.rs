use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LABELS, NO_FACE_STATUS};

/// 归一化关键点，坐标相对图像宽高位于 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 单张人脸的关键点集合，下标即 face mesh 顶点编号
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }
}

/// 分类器输入：按选中顺序交错排列的 (x, y) 偏移
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    Open,
    Closed,
    Yawning,
    /// Labels declared by a model file beyond the built-in three.
    Other(String),
}

impl ClassLabel {
    pub fn as_str(&self) -> &str {
        match self {
            ClassLabel::Open => "Open",
            ClassLabel::Closed => "Closed",
            ClassLabel::Yawning => "Yawning",
            ClassLabel::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "Open" => ClassLabel::Open,
            "Closed" => ClassLabel::Closed,
            "Yawning" => ClassLabel::Yawning,
            other => ClassLabel::Other(other.to_string()),
        }
    }

    pub fn default_table() -> Vec<ClassLabel> {
        DEFAULT_LABELS.iter().map(|name| Self::from_name(name)).collect()
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClassLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClassLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// 像素坐标边界框，不裁剪到图像范围内，可能为负或越界
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Sole observable output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionResult {
    pub status: String,
    pub bbox: Option<BoundingBox>,
}

impl VisionResult {
    pub fn no_face() -> Self {
        Self {
            status: NO_FACE_STATUS.to_string(),
            bbox: None,
        }
    }

    pub fn detected(label: &ClassLabel, bbox: BoundingBox) -> Self {
        Self {
            status: label.as_str().to_string(),
            bbox: Some(bbox),
        }
    }

    pub fn has_face(&self) -> bool {
        self.bbox.is_some()
    }
}
