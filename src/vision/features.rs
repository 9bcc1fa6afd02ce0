//! 几何特征提取
//!
//! 按固定顺序取出眼部与嘴部关键点，减去各自坐标轴上的最小值，
//! 得到只对平移不变的特征向量（不做尺度、旋转归一化）。
//! 索引顺序与归一化方式必须与训练分类器时完全一致，
//! 否则分类结果会静默出错而不是报错。

use super::error::VisionError;
use super::types::{FeatureVector, Landmark, LandmarkSet};

/// 选中关键点在各坐标轴上的极值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extents {
    pub fn of(points: &[Landmark]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(points[1..].iter().fold(init, |acc, p| Self {
            min_x: acc.min_x.min(p.x),
            min_y: acc.min_y.min(p.y),
            max_x: acc.max_x.max(p.x),
            max_y: acc.max_y.max(p.y),
        }))
    }
}

/// 按索引顺序取出关键点
pub fn select_landmarks(
    landmarks: &LandmarkSet,
    indices: &[usize],
) -> Result<Vec<Landmark>, VisionError> {
    if indices.is_empty() {
        return Err(VisionError::EmptySelection);
    }
    indices
        .iter()
        .map(|&index| {
            landmarks.get(index).ok_or(VisionError::MissingLandmark {
                index,
                available: landmarks.len(),
            })
        })
        .collect()
}

/// 计算特征向量：`[x0 - min_x, y0 - min_y, x1 - min_x, y1 - min_y, ...]`
pub fn extract_features(
    landmarks: &LandmarkSet,
    indices: &[usize],
) -> Result<FeatureVector, VisionError> {
    let selected = select_landmarks(landmarks, indices)?;
    Ok(features_from_selection(&selected))
}

pub(crate) fn features_from_selection(selected: &[Landmark]) -> FeatureVector {
    let Some(extents) = Extents::of(selected) else {
        return FeatureVector::new(Vec::new());
    };

    let mut values = Vec::with_capacity(selected.len() * 2);
    for p in selected {
        values.push(p.x - extents.min_x);
        values.push(p.y - extents.min_y);
    }
    FeatureVector::new(values)
}
