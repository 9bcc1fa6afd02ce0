/// 眼部关键点索引（左眼 8 个 + 右眼 8 个），顺序必须与分类器训练时一致
pub const EYE_INDICES: [usize; 16] = [
    33, 133, 160, 159, 158, 157, 173, 246, //
    362, 263, 387, 386, 385, 384, 398, 466,
];

/// 嘴部关键点索引（内唇轮廓），顺序必须与分类器训练时一致
pub const MOUTH_INDICES: [usize; 17] = [
    78, 95, 88, 178, 87, 14, 317, 402, //
    318, 324, 308, 415, 310, 311, 312, 13, 82,
];

/// 选中的关键点：眼部在前、嘴部在后
pub const SELECTED_INDICES: [usize; EYE_INDICES.len() + MOUTH_INDICES.len()] = {
    let mut out = [0usize; EYE_INDICES.len() + MOUTH_INDICES.len()];
    let mut i = 0;
    while i < EYE_INDICES.len() {
        out[i] = EYE_INDICES[i];
        i += 1;
    }
    let mut j = 0;
    while j < MOUTH_INDICES.len() {
        out[EYE_INDICES.len() + j] = MOUTH_INDICES[j];
        j += 1;
    }
    out
};

/// 特征向量长度：每个关键点贡献 (x, y) 两个值
pub const FEATURE_LEN: usize = SELECTED_INDICES.len() * 2;

/// 边界框在每一侧向外扩展的像素数
pub const BBOX_MARGIN_PX: i32 = 10;

/// 未检测到人脸时的状态文本
pub const NO_FACE_STATUS: &str = "No face";

/// Face mesh 基础拓扑点数
pub const MESH_POINTS: usize = 468;

/// 启用虹膜细化后的点数
pub const REFINED_MESH_POINTS: usize = 478;

/// 默认最小检测置信度
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.5;

/// 模型文件格式版本
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// 默认类别表：0 睁眼，1 闭眼，2 打哈欠
pub const DEFAULT_LABELS: [&str; 3] = ["Open", "Closed", "Yawning"];
