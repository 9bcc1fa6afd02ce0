use thiserror::Error;

/// Malformed frame payload. Recoverable: reported to the caller, never fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame payload is empty")]
    Empty,
    #[error("frame payload is not valid base64: {0}")]
    Base64(String),
    #[error("failed to decode image: {0}")]
    Image(String),
    #[error("image dimensions are zero")]
    ZeroDimensions,
}

/// Model/configuration mismatch. Expected to surface at startup, not per request.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to read model file {path}: {message}")]
    Load { path: String, message: String },
    #[error("model file is not valid: {0}")]
    InvalidModel(String),
    #[error("unsupported model format version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("feature dimension mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("class id {0} has no label")]
    UnknownClass(usize),
}

#[derive(Debug, Error)]
pub enum VisionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("landmark detector failed: {0}")]
    Detector(String),
    #[error("landmark set has {available} points, index {index} is out of range")]
    MissingLandmark { index: usize, available: usize },
    #[error("landmark index selection is empty")]
    EmptySelection,
    #[error("vision worker pool is closed")]
    PoolClosed,
    #[error("vision worker failed: {0}")]
    Worker(String),
}

impl VisionError {
    pub fn code(&self) -> &'static str {
        match self {
            VisionError::Decode(_) => "DECODE_ERROR",
            VisionError::Classifier(_) => "CLASSIFIER_ERROR",
            VisionError::Detector(_) | VisionError::MissingLandmark { .. } => "DETECTOR_ERROR",
            VisionError::EmptySelection => "CONFIG_ERROR",
            VisionError::PoolClosed => "UNAVAILABLE",
            VisionError::Worker(_) => "INTERNAL_ERROR",
        }
    }

    /// Only malformed input is the caller's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, VisionError::Decode(_))
    }
}
