use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::vision::VisionError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub is_operational: bool,
}

impl AppError {
    pub fn bad_request(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn too_many_requests(message: &str) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: "RATE_LIMITED".to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn payload_too_large(message: &str) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "PAYLOAD_TOO_LARGE".to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "UNAVAILABLE".to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn internal(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let exposed_message = if self.is_operational {
            self.message.clone()
        } else {
            "服务器内部错误".to_string()
        };

        if self.is_operational {
            tracing::warn!(
                status = %self.status,
                code = %self.code,
                error = %self.message,
                "API error"
            );
        } else {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                error = %self.message,
                "Internal API error"
            );
        }

        (
            self.status,
            Json(ErrorBody {
                success: false,
                code: self.code,
                message: exposed_message,
                trace_id: None,
            }),
        )
            .into_response()
    }
}

// VisionError 转换映射：
// - Decode -> 400（客户端输入问题，可安全暴露消息）
// - PoolClosed -> 503（服务正在关闭）
// - 其他 -> 500（模型/检测器故障，消息在 IntoResponse 中被替换）
impl From<VisionError> for AppError {
    fn from(value: VisionError) -> Self {
        match &value {
            VisionError::Decode(_) => AppError::bad_request(value.code(), &value.to_string()),
            VisionError::PoolClosed => AppError::service_unavailable(&value.to_string()),
            _ => AppError::internal(value.code(), &value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    use super::*;
    use crate::vision::{ClassifierError, DecodeError};

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let err: AppError = VisionError::Classifier(ClassifierError::DimensionMismatch {
            expected: 66,
            actual: 12,
        })
        .into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "CLASSIFIER_ERROR");
        assert_eq!(json["message"], "服务器内部错误");
    }

    #[tokio::test]
    async fn decode_error_keeps_message() {
        let err: AppError = VisionError::from(DecodeError::Empty).into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "DECODE_ERROR");
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let resp = AppError::from(VisionError::PoolClosed).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
