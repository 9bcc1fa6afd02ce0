use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::extractors::JsonBody;
use crate::response::AppError;
use crate::state::{AppState, ConnectionSlot};
use crate::vision::{VisionEngine, VisionResult};

/// Client frame: a base64 encoded image (JPEG from the browser webcam).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInput {
    pub jpeg_b64: String,
}

/// One message arriving on a streaming session.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// JSON text carrying a [`FrameInput`].
    Json(String),
    /// Encoded image bytes sent directly as a binary message.
    Raw(Vec<u8>),
}

#[derive(Debug, Serialize)]
pub struct StreamError {
    pub code: String,
    pub message: String,
}

/// Per-frame reply. A failed frame gets an error reply; the session goes on.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamReply {
    Result(VisionResult),
    Error { error: StreamError },
}

impl StreamReply {
    fn from_error(err: AppError) -> Self {
        let message = if err.is_operational {
            err.message
        } else {
            "服务器内部错误".to_string()
        };
        StreamReply::Error {
            error: StreamError {
                code: err.code,
                message,
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"error":{"code":"INTERNAL_ERROR","message":"serialization failed"}}"#.to_string()
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/frame", post(analyze_frame))
        .route("/ws", get(vision_ws))
}

pub async fn analyze_frame(
    State(state): State<AppState>,
    body: Result<JsonBody<FrameInput>, AppError>,
) -> Result<Json<VisionResult>, AppError> {
    // 请求体无效（格式错误或超限）同样计为被拒绝的帧
    let JsonBody(frame) = body.inspect_err(|_| state.engine().metrics().record_rejected())?;
    let result = state.engine().classify_base64(&frame.jpeg_b64).await?;
    Ok(Json(result))
}

pub async fn vision_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let slot = state
        .try_acquire_ws_slot()
        .ok_or_else(|| AppError::too_many_requests("Too many streaming connections"))?;

    // 超过上限的消息由协议层拒绝并关闭连接
    let limit = state.config().limits.max_frame_bytes;
    Ok(ws
        .max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state, slot)))
}

async fn classify_inbound(engine: &VisionEngine, frame: InboundFrame) -> StreamReply {
    let outcome = match frame {
        InboundFrame::Raw(bytes) => engine.classify(bytes).await.map_err(AppError::from),
        InboundFrame::Json(text) => match serde_json::from_str::<FrameInput>(&text) {
            Ok(input) => engine
                .classify_base64(&input.jpeg_b64)
                .await
                .map_err(AppError::from),
            Err(e) => {
                tracing::debug!(error = %e, "Invalid streaming frame message");
                engine.metrics().record_rejected();
                Err(AppError::bad_request("INVALID_REQUEST_BODY", "请求体格式无效"))
            }
        },
    };

    match outcome {
        Ok(result) => StreamReply::Result(result),
        Err(err) => {
            tracing::warn!(code = %err.code, error = %err.message, "Streaming frame failed");
            StreamReply::from_error(err)
        }
    }
}

/// One reply per inbound frame, in order, one frame in flight at a time.
pub fn frame_replies<'a, S>(
    engine: &'a VisionEngine,
    inbound: S,
) -> impl Stream<Item = StreamReply> + 'a
where
    S: Stream<Item = InboundFrame> + 'a,
{
    async_stream::stream! {
        let mut inbound = Box::pin(inbound);
        while let Some(frame) = inbound.next().await {
            yield classify_inbound(engine, frame).await;
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, _slot: ConnectionSlot) {
    let (mut sender, mut receiver) = socket.split();
    let mut shutdown_rx = state.shutdown_rx();
    tracing::info!(connections = state.ws_connections(), "Vision stream connected");

    let inbound = async_stream::stream! {
        loop {
            let next = tokio::select! {
                msg = receiver.next() => msg,
                _ = shutdown_rx.recv() => None,
            };
            match next {
                Some(Ok(Message::Text(text))) => yield InboundFrame::Json(text),
                Some(Ok(Message::Binary(data))) => yield InboundFrame::Raw(data),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Vision stream receive failed");
                    break;
                }
            }
        }
    };

    let replies = frame_replies(state.engine(), inbound);
    futures::pin_mut!(replies);
    while let Some(reply) = replies.next().await {
        if sender.send(Message::Text(reply.to_json())).await.is_err() {
            // 客户端已断开，丢弃已计算的结果
            tracing::debug!("Vision stream client gone, dropping result");
            break;
        }
    }

    let _ = sender.close().await;
    tracing::info!("Vision stream disconnected");
}
