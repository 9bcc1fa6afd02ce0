use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use drowsiness_vision::config::Config;
use drowsiness_vision::constants::FEATURE_LEN;
use drowsiness_vision::logging::{init_tracing, LogConfig};
use drowsiness_vision::routes::build_router;
use drowsiness_vision::state::AppState;
use drowsiness_vision::vision::classifier::{self_check, Classifier};
use drowsiness_vision::vision::detector::build_detector;
use drowsiness_vision::vision::{ModelClassifier, VisionEngine, VisionPipeline};
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!("Starting drowsiness-vision");

    // 模型与检测器在启动时全部加载，任何失败都直接退出
    let classifier: Arc<dyn Classifier> = match ModelClassifier::load(&config.model_path) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            tracing::error!(
                error = %e,
                path = %config.model_path,
                "Failed to load classifier model"
            );
            std::process::exit(1);
        }
    };
    if let Err(e) = self_check(classifier.as_ref(), FEATURE_LEN) {
        tracing::error!(error = %e, "Classifier self-check failed");
        std::process::exit(1);
    }
    tracing::info!(
        path = %config.model_path,
        labels = classifier.labels().len(),
        "Classifier loaded"
    );

    let engine = match VisionEngine::build(config.vision.workers, |_| {
        build_detector(&config.detector)
            .map(|detector| VisionPipeline::new(detector, classifier.clone()))
    }) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build vision workers");
            std::process::exit(1);
        }
    };
    tracing::info!(workers = engine.size(), "Vision engine ready");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(engine.clone(), &config, shutdown_tx.clone());

    let cors_layer = match build_cors_layer(&config) {
        Ok(layer) => layer,
        Err(e) => {
            tracing::error!(error = %e, origin = %config.cors_origin, "Invalid CORS_ORIGIN");
            std::process::exit(1);
        }
    };

    let app = build_router(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Listening");

    let server_future = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()));

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    engine.close();
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let layer = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods(Any);

    if config.cors_origin.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = config.cors_origin.trim().parse::<HeaderValue>()?;
    Ok(layer.allow_origin(origin))
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    // 通知所有流式会话结束
    let _ = shutdown_tx.send(());
}
