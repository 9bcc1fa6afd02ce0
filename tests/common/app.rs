use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use image::RgbImage;
use tokio::sync::broadcast;

use drowsiness_vision::config::{Config, LimitsConfig, VisionConfig};
use drowsiness_vision::routes::build_router;
use drowsiness_vision::state::AppState;
use drowsiness_vision::vision::{
    Classifier, DetectorConfig, LandmarkSet, ModelClassifier, VisionEngine, VisionError,
    VisionPipeline,
};

use super::fixtures::{face_mesh, model_json, Scene};

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub engine: Arc<VisionEngine>,
}

fn test_config(workers: usize, limits: LimitsConfig) -> Config {
    // 直接构造 Config，避免 set_var 在多线程测试中产生竞态
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 8000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "*".to_string(),
        model_path: "./models/classifier.json".to_string(),
        detector: DetectorConfig::default(),
        vision: VisionConfig { workers },
        limits,
    }
}

fn scripted_detector(frame: &RgbImage) -> Result<Vec<LandmarkSet>, VisionError> {
    Ok(match Scene::from_frame(frame) {
        Scene::Empty => Vec::new(),
        Scene::EyesOpen => vec![face_mesh(true)],
        Scene::EyesClosed => vec![face_mesh(false)],
    })
}

pub fn test_engine(workers: usize) -> Arc<VisionEngine> {
    let classifier: Arc<dyn Classifier> =
        Arc::new(ModelClassifier::from_json(&model_json()).expect("test model"));
    let engine = VisionEngine::build(workers, |_| {
        Ok(VisionPipeline::new(
            Box::new(scripted_detector),
            classifier.clone(),
        ))
    })
    .expect("build engine");
    Arc::new(engine)
}

pub async fn spawn_with_limits(limits: LimitsConfig) -> TestApp {
    let config = test_config(2, limits);
    let engine = test_engine(config.vision.workers);
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(engine.clone(), &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        engine,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with_limits(LimitsConfig::default()).await
}

/// Serve the router on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
