use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::DEFAULT_MIN_DETECTION_CONFIDENCE;
use crate::vision::DetectorConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub model_path: String,
    pub detector: DetectorConfig,
    pub vision: VisionConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// 独立 pipeline 实例数；1 表示所有帧串行处理
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub max_frame_bytes: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 64,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let limits = LimitsConfig::default();
        let detector = DetectorConfig::default();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 8000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            model_path: env_or("MODEL_PATH", "./models/classifier.json"),
            detector: DetectorConfig {
                min_detection_confidence: env_or_parse(
                    "MIN_DETECTION_CONFIDENCE",
                    DEFAULT_MIN_DETECTION_CONFIDENCE,
                ),
                face_detector_model: env_or("FACE_DETECTOR_MODEL", &detector.face_detector_model),
                face_mesh_model: env_or("FACE_MESH_MODEL", &detector.face_mesh_model),
                ..detector
            },
            vision: VisionConfig {
                workers: env_or_parse("VISION_WORKERS", 1_usize).max(1),
            },
            limits: LimitsConfig {
                max_ws_connections: env_or_parse("MAX_WS_CONNECTIONS", limits.max_ws_connections),
                max_frame_bytes: env_or_parse("MAX_FRAME_BYTES", limits.max_frame_bytes),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "CORS_ORIGIN",
            "MODEL_PATH",
            "MIN_DETECTION_CONFIDENCE",
            "VISION_WORKERS",
            "MAX_WS_CONNECTIONS",
            "ENABLE_FILE_LOGS",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.cors_origin, "*");
        assert_eq!(cfg.model_path, "./models/classifier.json");
        assert_eq!(cfg.vision.workers, 1);
        assert_eq!(cfg.detector.max_faces, 1);
        assert!(cfg.detector.refine_landmarks);
        assert_eq!(cfg.detector.min_detection_confidence, 0.5);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("VISION_WORKERS", "4");
        env::set_var("MIN_DETECTION_CONFIDENCE", "0.7");
        env::set_var("MAX_WS_CONNECTIONS", "8");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.vision.workers, 4);
        assert_eq!(cfg.detector.min_detection_confidence, 0.7);
        assert_eq!(cfg.limits.max_ws_connections, 8);
        clear_keys(managed_keys());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("VISION_WORKERS", "x");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.vision.workers, 1);
        clear_keys(managed_keys());
    }

    #[test]
    fn zero_workers_is_clamped() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("VISION_WORKERS", "0");
        env::set_var("ENABLE_FILE_LOGS", "yes");

        let cfg = Config::from_env();
        assert_eq!(cfg.vision.workers, 1);
        assert!(cfg.enable_file_logs);
        clear_keys(managed_keys());
    }
}
