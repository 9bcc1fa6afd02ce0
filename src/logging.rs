use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    /// Emit stdout logs as JSON lines instead of the human format.
    pub json_stdout: bool,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_stdout: false,
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl From<&Config> for LogConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            json_stdout: crate::config::env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            enable_file_logs: config.enable_file_logs,
            log_dir: config.log_dir.clone(),
        }
    }
}

pub fn init_tracing(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = if config.json_stdout {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(false).boxed()
    };

    let registry = Registry::default().with(env_filter).with(stdout_layer);

    let result = if config.enable_file_logs {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("drowsiness-vision")
            .filename_suffix("log")
            .max_log_files(14)
            .build(&config.log_dir)
        {
            Ok(file_appender) => {
                let file_layer = fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .json();
                registry.with(file_layer).try_init()
            }
            Err(e) => panic!("Failed to create rolling file appender in {}: {e}", config.log_dir),
        }
    } else {
        registry.try_init()
    };

    // 全局 subscriber 已设置（如测试环境）属于正常情况，其余错误说明配置有误
    if let Err(e) = result {
        let msg = e.to_string();
        if !msg.contains("already been set") {
            panic!("Failed to initialize tracing: {e}");
        }
    }
}
