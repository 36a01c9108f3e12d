//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//!
//! # 约定
//!
//! - 启动阶段的里程碑（适配器、设备、交换链、上传）使用 `info`
//! - CPU 等待 GPU 的停顿使用 `debug`
//! - 每帧的记录、提交、呈现使用 `trace`
//! - 致命错误在 `main` 中以 `error` 记录
//!
//! # 使用示例
//!
//! ```no_run
//! use mesh_render::core::{config::LogLevel, log};
//!
//! log::init_logger(LogLevel::Info, false, None).unwrap();
//! tracing::info!(width = 1200, height = 900, "Window created");
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use std::path::Path;

use super::config::LogLevel;
use super::error::{MeshRenderError, Result};

const DEFAULT_LOG_FILE: &str = "mesh_render.log";

/// 初始化日志系统
///
/// 必须在程序开始时调用一次；重复调用返回 `MeshRenderError::Log`。
/// 设置了 `RUST_LOG` 环境变量时，以环境变量为准。
///
/// 控制台输出带线程名，可以区分主线程和无窗口设备的 GPU 线程。
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(true);

    let file_layer = if file_output {
        let path = Path::new(log_file_path.unwrap_or(DEFAULT_LOG_FILE));
        let directory = path.parent().unwrap_or(Path::new("."));
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);

        // 每天滚动
        let appender = RollingFileAppender::new(Rotation::DAILY, directory, filename);
        Some(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(appender),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MeshRenderError::Log(e.to_string()))
}

/// 默认过滤规则：winit 的事件循环日志只保留警告
fn filter_directive(level: LogLevel) -> String {
    let level = match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };
    format!("{},winit=warn", level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Debug), "debug,winit=warn");
        assert!(EnvFilter::try_new(filter_directive(LogLevel::Trace)).is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logger(LogLevel::Warn, false, None);
        assert!(matches!(
            init_logger(LogLevel::Warn, false, None),
            Err(MeshRenderError::Log(_))
        ));
    }
}
