//! 错误处理模块
//!
//! 定义了渲染器中使用的统一错误类型，使用 `thiserror` 提供友好的错误消息。
//!
//! # 设计原则
//!
//! - 使用 `thiserror` 自动实现 `Error` trait
//! - 图形 API 调用失败时保留原始 HRESULT
//! - 所有初始化与逐帧错误都是致命的，向上传播到 `main`

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, MeshRenderError>;

/// 渲染器的错误类型
#[derive(Debug, Error)]
pub enum MeshRenderError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 图形 API 错误
    #[error("Graphics error: {0}")]
    Graphics(#[from] GraphicsError),

    /// 网格加载错误
    #[error("Mesh loading error: {0}")]
    MeshLoading(#[from] MeshLoadError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 日志系统错误
    #[error("Log error: {0}")]
    Log(String),

    /// 初始化错误
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl MeshRenderError {
    /// 底层图形调用返回的 HRESULT（如果有）
    pub fn status_code(&self) -> Option<i32> {
        match self {
            MeshRenderError::Graphics(GraphicsError::Call { code, .. }) => Some(code.0),
            _ => None,
        }
    }
}

/// 配置相关的错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件未找到
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// 配置值无效
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// 图形 API 调用失败，携带 HRESULT
    #[error("{operation} failed: {code}")]
    Call { operation: &'static str, code: HResult },

    /// 硬件不满足最低要求
    #[error("Unsupported hardware: {0}")]
    UnsupportedHardware(String),

    /// 设备创建失败
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// 着色器二进制加载失败
    #[error("Failed to load shader '{}': {reason}", .path.display())]
    ShaderLoad { path: PathBuf, reason: String },

    /// 资源创建失败
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// 渲染命令执行失败
    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    /// 资源状态转换与跟踪状态不一致
    #[error("Invalid transition on '{resource}': expected {expected}, found {actual}")]
    InvalidTransition {
        resource: String,
        expected: String,
        actual: String,
    },

    /// CPU/GPU 同步失败
    #[error("Synchronization failed: {0}")]
    Synchronization(String),
}

/// 网格加载相关的错误
#[derive(Debug, Error)]
pub enum MeshLoadError {
    /// 文件不存在
    #[error("Mesh file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// 不支持的文件格式
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    /// 解析失败
    #[error("Failed to parse mesh: {0}")]
    ParseError(String),

    /// 几何数据无效
    #[error("Invalid geometry data: {0}")]
    InvalidGeometry(String),
}

/// 图形 API 返回的状态码
///
/// 显示为 `HRESULT of 0x%08X`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HResult(pub i32);

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HRESULT of 0x{:08X}", self.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hresult_formatting() {
        assert_eq!(HResult(0x887A0005u32 as i32).to_string(), "HRESULT of 0x887A0005");
        assert_eq!(HResult(0).to_string(), "HRESULT of 0x00000000");
    }

    #[test]
    fn test_call_error_keeps_status_code() {
        let err: MeshRenderError = GraphicsError::Call {
            operation: "ID3D12Device::CreateFence",
            code: HResult(0x80070057u32 as i32),
        }
        .into();

        assert_eq!(err.status_code(), Some(0x80070057u32 as i32));
        let message = err.to_string();
        assert!(message.contains("ID3D12Device::CreateFence"));
        assert!(message.contains("HRESULT of 0x80070057"));
    }

    #[test]
    fn test_non_graphics_error_has_no_status() {
        let err: MeshRenderError = ConfigError::ParseError("bad".into()).into();
        assert_eq!(err.status_code(), None);
    }
}
