//! 配置管理模块
//!
//! 提供渲染器配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1200
//! height = 900
//! title = "Mesh Shaders"
//!
//! [graphics]
//! adapter = 0                 # 省略时选择第一个硬件适配器
//! interactive_adapter = false # 启动时在终端中选择适配器
//! vsync_interval = 1
//! debug_layer = true
//! gpu_validation = false
//!
//! [assets]
//! model = "assets/dragon.obj"
//! mesh_shader = "MeshletMS.cso"
//! pixel_shader = "MeshletPS.cso"
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 渲染器配置
///
/// 包含了程序运行所需的所有配置项。
/// 可以从配置文件加载，也可以通过代码构建。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 资源路径配置
    #[serde(default)]
    pub assets: AssetConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
///
/// 窗口大小固定，交换链和视口在整个运行期间保持不变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 指定的适配器索引
    #[serde(default)]
    pub adapter: Option<u32>,

    /// 是否在终端中交互选择适配器
    #[serde(default)]
    pub interactive_adapter: bool,

    /// Present 的同步间隔（1 = 垂直同步）
    #[serde(default = "default_vsync_interval")]
    pub vsync_interval: u32,

    /// 启用 D3D12 调试层
    #[serde(default = "default_debug_layer")]
    pub debug_layer: bool,

    /// 启用 GPU 验证（需要调试层）
    #[serde(default)]
    pub gpu_validation: bool,

    /// 无窗口模式下渲染的帧数，`None` 表示正常窗口模式
    #[serde(default)]
    pub headless_frames: Option<u64>,
}

/// 资源路径配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// 模型文件路径
    #[serde(default = "default_model")]
    pub model: String,

    /// 预编译的网格着色器
    #[serde(default = "default_mesh_shader")]
    pub mesh_shader: String,

    /// 预编译的像素着色器
    #[serde(default = "default_pixel_shader")]
    pub pixel_shader: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 1200 }
fn default_height() -> u32 { 900 }
fn default_title() -> String { "Mesh Shaders".to_string() }
fn default_vsync_interval() -> u32 { 1 }
fn default_debug_layer() -> bool { cfg!(debug_assertions) }
fn default_model() -> String { "assets/dragon.obj".to_string() }
fn default_mesh_shader() -> String { "MeshletMS.cso".to_string() }
fn default_pixel_shader() -> String { "MeshletPS.cso".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "mesh_render.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            interactive_adapter: false,
            vsync_interval: default_vsync_interval(),
            debug_layer: default_debug_layer(),
            gpu_validation: false,
            headless_frames: None,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            mesh_shader: default_mesh_shader(),
            pixel_shader: default_pixel_shader(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--adapter <index>`: 使用指定索引的适配器
    /// - `--choose-adapter`: 启动时交互选择适配器
    /// - `--model <path>`: 模型文件
    /// - `--mesh-shader <path>` / `--pixel-shader <path>`: 着色器二进制
    /// - `--width <value>` / `--height <value>`: 窗口尺寸
    /// - `--headless <frames>`: 不创建窗口，渲染指定帧数后退出
    ///
    /// 无法解析的值会被忽略，保留原有配置。
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        let value_of = |flag: &str| flag_value(&args, flag);

        if let Some(adapter) = value_of("--adapter").and_then(|v| v.parse().ok()) {
            self.graphics.adapter = Some(adapter);
        }

        if args.iter().any(|a| a == "--choose-adapter") {
            self.graphics.interactive_adapter = true;
        }

        if let Some(model) = value_of("--model") {
            self.assets.model = model;
        }

        if let Some(path) = value_of("--mesh-shader") {
            self.assets.mesh_shader = path;
        }

        if let Some(path) = value_of("--pixel-shader") {
            self.assets.pixel_shader = path;
        }

        if let Some(width) = value_of("--width").and_then(|v| v.parse().ok()) {
            self.window.width = width;
        }

        if let Some(height) = value_of("--height").and_then(|v| v.parse().ok()) {
            self.window.height = height;
        }

        if let Some(frames) = value_of("--headless").and_then(|v| v.parse().ok()) {
            self.graphics.headless_frames = Some(frames);
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        // DXGI 只接受 0-4
        if self.graphics.vsync_interval > 4 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.vsync_interval".to_string(),
                reason: "Sync interval must be between 0 and 4".to_string(),
            }.into());
        }

        if self.graphics.gpu_validation && !self.graphics.debug_layer {
            return Err(ConfigError::InvalidValue {
                field: "graphics.gpu_validation".to_string(),
                reason: "GPU-based validation requires the debug layer".to_string(),
            }.into());
        }

        for (field, value) in [
            ("assets.model", &self.assets.model),
            ("assets.mesh_shader", &self.assets.mesh_shader),
            ("assets.pixel_shader", &self.assets.pixel_shader),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "Path must not be empty".to_string(),
                }.into());
            }
        }

        Ok(())
    }
}

/// 返回紧跟在 `flag` 之后的参数
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 1200);
        assert_eq!(config.window.height, 900);
        assert_eq!(config.window.title, "Mesh Shaders");
        assert_eq!(config.graphics.vsync_interval, 1);
        assert_eq!(config.graphics.adapter, None);
        assert_eq!(config.assets.mesh_shader, "MeshletMS.cso");
        assert_eq!(config.assets.pixel_shader, "MeshletPS.cso");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.vsync_interval = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.assets.mesh_shader = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.debug_layer = false;
        config.graphics.gpu_validation = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [graphics]
            adapter = 1

            [assets]
            model = "bunny.obj"
            "#,
        )
        .unwrap();

        assert_eq!(config.graphics.adapter, Some(1));
        assert_eq!(config.graphics.vsync_interval, 1);
        assert_eq!(config.assets.model, "bunny.obj");
        assert_eq!(config.assets.mesh_shader, "MeshletMS.cso");
        assert_eq!(config.window.width, 1200);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args([
            "mesh_render",
            "--adapter", "2",
            "--width", "640",
            "--height", "480",
            "--model", "teapot.obj",
            "--headless", "12",
        ]);

        assert_eq!(config.graphics.adapter, Some(2));
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 480);
        assert_eq!(config.assets.model, "teapot.obj");
        assert_eq!(config.graphics.headless_frames, Some(12));
        assert!(!config.graphics.interactive_adapter);
    }

    #[test]
    fn test_apply_args_ignores_bad_values() {
        let mut config = Config::default();
        config.apply_args(["mesh_render", "--width", "wide", "--choose-adapter"]);

        assert_eq!(config.window.width, 1200);
        assert!(config.graphics.interactive_adapter);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = Config::from_file_or_default("definitely/not/here/config.toml");
        assert_eq!(config.window.width, 1200);
        assert!(Config::from_file("definitely/not/here/config.toml").is_err());
    }
}
