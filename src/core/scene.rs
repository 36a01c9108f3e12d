//! 场景配置模块
//!
//! 定义静态场景：相机、模型变换、清屏颜色和调试着色模式。
//! 从 `scene.toml` 加载，缺失的字段使用默认值。

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use crate::core::error::{Result, MeshRenderError, ConfigError};
use crate::math::{deg_to_rad, matrix, Matrix4, Vector3};

/// 3D 变换数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z)
    #[serde(default = "default_position")]
    pub position: [f32; 3],

    /// 旋转（欧拉角，度数）(pitch, yaw, roll)
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 3],

    /// 缩放 (x, y, z)
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

fn default_position() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_rotation() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: default_position(),
            rotation: default_rotation(),
            scale: default_scale(),
        }
    }
}

impl Transform {
    /// 创建模型矩阵
    ///
    /// 变换顺序：缩放 -> 旋转 -> 平移
    pub fn to_matrix(&self) -> Matrix4 {
        let [pitch, yaw, roll] = self.rotation.map(deg_to_rad);

        let translation = matrix::translation(self.position[0], self.position[1], self.position[2]);

        let rotation = Matrix4::from_axis_angle(&Vector3::z_axis(), roll)
            * Matrix4::from_axis_angle(&Vector3::y_axis(), yaw)
            * Matrix4::from_axis_angle(&Vector3::x_axis(), pitch);

        let scale = Matrix4::new_nonuniform_scaling(&Vector3::from(self.scale));

        translation * rotation * scale
    }
}

/// 相机配置
///
/// 视图矩阵是一个固定的平移，相机不移动。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// 视图平移（把世界移到相机空间）
    #[serde(default = "default_view_translation")]
    pub view_translation: [f32; 3],

    /// 垂直视野角度（度数）
    #[serde(default = "default_fov")]
    pub fov: f32,

    /// 近裁剪面距离
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,

    /// 远裁剪面距离
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,
}

fn default_view_translation() -> [f32; 3] {
    [0.0, -4.0, -10.0]
}

fn default_fov() -> f32 {
    60.0
}

fn default_near_clip() -> f32 {
    0.1
}

fn default_far_clip() -> f32 {
    100.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            view_translation: default_view_translation(),
            fov: default_fov(),
            near_clip: default_near_clip(),
            far_clip: default_far_clip(),
        }
    }
}

impl CameraConfig {
    /// 视图矩阵
    pub fn view_matrix(&self) -> Matrix4 {
        let [x, y, z] = self.view_translation;
        matrix::translation(x, y, z)
    }

    /// 透视投影矩阵（右手坐标系，深度 [0, 1]）
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Matrix4 {
        matrix::perspective_rh_zo(deg_to_rad(self.fov), aspect_ratio, self.near_clip, self.far_clip)
    }
}

/// 模型配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// 模型变换
    #[serde(default)]
    pub transform: Transform,
}

/// 场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// 相机配置
    #[serde(default)]
    pub camera: CameraConfig,

    /// 模型配置
    #[serde(default)]
    pub model: ModelConfig,

    /// 清屏颜色 (r, g, b, a)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// 按 meshlet 着色（调试用）
    #[serde(default)]
    pub draw_meshlets: bool,
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.2, 0.4, 1.0]
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            model: ModelConfig::default(),
            clear_color: default_clear_color(),
            draw_meshlets: false,
        }
    }
}

impl SceneConfig {
    /// 从文件加载场景配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| MeshRenderError::Config(ConfigError::FileNotFound(format!(
                "Failed to read scene config file '{}': {}",
                path.display(),
                e
            ))))?;

        toml::from_str(&contents)
            .map_err(|e| MeshRenderError::Config(ConfigError::ParseError(format!(
                "Failed to parse scene config: {}",
                e
            ))))
    }

    /// 从文件加载，如果文件不存在则返回默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded scene config from: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load scene config: {}, using defaults", e);
                    Self::default()
                }
            }
        } else {
            tracing::info!("Scene config not found, using defaults");
            Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transform_is_identity() {
        let matrix = Transform::default().to_matrix();
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_transform_to_matrix() {
        let transform = Transform {
            position: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        };
        let matrix = transform.to_matrix();

        assert!((matrix[(0, 3)] - 1.0).abs() < 0.001);
        assert!((matrix[(1, 3)] - 2.0).abs() < 0.001);
        assert!((matrix[(2, 3)] - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_default_camera() {
        let camera = CameraConfig::default();
        assert_eq!(camera.view_translation, [0.0, -4.0, -10.0]);
        assert_eq!(camera.fov, 60.0);
        assert_eq!(camera.near_clip, 0.1);
        assert_eq!(camera.far_clip, 100.0);

        let view = camera.view_matrix();
        assert!((view[(1, 3)] + 4.0).abs() < 1e-6);
        assert!((view[(2, 3)] + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_scene() {
        let scene = SceneConfig::default();
        assert_eq!(scene.clear_color, [0.0, 0.2, 0.4, 1.0]);
        assert!(!scene.draw_meshlets);
    }

    #[test]
    fn test_scene_from_toml() {
        let scene: SceneConfig = toml::from_str(
            r#"
            draw_meshlets = true

            [camera]
            fov = 45.0
            "#,
        )
        .unwrap();

        assert!(scene.draw_meshlets);
        assert_eq!(scene.camera.fov, 45.0);
        assert_eq!(scene.camera.view_translation, [0.0, -4.0, -10.0]);
    }

    #[test]
    fn test_shipped_scene_file() {
        let scene: SceneConfig = toml::from_str(include_str!("../../scene.toml")).unwrap();
        assert_eq!(scene.clear_color, [0.0, 0.2, 0.4, 1.0]);
        assert!(!scene.draw_meshlets);
        assert_eq!(scene.camera.fov, 60.0);
    }
}
