//! 管线状态模块
//!
//! 网格着色器和像素着色器由离线编译步骤生成，运行时作为不透明的字节块加载。
//! 根签名嵌在网格着色器二进制中，由后端在创建管线时提取。

use std::path::{Path, PathBuf};

use crate::core::error::{GraphicsError, Result};

/// 编译后的着色器二进制
#[derive(Debug, Clone)]
pub struct ShaderBlob {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ShaderBlob {
    /// 从文件读取着色器二进制，文件缺失或为空都是致命错误
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| GraphicsError::ShaderLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(GraphicsError::ShaderLoad {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            }
            .into());
        }

        tracing::info!(path = %path.display(), size = bytes.len(), "Shader loaded");
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// 填充模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// 剔除模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// 正面的顶点绕序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

/// 深度比较函数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Less,
    LessEqual,
    Always,
}

/// 颜色格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Rgba8Unorm,
}

/// 深度格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFormat {
    Depth32Float,
}

/// 管线状态描述
///
/// 默认值就是渲染器使用的固定配置：不透明、背面剔除、顺时针正面、
/// LESS_EQUAL 深度测试并写入深度。
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_compare: CompareFunction,
    pub depth_write: bool,
    pub blend_enabled: bool,
    pub color_format: ColorFormat,
    pub depth_format: DepthFormat,
    pub sample_count: u32,
    pub name: Option<String>,
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_face: FrontFace::Clockwise,
            depth_compare: CompareFunction::LessEqual,
            depth_write: true,
            blend_enabled: false,
            color_format: ColorFormat::Rgba8Unorm,
            depth_format: DepthFormat::Depth32Float,
            sample_count: 1,
            name: None,
        }
    }
}

impl PipelineDescriptor {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MeshRenderError;

    #[test]
    fn test_missing_shader_is_fatal() {
        let result = ShaderBlob::load("does/not/exist/MeshletMS.cso");
        match result {
            Err(MeshRenderError::Graphics(GraphicsError::ShaderLoad { path, .. })) => {
                assert!(path.ends_with("MeshletMS.cso"));
            }
            other => panic!("expected ShaderLoad error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_shader_bytes() {
        let path = std::env::temp_dir().join(format!("mesh_render_blob_{}.cso", std::process::id()));
        std::fs::write(&path, b"DXBC\x01\x02").unwrap();

        let blob = ShaderBlob::load(&path).unwrap();
        assert_eq!(blob.bytes(), b"DXBC\x01\x02");
        assert_eq!(blob.path(), path.as_path());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_empty_shader_is_rejected() {
        let path = std::env::temp_dir().join(format!("mesh_render_empty_{}.cso", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        assert!(ShaderBlob::load(&path).is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_default_descriptor() {
        let desc = PipelineDescriptor::default();
        assert_eq!(desc.cull_mode, CullMode::Back);
        assert_eq!(desc.front_face, FrontFace::Clockwise);
        assert_eq!(desc.depth_compare, CompareFunction::LessEqual);
        assert!(desc.depth_write);
        assert!(!desc.blend_enabled);
    }
}
