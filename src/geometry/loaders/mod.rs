/// 模型加载器模块
///
/// 提供统一的模型加载接口和 OBJ 格式的实现。
///
/// # 使用示例
///
/// ```rust,no_run
/// use mesh_render::geometry::loaders::load_mesh;
/// use std::path::Path;
///
/// let mesh = load_mesh(Path::new("assets/dragon.obj"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
use crate::core::error::{MeshLoadError, Result};
use crate::geometry::mesh::MeshData;
use std::path::Path;

pub mod obj_loader;

pub use obj_loader::ObjLoader;

/// 网格加载器 trait
///
/// 加载器是无状态的，返回 CPU 侧的 `MeshData`，不涉及 GPU 资源。
pub trait MeshLoader {
    /// 从文件路径加载网格
    ///
    /// # 错误
    ///
    /// - 文件不存在或无法读取
    /// - 文件格式错误或损坏
    /// - 数据验证失败（空网格、索引越界）
    fn load_from_file(path: &Path) -> Result<MeshData>;

    /// 从内存数据加载网格
    fn load_from_memory(data: &[u8]) -> Result<MeshData>;

    /// 支持的文件扩展名列表（小写，不含点号）
    fn supported_extensions() -> &'static [&'static str];
}

/// 根据文件扩展名选择合适的加载器
pub fn load_mesh(path: &Path) -> Result<MeshData> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| {
            MeshLoadError::UnsupportedFormat(format!(
                "Cannot determine file extension of '{}'",
                path.display()
            ))
        })?;

    if ObjLoader::supported_extensions().contains(&extension.as_str()) {
        ObjLoader::load_from_file(path)
    } else {
        Err(MeshLoadError::UnsupportedFormat(format!(".{}", extension)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MeshRenderError;

    #[test]
    fn test_unsupported_extension() {
        let result = load_mesh(Path::new("model.fbx"));
        assert!(matches!(
            result,
            Err(MeshRenderError::MeshLoading(MeshLoadError::UnsupportedFormat(_)))
        ));
    }

    #[test]
    fn test_missing_extension() {
        assert!(load_mesh(Path::new("model")).is_err());
    }

    #[test]
    fn test_missing_obj_file() {
        let result = load_mesh(Path::new("does/not/exist.OBJ"));
        assert!(matches!(
            result,
            Err(MeshRenderError::MeshLoading(MeshLoadError::FileNotFound(_)))
        ));
    }
}
