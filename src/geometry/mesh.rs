/// 网格数据结构模块
///
/// CPU 侧的网格数据容器，存储从文件加载的顶点和 32 位索引。
/// 渲染器在启动时一次性把它上传到 GPU 本地内存。

use super::vertex::Vertex;
use crate::core::error::{MeshLoadError, Result};

/// CPU侧网格数据
///
/// 简单的数据持有者，不包含 GPU 资源。
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// 顶点数组
    pub vertices: Vec<Vertex>,

    /// 索引数组
    ///
    /// 每3个索引定义一个三角形。
    pub indices: Vec<u32>,

    /// 网格名称（可选）
    pub name: Option<String>,
}

impl MeshData {
    /// 创建一个指定名称的空网格数据
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// 从顶点和索引构造
    pub fn from_parts(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            name: None,
        }
    }

    /// 顶点数量
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 索引数量
    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// 三角形数量
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 顶点数据的字节视图
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// 索引数据的字节视图
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// 验证网格数据的有效性
    ///
    /// 检查：
    /// - 顶点和索引不为空
    /// - 索引数量是3的倍数
    /// - 所有索引都在顶点范围内
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() {
            return Err(MeshLoadError::InvalidGeometry("Mesh has no vertices".to_string()).into());
        }

        if self.indices.is_empty() {
            return Err(MeshLoadError::InvalidGeometry("Mesh has no indices".to_string()).into());
        }

        if self.indices.len() % 3 != 0 {
            return Err(MeshLoadError::InvalidGeometry(format!(
                "Index count {} is not a multiple of 3",
                self.indices.len()
            )).into());
        }

        let vertex_count = self.vertices.len() as u32;
        if let Some((position, index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, &index)| index >= vertex_count)
        {
            return Err(MeshLoadError::InvalidGeometry(format!(
                "Index {} at position {} is out of range ({} vertices)",
                index, position, vertex_count
            )).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData::from_parts(
            vec![
                Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
                Vertex::new([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_counts() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_bytes().len(), 96);
        assert_eq!(mesh.index_bytes().len(), 12);
    }

    #[test]
    fn test_validate() {
        assert!(triangle().validate().is_ok());

        let mut mesh = triangle();
        mesh.indices = vec![0, 1, 3];
        assert!(mesh.validate().is_err());

        let mut mesh = triangle();
        mesh.indices = vec![0, 1];
        assert!(mesh.validate().is_err());

        assert!(MeshData::with_name("empty").validate().is_err());
    }
}
