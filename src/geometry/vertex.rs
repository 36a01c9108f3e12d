/// 顶点定义模块
///
/// 网格着色器以结构化缓冲区（`StructuredBuffer<Vertex>`）读取顶点，
/// 布局必须与着色器中的结构体一致。

use bytemuck::{Pod, Zeroable};

/// 位置 / 法线 / 纹理坐标顶点
///
/// # 内存布局
///
/// - position: 12 bytes (3 * f32)
/// - normal: 12 bytes (3 * f32)
/// - texcoord: 8 bytes (2 * f32)
/// - **总计**: 32 bytes
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 顶点位置 (x, y, z)
    pub position: [f32; 3],

    /// 法线向量 (nx, ny, nz)，归一化
    pub normal: [f32; 3],

    /// 纹理坐标 (u, v)
    pub texcoord: [f32; 2],
}

impl Vertex {
    /// 创建一个新的顶点
    #[inline]
    pub fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            texcoord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_vertex_size() {
        // 3*4 + 3*4 + 2*4 = 32 bytes
        assert_eq!(size_of::<Vertex>(), 32);
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn test_vertex_bytes_layout() {
        let vertex = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.25]);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&vertex));

        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.5, 0.25]);
    }
}
