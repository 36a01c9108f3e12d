/// 几何体加载和处理模块
///
/// 提供3D模型加载功能、顶点定义、网格数据结构以及法线重建。
///
/// # 架构设计
///
/// ```text
/// 文件 (OBJ)
///     ↓
/// Loader (ObjLoader)
///     ↓
/// MeshData (CPU侧数据)
///     ↓
/// Renderer (一次性上传到 GPU 本地内存)
/// ```

pub mod vertex;
pub mod mesh;
pub mod normals;
pub mod loaders;

// 重新导出常用类型
pub use vertex::Vertex;
pub use mesh::MeshData;
