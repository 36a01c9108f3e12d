//! 几何数据上传
//!
//! 启动时执行一次：把顶点和索引复制到 GPU 本地内存，并转换到着色器只读状态。
//! 暂存缓冲区和上传用的 fence 只在本函数内存在，返回时释放。

use crate::core::error::{MeshLoadError, Result};
use crate::geometry::MeshData;
use crate::gfx::backend::{GpuBuffer, GpuDevice, GpuFence};
use crate::renderer::command::CommandRecorder;
use crate::renderer::resource::{BufferDescriptor, BufferUsage, MemoryType, ResourceState, TrackedState};
use crate::renderer::sync::{wait_for_value, FenceValue};

/// 上传 fence 的目标值
const UPLOAD_FENCE_VALUE: u64 = 1;

/// GPU 本地内存中的几何缓冲区，上传后不可变
pub struct GeometryBuffers<B> {
    pub vertices: B,
    pub indices: B,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// 创建一个缓冲区并写入数据（仅上传堆）
fn create_staging<D: GpuDevice>(device: &D, data: &[u8], name: &str) -> Result<D::Buffer> {
    let desc = BufferDescriptor::new(data.len() as u64, BufferUsage::Staging, MemoryType::Upload)
        .with_name(name);
    let buffer = device.create_buffer(&desc)?;
    buffer.write(0, data)?;
    Ok(buffer)
}

/// 上传网格数据并阻塞到 GPU 完成
///
/// `commands` 必须是空闲的命令槽；返回时它处于已提交并已完成的状态。
pub fn upload_geometry<D: GpuDevice>(
    device: &D,
    commands: &mut D::CommandSlot,
    mesh: &MeshData,
) -> Result<GeometryBuffers<D::Buffer>> {
    mesh.validate()?;

    let vertex_count = u32::try_from(mesh.vertex_count())
        .map_err(|_| MeshLoadError::InvalidGeometry("Too many vertices".to_string()))?;
    let index_count = u32::try_from(mesh.index_count())
        .map_err(|_| MeshLoadError::InvalidGeometry("Too many indices".to_string()))?;

    let vertex_bytes = mesh.vertex_bytes();
    let index_bytes = mesh.index_bytes();

    let vertices = device.create_buffer(
        &BufferDescriptor::new(vertex_bytes.len() as u64, BufferUsage::Vertex, MemoryType::DeviceLocal)
            .with_name("Vertex Buffer"),
    )?;
    let indices = device.create_buffer(
        &BufferDescriptor::new(index_bytes.len() as u64, BufferUsage::Index, MemoryType::DeviceLocal)
            .with_name("Index Buffer"),
    )?;

    let vertex_staging = create_staging(device, vertex_bytes, "Vertex Upload")?;
    let index_staging = create_staging(device, index_bytes, "Index Upload")?;

    let mut vertex_state = TrackedState::new("Vertex Buffer", ResourceState::CopyDest);
    let mut index_state = TrackedState::new("Index Buffer", ResourceState::CopyDest);

    commands.reset(None)?;
    commands.copy_buffer(&vertices, &vertex_staging)?;
    commands.buffer_barrier(&vertices, vertex_state.transition_to(ResourceState::ShaderResource)?)?;
    commands.copy_buffer(&indices, &index_staging)?;
    commands.buffer_barrier(&indices, index_state.transition_to(ResourceState::ShaderResource)?)?;
    commands.close()?;

    let fence = device.create_fence(0)?;
    device.execute(commands)?;
    device.signal(&fence, UPLOAD_FENCE_VALUE)?;
    wait_for_value(&fence, FenceValue::new(UPLOAD_FENCE_VALUE))?;

    debug_assert_eq!(fence.completed_value(), UPLOAD_FENCE_VALUE);
    tracing::info!(
        vertices = vertex_count,
        indices = index_count,
        bytes = vertex_bytes.len() + index_bytes.len(),
        "Geometry uploaded"
    );

    Ok(GeometryBuffers {
        vertices,
        indices,
        vertex_count,
        index_count,
    })
}
