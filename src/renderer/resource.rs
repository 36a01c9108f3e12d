//! 资源管理模块
//!
//! GPU 资源的描述、状态跟踪、每帧常量数据和常量缓冲区环。
//!
//! # 设计原则
//!
//! - **显式状态**：每个资源都有一个使用状态，状态转换以屏障的形式记录，不会立即执行
//! - **自动对齐**：常量缓冲区槽按 256 字节对齐
//! - **不别名**：CPU 只写入 GPU 不再读取的常量缓冲区槽

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GpuBuffer;
use crate::renderer::sync::FenceValue;

/// 常量缓冲区视图的对齐要求
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// 把 `size` 向上对齐到 `alignment`（必须是 2 的幂）
pub const fn align_to(size: u64, alignment: u64) -> u64 {
    (size + alignment - 1) & !(alignment - 1)
}

/// 资源使用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// 复制目标
    CopyDest,
    /// 着色器只读
    ShaderResource,
    /// 渲染目标
    RenderTarget,
    /// 深度写入
    DepthWrite,
    /// 可呈现
    Present,
    /// 上传堆的通用只读状态
    GenericRead,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::CopyDest => "CopyDest",
            ResourceState::ShaderResource => "ShaderResource",
            ResourceState::RenderTarget => "RenderTarget",
            ResourceState::DepthWrite => "DepthWrite",
            ResourceState::Present => "Present",
            ResourceState::GenericRead => "GenericRead",
        };
        f.write_str(name)
    }
}

/// 一次状态转换（屏障）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub before: ResourceState,
    pub after: ResourceState,
}

impl Transition {
    pub fn new(before: ResourceState, after: ResourceState) -> Self {
        Self { before, after }
    }
}

/// CPU 侧的资源状态跟踪
///
/// 录制屏障前先在这里转换，保证录制的 `before` 与资源的实际状态一致。
#[derive(Debug, Clone)]
pub struct TrackedState {
    name: String,
    state: ResourceState,
}

impl TrackedState {
    pub fn new(name: impl Into<String>, initial: ResourceState) -> Self {
        Self {
            name: name.into(),
            state: initial,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 转换到 `after`，返回需要录制的屏障
    ///
    /// 转换到当前状态是错误：那意味着调用方对资源状态的假设已经错了。
    pub fn transition_to(&mut self, after: ResourceState) -> Result<Transition> {
        if self.state == after {
            return Err(GraphicsError::InvalidTransition {
                resource: self.name.clone(),
                expected: format!("any state other than {}", after),
                actual: self.state.to_string(),
            }
            .into());
        }

        let transition = Transition::new(self.state, after);
        self.state = after;
        Ok(transition)
    }
}

/// 缓冲区用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// 顶点数据（结构化缓冲区）
    Vertex,
    /// 索引数据（原始 u32 缓冲区）
    Index,
    /// 常量缓冲区
    Constant,
    /// 上传用的暂存缓冲区
    Staging,
}

/// 缓冲区内存类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    /// GPU本地内存（默认堆），CPU 不可访问
    DeviceLocal,
    /// 上传堆，CPU 可写、GPU 可读
    Upload,
}

/// 缓冲区描述信息
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// 缓冲区大小（字节）
    pub size: u64,
    /// 使用类型
    pub usage: BufferUsage,
    /// 内存类型
    pub memory_type: MemoryType,
    /// 创建时的状态
    pub initial_state: ResourceState,
    /// 调试名称
    pub name: Option<String>,
}

impl BufferDescriptor {
    /// 创建新的缓冲区描述符
    ///
    /// GPU 本地内存从复制目标状态开始，上传堆固定为通用只读状态。
    pub fn new(size: u64, usage: BufferUsage, memory_type: MemoryType) -> Self {
        let initial_state = match memory_type {
            MemoryType::DeviceLocal => ResourceState::CopyDest,
            MemoryType::Upload => ResourceState::GenericRead,
        };

        Self {
            size,
            usage,
            memory_type,
            initial_state,
            name: None,
        }
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 对齐后的大小，常量缓冲区按 256 字节对齐
    pub fn aligned_size(&self) -> u64 {
        if self.usage == BufferUsage::Constant {
            align_to(self.size, CONSTANT_BUFFER_ALIGNMENT)
        } else {
            self.size
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed buffer")
    }
}

/// 每帧的场景常量
///
/// 与着色器中的 `cbuffer` 布局一致；矩阵按行存储。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneConstants {
    pub world: [[f32; 4]; 4],
    pub world_view: [[f32; 4]; 4],
    pub world_view_proj: [[f32; 4]; 4],
    pub draw_meshlets: u32,
    pub indices_count: u32,
    pub vertices_count: u32,
}

/// 常量缓冲区环
///
/// 一个持久映射的上传堆缓冲区，按后台缓冲区数量划分成若干 256 字节对齐的槽。
/// 每个槽记录最后一次读取它的提交（命令槽 + fence 值），写入前必须等待该提交完成。
pub struct ConstantBufferRing<B> {
    buffer: B,
    slot_size: u64,
    last_reader: Vec<Option<(usize, FenceValue)>>,
}

impl<B: GpuBuffer> ConstantBufferRing<B> {
    /// 每个槽的字节数
    pub const SLOT_SIZE: u64 = align_to(std::mem::size_of::<SceneConstants>() as u64, CONSTANT_BUFFER_ALIGNMENT);

    /// 缓冲区需要的总大小
    pub fn required_size(slot_count: usize) -> u64 {
        Self::SLOT_SIZE * slot_count as u64
    }

    /// 用已创建的上传堆缓冲区构造环
    pub fn new(buffer: B, slot_count: usize) -> Result<Self> {
        if buffer.size() < Self::required_size(slot_count) {
            return Err(GraphicsError::ResourceCreation(format!(
                "Constant buffer of {} bytes cannot hold {} slots of {} bytes",
                buffer.size(),
                slot_count,
                Self::SLOT_SIZE
            ))
            .into());
        }

        Ok(Self {
            buffer,
            slot_size: Self::SLOT_SIZE,
            last_reader: vec![None; slot_count],
        })
    }

    pub fn slot_count(&self) -> usize {
        self.last_reader.len()
    }

    /// 槽在缓冲区内的偏移
    pub fn slot_offset(&self, slot: usize) -> u64 {
        slot as u64 * self.slot_size
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// 最后一次读取该槽的提交
    pub fn last_reader(&self, slot: usize) -> Option<(usize, FenceValue)> {
        self.last_reader.get(slot).copied().flatten()
    }

    /// 写入常量
    ///
    /// 调用方必须已经等待 `last_reader` 返回的提交完成。
    pub fn write(&mut self, slot: usize, constants: &SceneConstants) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(GraphicsError::ResourceCreation(format!(
                "Constant buffer slot {} out of range ({} slots)",
                slot,
                self.slot_count()
            ))
            .into());
        }

        self.buffer.write(self.slot_offset(slot), bytemuck::bytes_of(constants))
    }

    /// 记录一次提交读取了该槽
    pub fn mark_read(&mut self, slot: usize, command_slot: usize, fence_value: FenceValue) {
        if let Some(reader) = self.last_reader.get_mut(slot) {
            *reader = Some((command_slot, fence_value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct MemoryBuffer {
        data: Mutex<Vec<u8>>,
    }

    impl MemoryBuffer {
        fn new(size: usize) -> Self {
            Self { data: Mutex::new(vec![0; size]) }
        }
    }

    impl GpuBuffer for MemoryBuffer {
        fn size(&self) -> u64 {
            self.data.lock().len() as u64
        }

        fn write(&self, offset: u64, bytes: &[u8]) -> Result<()> {
            let offset = offset as usize;
            self.data.lock()[offset..offset + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }

        fn gpu_address(&self) -> u64 {
            0x1000
        }
    }

    #[test]
    fn test_scene_constants_layout() {
        assert_eq!(std::mem::size_of::<SceneConstants>(), 3 * 64 + 12);
        assert_eq!(ConstantBufferRing::<MemoryBuffer>::SLOT_SIZE, 256);
    }

    #[test]
    fn test_aligned_size() {
        let desc = BufferDescriptor::new(204, BufferUsage::Constant, MemoryType::Upload);
        assert_eq!(desc.aligned_size(), 256);
        assert_eq!(desc.initial_state, ResourceState::GenericRead);

        let desc = BufferDescriptor::new(204, BufferUsage::Vertex, MemoryType::DeviceLocal);
        assert_eq!(desc.aligned_size(), 204);
        assert_eq!(desc.initial_state, ResourceState::CopyDest);

        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn test_tracked_state_transitions() {
        let mut state = TrackedState::new("back buffer 0", ResourceState::Present);

        let t = state.transition_to(ResourceState::RenderTarget).unwrap();
        assert_eq!(t, Transition::new(ResourceState::Present, ResourceState::RenderTarget));

        // 重复转换到同一状态是错误
        assert!(state.transition_to(ResourceState::RenderTarget).is_err());
        assert_eq!(state.state(), ResourceState::RenderTarget);

        let t = state.transition_to(ResourceState::Present).unwrap();
        assert_eq!(t.before, ResourceState::RenderTarget);
    }

    #[test]
    fn test_ring_slots_do_not_overlap() {
        let buffer = MemoryBuffer::new(512);
        let mut ring = ConstantBufferRing::new(buffer, 2).unwrap();

        let mut a = SceneConstants::zeroed();
        a.indices_count = 3;
        let mut b = SceneConstants::zeroed();
        b.indices_count = 6;

        ring.write(0, &a).unwrap();
        ring.write(1, &b).unwrap();

        let data = ring.buffer().data.lock().clone();
        let slot0: &SceneConstants = bytemuck::from_bytes(&data[0..std::mem::size_of::<SceneConstants>()]);
        let slot1: &SceneConstants = bytemuck::from_bytes(&data[256..256 + std::mem::size_of::<SceneConstants>()]);
        assert_eq!(slot0.indices_count, 3);
        assert_eq!(slot1.indices_count, 6);

        assert!(ring.write(2, &a).is_err());
    }

    #[test]
    fn test_ring_tracks_readers() {
        let mut ring = ConstantBufferRing::new(MemoryBuffer::new(512), 2).unwrap();
        assert_eq!(ring.last_reader(1), None);

        ring.mark_read(1, 0, FenceValue::new(7));
        assert_eq!(ring.last_reader(1), Some((0, FenceValue::new(7))));
    }

    #[test]
    fn test_ring_rejects_small_buffer() {
        assert!(ConstantBufferRing::new(MemoryBuffer::new(300), 2).is_err());
    }
}
