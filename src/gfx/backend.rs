//! 图形后端抽象
//!
//! 渲染器只通过这些 trait 访问 GPU。`Dx12Context` 是 Windows 上的真实实现，
//! `HeadlessDevice` 是带独立 GPU 时间线线程的软件实现，用于测试和无窗口运行。
//!
//! 所有对象都由同一个设备实例创建；对象之间的生命周期由所有权保证，
//! 设备必须最后释放。

use crate::core::error::Result;
use crate::renderer::command::CommandRecorder;
use crate::renderer::pipeline::{PipelineDescriptor, ShaderBlob};
use crate::renderer::resource::BufferDescriptor;

/// GPU 缓冲区
pub trait GpuBuffer {
    /// 缓冲区大小（字节）
    fn size(&self) -> u64;

    /// 从 CPU 写入数据，只对上传堆中的缓冲区有效
    ///
    /// 上传堆缓冲区在创建时映射，整个生命周期内保持映射。
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// GPU 虚拟地址，用于根描述符绑定
    fn gpu_address(&self) -> u64;
}

/// 单调递增的 GPU 计数器
pub trait GpuFence {
    /// GPU 已完成的值
    fn completed_value(&self) -> u64;

    /// 阻塞当前线程直到完成值达到 `value`，没有超时
    fn wait_for(&self, value: u64) -> Result<()>;
}

/// 呈现表面（交换链）
pub trait PresentSurface {
    /// 后台缓冲区数量
    fn buffer_count(&self) -> usize;

    /// 下一帧要渲染到的后台缓冲区索引，只在 `present` 后变化
    fn current_index(&self) -> usize;

    /// 后台缓冲区尺寸，整个生命周期内不变
    fn extent(&self) -> (u32, u32);

    /// 呈现当前后台缓冲区，返回更新后的索引
    fn present(&mut self, sync_interval: u32) -> Result<usize>;
}

/// 逻辑 GPU 设备和它唯一的提交队列
pub trait GpuDevice: Sized {
    type Buffer: GpuBuffer;
    type Fence: GpuFence;
    type Pipeline;
    type Surface: PresentSurface;
    type CommandSlot: CommandRecorder<Self>;

    /// 后端名称
    fn backend_name(&self) -> &'static str;

    /// 创建缓冲区，初始状态由描述符给出
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Self::Buffer>;

    /// 创建 fence
    fn create_fence(&self, initial_value: u64) -> Result<Self::Fence>;

    /// 创建网格着色器管线（根签名从网格着色器二进制中提取）
    fn create_pipeline(
        &self,
        mesh_shader: &ShaderBlob,
        pixel_shader: &ShaderBlob,
        descriptor: &PipelineDescriptor,
    ) -> Result<Self::Pipeline>;

    /// 创建命令分配器和命令列表，返回时处于已关闭（可重置）状态
    fn create_command_slot(&self, pipeline: &Self::Pipeline) -> Result<Self::CommandSlot>;

    /// 把已关闭的命令列表提交到队列
    fn execute(&self, commands: &mut Self::CommandSlot) -> Result<()>;

    /// 在队列中排入 signal：GPU 执行到这里时把 fence 设为 `value`
    fn signal(&self, fence: &Self::Fence, value: u64) -> Result<()>;
}
