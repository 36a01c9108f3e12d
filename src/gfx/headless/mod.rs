//! 无窗口软件设备
//!
//! 实现与 D3D12 后端相同的设备 trait，但所有 GPU 工作都在一个独立的“GPU 线程”上按提交顺序执行。
//! CPU 与 GPU 之间只通过 fence（计数器 + 条件变量）同步，因此帧循环的等待与复用规则
//! 在这里与真实硬件上一样生效。
//!
//! 设备还扮演调试层的角色：
//!
//! - 屏障的 before 状态必须与资源的实际状态一致
//! - 复制目标必须处于 CopyDest，DispatchMesh 要求几何缓冲区处于 ShaderResource
//! - 不允许写入正在显示的后台缓冲区
//! - 命令分配器不能在其命令仍在执行时重置
//! - CPU 不能覆盖 GPU 尚未读取完的常量缓冲区
//!
//! 发现的问题记录在 [`HeadlessDevice::validation_errors`] 中。

mod device;
mod live;
mod timeline;

pub use device::{
    HeadlessBuffer, HeadlessCommandSlot, HeadlessDevice, HeadlessFence, HeadlessPipeline,
    HeadlessSurface, PauseGuard,
};
pub use live::LiveObjects;
pub use timeline::TimelineCounter;

use crate::renderer::command::Viewport;
use crate::renderer::resource::ResourceState;

/// GPU 线程执行时记录的事件
#[derive(Debug, Clone, PartialEq)]
pub enum GpuEvent {
    /// 后台缓冲区状态转换
    ImageTransition {
        index: usize,
        before: ResourceState,
        after: ResourceState,
    },
    /// 网格着色器调度
    Dispatch {
        groups: u32,
        constants_address: u64,
        render_target: usize,
        viewport: Viewport,
    },
    Present {
        index: usize,
    },
}

pub(crate) const E_FAIL: i32 = 0x8000_4005_u32 as i32;
pub(crate) const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
pub(crate) const DXGI_ERROR_DEVICE_REMOVED: i32 = 0x887A_0005_u32 as i32;
