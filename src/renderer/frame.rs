//! 帧槽
//!
//! 每个后台缓冲区对应一个帧槽，拥有自己的命令分配器、命令列表和 fence。

use crate::core::error::Result;
use crate::gfx::backend::GpuDevice;

/// 一个在途帧的全部 CPU 侧资源
pub struct FrameSlot<D: GpuDevice> {
    pub commands: D::CommandSlot,
    pub fence: D::Fence,
}

impl<D: GpuDevice> FrameSlot<D> {
    pub fn new(device: &D, pipeline: &D::Pipeline) -> Result<Self> {
        Ok(Self {
            commands: device.create_command_slot(pipeline)?,
            fence: device.create_fence(0)?,
        })
    }
}

/// 创建 `count` 个帧槽
pub fn create_frame_slots<D: GpuDevice>(
    device: &D,
    pipeline: &D::Pipeline,
    count: usize,
) -> Result<Vec<FrameSlot<D>>> {
    (0..count).map(|_| FrameSlot::new(device, pipeline)).collect()
}
