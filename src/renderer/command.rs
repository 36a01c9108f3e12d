//! 命令缓冲区模块
//!
//! 每个帧槽拥有一个命令分配器和一个命令列表。渲染器通过 [`CommandRecorder`]
//! 录制命令；录制只写入 CPU 侧的缓冲区，提交到队列之前 GPU 不执行任何工作。
//!
//! # 生命周期
//!
//! ```text
//! Initial/Executable/Pending ──reset──> Recording ──close──> Executable ──execute──> Pending
//! ```
//!
//! `reset` 只能在该槽最后一次提交完成之后调用，这一点由帧同步器保证。

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GpuDevice;
use crate::renderer::resource::Transition;

/// 网格着色器线程组大小，每个线程处理一个三角形
pub const THREADS_PER_GROUP: u32 = 32;

/// 覆盖 `index_count` 个索引需要的线程组数量：`ceil(ceil(c / 3) / 32)`
pub fn mesh_dispatch_groups(index_count: u32) -> u32 {
    let triangles = index_count.div_ceil(3);
    triangles.div_ceil(THREADS_PER_GROUP)
}

/// 命令缓冲区状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// 初始状态
    Initial,
    /// 正在记录
    Recording,
    /// 已完成记录
    Executable,
    /// 已提交到队列
    Pending,
    /// 无效状态（录制失败）
    Invalid,
}

impl CommandBufferState {
    /// reset：进入录制状态
    pub fn begin_recording(&mut self) -> Result<()> {
        if *self == CommandBufferState::Recording {
            return Err(GraphicsError::CommandExecution(
                "Command list reset while still recording".to_string(),
            )
            .into());
        }
        *self = CommandBufferState::Recording;
        Ok(())
    }

    /// close：结束录制
    pub fn finish_recording(&mut self) -> Result<()> {
        self.require(CommandBufferState::Recording, "close")?;
        *self = CommandBufferState::Executable;
        Ok(())
    }

    /// execute：提交到队列
    pub fn submit(&mut self) -> Result<()> {
        self.require(CommandBufferState::Executable, "execute")?;
        *self = CommandBufferState::Pending;
        Ok(())
    }

    /// 录制命令前检查
    pub fn require_recording(&self, command: &str) -> Result<()> {
        self.require(CommandBufferState::Recording, command)
    }

    fn require(&self, expected: CommandBufferState, command: &str) -> Result<()> {
        if *self != expected {
            return Err(GraphicsError::CommandExecution(format!(
                "{} requires a command list in {:?} state, found {:?}",
                command, expected, self
            ))
            .into());
        }
        Ok(())
    }
}

/// 视口和裁剪矩形
///
/// 窗口尺寸固定，整个进程生命周期内不变。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// 帧槽的命令录制接口
///
/// 所有录制方法都要求处于录制状态，否则返回错误。
pub trait CommandRecorder<D: GpuDevice> {
    fn state(&self) -> CommandBufferState;

    /// 重置分配器和命令列表并开始录制
    fn reset(&mut self, pipeline: Option<&D::Pipeline>) -> Result<()>;

    /// 结束录制
    fn close(&mut self) -> Result<()>;

    /// 整个缓冲区复制
    fn copy_buffer(&mut self, dst: &D::Buffer, src: &D::Buffer) -> Result<()>;

    /// 缓冲区状态转换
    fn buffer_barrier(&mut self, buffer: &D::Buffer, transition: Transition) -> Result<()>;

    /// 后台缓冲区状态转换
    fn back_buffer_barrier(
        &mut self,
        surface: &D::Surface,
        index: usize,
        transition: Transition,
    ) -> Result<()>;

    /// 绑定管线状态和根签名
    fn set_pipeline(&mut self, pipeline: &D::Pipeline) -> Result<()>;

    /// 设置视口和裁剪矩形
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;

    /// 绑定后台缓冲区的 RTV 和深度缓冲区的 DSV
    fn set_render_target(&mut self, surface: &D::Surface, index: usize) -> Result<()>;

    fn clear_render_target(&mut self, surface: &D::Surface, index: usize, color: [f32; 4]) -> Result<()>;

    fn clear_depth(&mut self, surface: &D::Surface, depth: f32) -> Result<()>;

    /// 根参数 0：常量缓冲区视图
    fn bind_constants(&mut self, buffer: &D::Buffer, offset: u64) -> Result<()>;

    /// 根参数 1、2：顶点和索引的着色器资源视图
    fn bind_geometry(&mut self, vertices: &D::Buffer, indices: &D::Buffer) -> Result<()>;

    fn dispatch_mesh(&mut self, groups: u32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(3, 1)]
    #[case(96, 1)]
    #[case(97, 2)]
    #[case(99, 2)]
    #[case(192, 2)]
    #[case(195, 3)]
    fn test_mesh_dispatch_groups(#[case] index_count: u32, #[case] groups: u32) {
        assert_eq!(mesh_dispatch_groups(index_count), groups);
    }

    #[test]
    fn test_state_transitions() {
        let mut state = CommandBufferState::Initial;

        assert!(state.close_is_rejected());
        state.begin_recording().unwrap();
        assert!(state.require_recording("DispatchMesh").is_ok());
        assert!(state.begin_recording().is_err());

        state.finish_recording().unwrap();
        assert!(state.require_recording("DispatchMesh").is_err());

        state.submit().unwrap();
        assert_eq!(state, CommandBufferState::Pending);
        assert!(state.submit().is_err());

        state.begin_recording().unwrap();
        assert_eq!(state, CommandBufferState::Recording);
    }

    #[test]
    fn test_viewport() {
        let viewport = Viewport::new(1200, 900);
        assert!((viewport.aspect_ratio() - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(viewport.max_depth, 1.0);
    }

    impl CommandBufferState {
        fn close_is_rejected(&self) -> bool {
            let mut copy = *self;
            copy.finish_recording().is_err()
        }
    }
}
