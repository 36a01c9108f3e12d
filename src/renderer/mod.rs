//! 渲染器模块
//!
//! 双缓冲的网格着色器帧循环。渲染器拥有设备、呈现表面、管线、帧槽、常量缓冲区环
//! 和几何缓冲区，每帧按固定顺序录制、提交、呈现并 signal。
//!
//! # 帧顺序
//!
//! ```text
//! (a) 写入常量缓冲区环中与当前后台缓冲区对应的槽
//! (b) 等待命令槽的上一次提交完成，重置
//! (c) 录制：管线 → 视口 → Present→RenderTarget → 清屏 → 绑定 → DispatchMesh → RenderTarget→Present
//! (d) 提交
//! (e) 呈现
//! (f) signal 命令槽的 fence 为 frame_id + 1，进入下一帧
//! ```
//!
//! 渲染器与具体图形 API 无关，通过 [`GpuDevice`] 访问 GPU。

use std::path::PathBuf;

use crate::core::error::Result;
use crate::core::{Config, SceneConfig};
use crate::geometry::MeshData;
use crate::gfx::backend::{GpuBuffer, GpuDevice, PresentSurface};
use crate::math::matrix;

pub mod command;
pub mod frame;
pub mod pipeline;
pub mod resource;
pub mod sync;
pub mod upload;

use command::{mesh_dispatch_groups, CommandRecorder, Viewport};
use frame::{create_frame_slots, FrameSlot};
use pipeline::{PipelineDescriptor, ShaderBlob};
use resource::{
    BufferDescriptor, BufferUsage, ConstantBufferRing, MemoryType, ResourceState, SceneConstants,
    TrackedState,
};
use sync::{wait_for_value, FrameSynchronizer};
use upload::{upload_geometry, GeometryBuffers};

/// 渲染器启动参数
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub mesh_shader: PathBuf,
    pub pixel_shader: PathBuf,
    pub vsync_interval: u32,
}

impl RendererSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mesh_shader: PathBuf::from(&config.assets.mesh_shader),
            pixel_shader: PathBuf::from(&config.assets.pixel_shader),
            vsync_interval: config.graphics.vsync_interval,
        }
    }
}

/// 一帧的统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_id: u64,
    /// 使用的命令槽
    pub command_slot: usize,
    /// 写入的常量缓冲区槽
    pub ring_slot: usize,
    /// 渲染到的后台缓冲区
    pub back_buffer: usize,
    /// CPU 是否等待了 GPU
    pub stalled: bool,
    pub dispatch_groups: u32,
}

/// 网格着色器渲染器
///
/// 字段按释放顺序排列：设备最后释放。
pub struct Renderer<D: GpuDevice> {
    geometry: GeometryBuffers<D::Buffer>,
    ring: ConstantBufferRing<D::Buffer>,
    slots: Vec<FrameSlot<D>>,
    pipeline: D::Pipeline,
    back_buffers: Vec<TrackedState>,
    sync: FrameSynchronizer,
    viewport: Viewport,
    scene: SceneConfig,
    vsync_interval: u32,
    surface: D::Surface,
    device: D,
}

impl<D: GpuDevice> Renderer<D> {
    /// 创建渲染器
    ///
    /// 着色器在创建任何 GPU 对象之前加载；任何一步失败都会释放已创建的对象并返回错误。
    pub fn new(
        device: D,
        surface: D::Surface,
        settings: &RendererSettings,
        scene: SceneConfig,
        mesh: &MeshData,
    ) -> Result<Self> {
        let mesh_shader = ShaderBlob::load(&settings.mesh_shader)?;
        let pixel_shader = ShaderBlob::load(&settings.pixel_shader)?;

        let pipeline = device.create_pipeline(
            &mesh_shader,
            &pixel_shader,
            &PipelineDescriptor::default().with_name("Meshlet Pipeline"),
        )?;

        let buffer_count = surface.buffer_count();
        let mut slots = create_frame_slots(&device, &pipeline, buffer_count)?;

        let ring_size = ConstantBufferRing::<D::Buffer>::required_size(buffer_count);
        let ring_buffer = device.create_buffer(
            &BufferDescriptor::new(ring_size, BufferUsage::Constant, MemoryType::Upload)
                .with_name("Scene Constants"),
        )?;
        let ring = ConstantBufferRing::new(ring_buffer, buffer_count)?;

        let first = slots.first_mut().ok_or_else(|| {
            crate::core::MeshRenderError::Initialization("Surface has no back buffers".to_string())
        })?;
        let geometry = upload_geometry(&device, &mut first.commands, mesh)?;

        let (width, height) = surface.extent();
        let back_buffers = (0..buffer_count)
            .map(|i| TrackedState::new(format!("Back Buffer {}", i), ResourceState::Present))
            .collect();

        tracing::info!(
            backend = device.backend_name(),
            width,
            height,
            buffers = buffer_count,
            "Renderer initialized"
        );

        Ok(Self {
            geometry,
            ring,
            slots,
            pipeline,
            back_buffers,
            sync: FrameSynchronizer::new(buffer_count),
            viewport: Viewport::new(width, height),
            scene,
            vsync_interval: settings.vsync_interval,
            surface,
            device,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn surface(&self) -> &D::Surface {
        &self.surface
    }

    /// 视口在整个生命周期内不变
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frame_id(&self) -> u64 {
        self.sync.frame_id()
    }

    pub fn stall_count(&self) -> u64 {
        self.sync.stall_count()
    }

    pub fn geometry(&self) -> &GeometryBuffers<D::Buffer> {
        &self.geometry
    }

    /// 当前帧的场景常量
    pub fn scene_constants(&self) -> SceneConstants {
        let world = self.scene.model.transform.to_matrix();
        let view = self.scene.camera.view_matrix();
        let projection = self.scene.camera.projection_matrix(self.viewport.aspect_ratio());

        let world_view = view * world;
        let world_view_proj = projection * world_view;

        SceneConstants {
            world: matrix::to_rows(&world),
            world_view: matrix::to_rows(&world_view),
            world_view_proj: matrix::to_rows(&world_view_proj),
            draw_meshlets: u32::from(self.scene.draw_meshlets),
            indices_count: self.geometry.index_count,
            vertices_count: self.geometry.vertex_count,
        }
    }

    /// 渲染一帧
    pub fn render_frame(&mut self) -> Result<FrameStats> {
        let frame_id = self.sync.frame_id();

        // (a) 常量
        let ring_slot = self.surface.current_index();
        let mut stalled = false;
        if let Some((reader_slot, value)) = self.ring.last_reader(ring_slot) {
            stalled |= self.sync.wait_for(&self.slots[reader_slot].fence, value)?;
        }
        let constants = self.scene_constants();
        self.ring.write(ring_slot, &constants)?;

        // (b) 等待并重置命令槽
        let command_slot = self.sync.current_slot();
        stalled |= self.sync.wait_for_slot(command_slot, &self.slots[command_slot].fence)?;

        let slot = &mut self.slots[command_slot];
        let commands = &mut slot.commands;
        commands.reset(Some(&self.pipeline))?;

        // (c) 录制
        let back_buffer = ring_slot;
        let groups = mesh_dispatch_groups(self.geometry.index_count);

        commands.set_pipeline(&self.pipeline)?;
        commands.set_viewport(&self.viewport)?;
        commands.back_buffer_barrier(
            &self.surface,
            back_buffer,
            self.back_buffers[back_buffer].transition_to(ResourceState::RenderTarget)?,
        )?;
        commands.set_render_target(&self.surface, back_buffer)?;
        commands.clear_render_target(&self.surface, back_buffer, self.scene.clear_color)?;
        commands.clear_depth(&self.surface, 1.0)?;
        commands.bind_constants(self.ring.buffer(), self.ring.slot_offset(ring_slot))?;
        commands.bind_geometry(&self.geometry.vertices, &self.geometry.indices)?;
        commands.dispatch_mesh(groups)?;
        commands.back_buffer_barrier(
            &self.surface,
            back_buffer,
            self.back_buffers[back_buffer].transition_to(ResourceState::Present)?,
        )?;
        commands.close()?;

        // (d) 提交
        self.device.execute(commands)?;

        // (e) 呈现
        let next_index = self.surface.present(self.vsync_interval)?;

        // (f) signal
        let value = self.sync.next_fence_value();
        self.device.signal(&slot.fence, value.value())?;
        self.sync.mark_submitted(command_slot, value);
        self.ring.mark_read(ring_slot, command_slot, value);
        self.sync.advance();

        tracing::trace!(
            frame = frame_id,
            slot = command_slot,
            back_buffer,
            next_index,
            groups,
            stalled,
            "Frame submitted"
        );

        Ok(FrameStats {
            frame_id,
            command_slot,
            ring_slot,
            back_buffer,
            stalled,
            dispatch_groups: groups,
        })
    }

    /// 等待所有已提交的帧完成
    pub fn wait_idle(&mut self) -> Result<()> {
        let pending: Vec<_> = self.sync.pending().collect();
        for (slot, value) in pending {
            wait_for_value(&self.slots[slot].fence, value)?;
        }
        Ok(())
    }
}

impl<D: GpuDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        // GPU 可能仍在使用帧资源
        if let Err(e) = self.wait_idle() {
            tracing::error!("Failed to wait for GPU before shutdown: {}", e);
        }
        tracing::info!(frames = self.sync.frame_id(), stalls = self.sync.stall_count(), "Renderer destroyed");
    }
}

#[cfg(test)]
impl<D: GpuDevice> Renderer<D> {
    fn ring_address(&self, slot: usize) -> u64 {
        self.ring.buffer().gpu_address() + self.ring.slot_offset(slot)
    }
}
