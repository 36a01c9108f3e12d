//! 帧槽的命令分配器和命令列表

use windows::core::Interface;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D12::*;

use super::context::Dx12Context;
use super::pipeline::Dx12Pipeline;
use super::resource::Dx12Buffer;
use super::surface::Dx12Surface;
use super::{transition_barrier, HrContext};
use crate::core::error::Result;
use crate::gfx::backend::GpuBuffer;
use crate::renderer::command::{CommandBufferState, CommandRecorder, Viewport};
use crate::renderer::resource::Transition;

/// 根参数布局，与网格着色器中的根签名一致
const ROOT_CONSTANTS: u32 = 0;
const ROOT_VERTICES: u32 = 1;
const ROOT_INDICES: u32 = 2;

pub struct Dx12CommandSlot {
    allocator: ID3D12CommandAllocator,
    list: ID3D12GraphicsCommandList6,
    state: CommandBufferState,
}

impl Dx12CommandSlot {
    pub fn new(device: &ID3D12Device2, pipeline: &Dx12Pipeline) -> Result<Self> {
        unsafe {
            let allocator: ID3D12CommandAllocator = device
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                .hr("ID3D12Device::CreateCommandAllocator")?;

            let list: ID3D12GraphicsCommandList6 = device
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, pipeline.state())
                .hr("ID3D12Device::CreateCommandList")?;

            // 创建后处于录制状态，先关闭，帧循环总是从 reset 开始
            list.Close().hr("ID3D12GraphicsCommandList::Close")?;

            Ok(Self {
                allocator,
                list,
                state: CommandBufferState::Initial,
            })
        }
    }

    /// 提交前调用，推进状态
    pub(crate) fn submit(&mut self) -> Result<ID3D12CommandList> {
        self.state.submit()?;
        self.list.cast().hr("ID3D12GraphicsCommandList6::QueryInterface")
    }
}

impl CommandRecorder<Dx12Context> for Dx12CommandSlot {
    fn state(&self) -> CommandBufferState {
        self.state
    }

    fn reset(&mut self, pipeline: Option<&Dx12Pipeline>) -> Result<()> {
        let mut next = self.state;
        next.begin_recording()?;

        unsafe {
            self.allocator.Reset().hr("ID3D12CommandAllocator::Reset")?;
            self.list
                .Reset(&self.allocator, pipeline.map(|p| p.state()))
                .hr("ID3D12GraphicsCommandList::Reset")?;
        }

        self.state = next;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.require_recording("Close")?;
        if let Err(e) = unsafe { self.list.Close() }.hr("ID3D12GraphicsCommandList::Close") {
            self.state = CommandBufferState::Invalid;
            return Err(e);
        }
        self.state.finish_recording()
    }

    fn copy_buffer(&mut self, dst: &Dx12Buffer, src: &Dx12Buffer) -> Result<()> {
        self.state.require_recording("CopyBufferRegion")?;
        let size = dst.size().min(src.size());
        unsafe {
            self.list
                .CopyBufferRegion(dst.resource(), 0, src.resource(), 0, size);
        }
        Ok(())
    }

    fn buffer_barrier(&mut self, buffer: &Dx12Buffer, transition: Transition) -> Result<()> {
        self.state.require_recording("ResourceBarrier")?;
        let barrier = transition_barrier(buffer.resource(), transition.before, transition.after);
        unsafe { self.list.ResourceBarrier(&[barrier]) };
        Ok(())
    }

    fn back_buffer_barrier(
        &mut self,
        surface: &Dx12Surface,
        index: usize,
        transition: Transition,
    ) -> Result<()> {
        self.state.require_recording("ResourceBarrier")?;
        let resource = surface.back_buffer(index)?;
        let barrier = transition_barrier(resource, transition.before, transition.after);
        unsafe { self.list.ResourceBarrier(&[barrier]) };
        Ok(())
    }

    fn set_pipeline(&mut self, pipeline: &Dx12Pipeline) -> Result<()> {
        self.state.require_recording("SetPipelineState")?;
        unsafe {
            self.list.SetGraphicsRootSignature(pipeline.root_signature());
            self.list.SetPipelineState(pipeline.state());
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.state.require_recording("RSSetViewports")?;
        let d3d_viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: viewport.width as f32,
            Height: viewport.height as f32,
            MinDepth: viewport.min_depth,
            MaxDepth: viewport.max_depth,
        };
        let scissor = RECT {
            left: 0,
            top: 0,
            right: viewport.width as i32,
            bottom: viewport.height as i32,
        };
        unsafe {
            self.list.RSSetViewports(&[d3d_viewport]);
            self.list.RSSetScissorRects(&[scissor]);
        }
        Ok(())
    }

    fn set_render_target(&mut self, surface: &Dx12Surface, index: usize) -> Result<()> {
        self.state.require_recording("OMSetRenderTargets")?;
        let rtv = surface.rtv_handle(index)?;
        let dsv = surface.dsv_handle()?;
        unsafe { self.list.OMSetRenderTargets(1, Some(&rtv), false, Some(&dsv)) };
        Ok(())
    }

    fn clear_render_target(&mut self, surface: &Dx12Surface, index: usize, color: [f32; 4]) -> Result<()> {
        self.state.require_recording("ClearRenderTargetView")?;
        let rtv = surface.rtv_handle(index)?;
        unsafe { self.list.ClearRenderTargetView(rtv, &color, None) };
        Ok(())
    }

    fn clear_depth(&mut self, surface: &Dx12Surface, depth: f32) -> Result<()> {
        self.state.require_recording("ClearDepthStencilView")?;
        let dsv = surface.dsv_handle()?;
        unsafe {
            self.list
                .ClearDepthStencilView(dsv, D3D12_CLEAR_FLAG_DEPTH, depth, 0, None);
        }
        Ok(())
    }

    fn bind_constants(&mut self, buffer: &Dx12Buffer, offset: u64) -> Result<()> {
        self.state.require_recording("SetGraphicsRootConstantBufferView")?;
        unsafe {
            self.list
                .SetGraphicsRootConstantBufferView(ROOT_CONSTANTS, buffer.gpu_address() + offset);
        }
        Ok(())
    }

    fn bind_geometry(&mut self, vertices: &Dx12Buffer, indices: &Dx12Buffer) -> Result<()> {
        self.state.require_recording("SetGraphicsRootShaderResourceView")?;
        unsafe {
            self.list
                .SetGraphicsRootShaderResourceView(ROOT_VERTICES, vertices.gpu_address());
            self.list
                .SetGraphicsRootShaderResourceView(ROOT_INDICES, indices.gpu_address());
        }
        Ok(())
    }

    fn dispatch_mesh(&mut self, groups: u32) -> Result<()> {
        self.state.require_recording("DispatchMesh")?;
        unsafe { self.list.DispatchMesh(groups, 1, 1) };
        Ok(())
    }
}
