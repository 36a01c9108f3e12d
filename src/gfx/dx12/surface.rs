//! 交换链、渲染目标视图和深度缓冲区
//!
//! 窗口尺寸固定，交换链创建后不会重建。

use windows::core::Interface;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use super::descriptor::DescriptorHeap;
use super::pipeline::{color_format, depth_format};
use super::{set_name, HrContext};
use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::PresentSurface;
use crate::renderer::pipeline::{ColorFormat, DepthFormat};

pub struct Dx12Surface {
    swap_chain: IDXGISwapChain3,
    back_buffers: Vec<ID3D12Resource>,
    rtv_heap: DescriptorHeap,
    // DSV 引用的深度缓冲区
    _depth: ID3D12Resource,
    dsv_heap: DescriptorHeap,
    current: usize,
    extent: (u32, u32),
}

impl Dx12Surface {
    pub(crate) fn new(
        factory: &IDXGIFactory4,
        device: &ID3D12Device2,
        queue: &ID3D12CommandQueue,
        hwnd: HWND,
        extent: (u32, u32),
        buffer_count: usize,
    ) -> Result<Self> {
        let (width, height) = extent;
        if width == 0 || height == 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "Swap chain extent {}x{} is empty",
                width, height
            ))
            .into());
        }

        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: color_format(ColorFormat::Rgba8Unorm),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: buffer_count as u32,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            ..Default::default()
        };

        unsafe {
            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(queue, hwnd, &swap_chain_desc, None, None)
                .hr("IDXGIFactory2::CreateSwapChainForHwnd")?;

            // 不支持全屏切换
            factory
                .MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)
                .hr("IDXGIFactory::MakeWindowAssociation")?;

            let swap_chain: IDXGISwapChain3 = swap_chain
                .cast()
                .hr("IDXGISwapChain1::QueryInterface")?;

            let rtv_heap = DescriptorHeap::new(
                device,
                D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                buffer_count as u32,
                "Back buffer RTV heap",
            )?;

            let mut back_buffers = Vec::with_capacity(buffer_count);
            for i in 0..buffer_count {
                let buffer: ID3D12Resource = swap_chain
                    .GetBuffer(i as u32)
                    .hr("IDXGISwapChain::GetBuffer")?;
                set_name(&buffer, &format!("Back buffer {}", i));
                device.CreateRenderTargetView(&buffer, None, rtv_heap.cpu_handle(i)?);
                back_buffers.push(buffer);
            }

            let dsv_heap = DescriptorHeap::new(device, D3D12_DESCRIPTOR_HEAP_TYPE_DSV, 1, "Depth DSV heap")?;
            let depth = create_depth_buffer(device, width, height)?;
            device.CreateDepthStencilView(&depth, None, dsv_heap.cpu_handle(0)?);

            let current = swap_chain.GetCurrentBackBufferIndex() as usize;

            tracing::info!(width, height, buffer_count, "Swap chain created");

            Ok(Self {
                swap_chain,
                back_buffers,
                rtv_heap,
                _depth: depth,
                dsv_heap,
                current,
                extent,
            })
        }
    }

    pub(crate) fn back_buffer(&self, index: usize) -> Result<&ID3D12Resource> {
        self.back_buffers.get(index).ok_or_else(|| {
            GraphicsError::ResourceCreation(format!(
                "Back buffer {} out of range ({} buffers)",
                index,
                self.back_buffers.len()
            ))
            .into()
        })
    }

    pub(crate) fn rtv_handle(&self, index: usize) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.rtv_heap.cpu_handle(index)
    }

    pub(crate) fn dsv_handle(&self) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.dsv_heap.cpu_handle(0)
    }
}

impl PresentSurface for Dx12Surface {
    fn buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    fn current_index(&self) -> usize {
        self.current
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn present(&mut self, sync_interval: u32) -> Result<usize> {
        unsafe {
            self.swap_chain
                .Present(sync_interval, DXGI_PRESENT(0))
                .ok()
                .hr("IDXGISwapChain::Present")?;
            self.current = self.swap_chain.GetCurrentBackBufferIndex() as usize;
        }
        tracing::trace!(next = self.current, "Presented");
        Ok(self.current)
    }
}

/// 深度缓冲区，清除值 1.0，常驻 DEPTH_WRITE 状态
fn create_depth_buffer(device: &ID3D12Device2, width: u32, height: u32) -> Result<ID3D12Resource> {
    let format = depth_format(DepthFormat::Depth32Float);
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: D3D12_HEAP_TYPE_DEFAULT,
        ..Default::default()
    };
    let desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        Width: width as u64,
        Height: height,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: format,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
        ..Default::default()
    };
    let clear_value = D3D12_CLEAR_VALUE {
        Format: format,
        Anonymous: D3D12_CLEAR_VALUE_0 {
            DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                Depth: 1.0,
                Stencil: 0,
            },
        },
    };

    unsafe {
        let mut depth: Option<ID3D12Resource> = None;
        device
            .CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                D3D12_RESOURCE_STATE_DEPTH_WRITE,
                Some(&clear_value),
                &mut depth,
            )
            .hr("ID3D12Device::CreateCommittedResource")?;
        let depth = depth
            .ok_or_else(|| GraphicsError::ResourceCreation("Depth buffer was not returned".to_string()))?;
        set_name(&depth, "Depth buffer");
        Ok(depth)
    }
}
