//! DirectX 12 图形 API 实现模块
//!
//! - `context`：适配器、设备、命令队列；实现 [`GpuDevice`](crate::gfx::backend::GpuDevice)
//! - `surface`：交换链、RTV/DSV、深度缓冲区
//! - `resource`：缓冲区和 fence
//! - `command`：帧槽的命令分配器和命令列表
//! - `pipeline`：根签名和网格着色器管线状态
//! - `descriptor`：CPU 描述符堆
//! - `debug`：调试层和存活对象报告

pub mod command;
pub mod context;
pub mod debug;
pub mod descriptor;
pub mod pipeline;
pub mod resource;
pub mod surface;

pub use context::Dx12Context;
pub use surface::Dx12Surface;

use std::mem::ManuallyDrop;

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{GraphicsError, HResult, Result};
use crate::renderer::resource::ResourceState;

/// 给 `windows::core::Result` 附加失败的 API 名称
pub(crate) trait HrContext<T> {
    fn hr(self, operation: &'static str) -> Result<T>;
}

impl<T> HrContext<T> for windows::core::Result<T> {
    fn hr(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| {
            tracing::error!(operation, error = %e.message(), "D3D12 call failed");
            GraphicsError::Call {
                operation,
                code: HResult(e.code().0),
            }
            .into()
        })
    }
}

/// 资源状态到 D3D12 状态位
pub(crate) fn d3d12_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::CopyDest => D3D12_RESOURCE_STATE_COPY_DEST,
        ResourceState::ShaderResource => {
            D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE | D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE
        }
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
        ResourceState::DepthWrite => D3D12_RESOURCE_STATE_DEPTH_WRITE,
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::GenericRead => D3D12_RESOURCE_STATE_GENERIC_READ,
    }
}

/// 构造状态转换屏障
///
/// 屏障借用资源指针而不增加引用计数，必须在资源释放前录制完毕。
pub(crate) fn transition_barrier(
    resource: &ID3D12Resource,
    before: ResourceState,
    after: ResourceState,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: d3d12_state(before),
                StateAfter: d3d12_state(after),
            }),
        },
    }
}

/// 设置调试名称
pub(crate) fn set_name(object: &ID3D12Object, name: &str) {
    let wide: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
    unsafe {
        let _ = object.SetName(windows::core::PCWSTR(wide.as_ptr()));
    }
}
