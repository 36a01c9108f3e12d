//! DirectX 12 缓冲区和 fence

use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};

use super::{d3d12_state, set_name, HrContext};
use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::{GpuBuffer, GpuFence};
use crate::renderer::resource::{BufferDescriptor, MemoryType};

/// 提交资源（committed resource）形式的缓冲区
///
/// 上传堆中的缓冲区在创建时映射，释放时解除映射。
pub struct Dx12Buffer {
    resource: ID3D12Resource,
    size: u64,
    address: u64,
    mapped: Option<*mut u8>,
}

impl Dx12Buffer {
    pub fn new(device: &ID3D12Device2, descriptor: &BufferDescriptor) -> Result<Self> {
        let size = descriptor.aligned_size();
        if size == 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "{}: buffer size must not be zero",
                descriptor.label()
            ))
            .into());
        }

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: match descriptor.memory_type {
                MemoryType::DeviceLocal => D3D12_HEAP_TYPE_DEFAULT,
                MemoryType::Upload => D3D12_HEAP_TYPE_UPLOAD,
            },
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: size,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_UNKNOWN,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &resource_desc,
                    d3d12_state(descriptor.initial_state),
                    None,
                    &mut resource,
                )
                .hr("ID3D12Device::CreateCommittedResource")?;
            let resource = resource.ok_or_else(|| {
                GraphicsError::ResourceCreation(format!("{}: no resource returned", descriptor.label()))
            })?;
            set_name(&resource, descriptor.label());

            let mapped = if descriptor.memory_type == MemoryType::Upload {
                // CPU 不读取
                let read_range = D3D12_RANGE { Begin: 0, End: 0 };
                let mut data = std::ptr::null_mut();
                resource
                    .Map(0, Some(&read_range), Some(&mut data))
                    .hr("ID3D12Resource::Map")?;
                Some(data as *mut u8)
            } else {
                None
            };

            Ok(Self {
                address: resource.GetGPUVirtualAddress(),
                resource,
                size,
                mapped,
            })
        }
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }
}

impl GpuBuffer for Dx12Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let Some(mapped) = self.mapped else {
            return Err(GraphicsError::ResourceCreation(
                "Buffer in GPU-local memory is not CPU-writable".to_string(),
            )
            .into());
        };

        let end = offset + data.len() as u64;
        if end > self.size {
            return Err(GraphicsError::ResourceCreation(format!(
                "Write of {}..{} exceeds buffer of {} bytes",
                offset, end, self.size
            ))
            .into());
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn gpu_address(&self) -> u64 {
        self.address
    }
}

impl Drop for Dx12Buffer {
    fn drop(&mut self) {
        if self.mapped.is_some() {
            unsafe { self.resource.Unmap(0, None) };
        }
    }
}

/// fence 和用于阻塞等待的事件
pub struct Dx12Fence {
    fence: ID3D12Fence,
    event: HANDLE,
}

impl Dx12Fence {
    pub fn new(device: &ID3D12Device2, initial_value: u64) -> Result<Self> {
        unsafe {
            let fence: ID3D12Fence = device
                .CreateFence(initial_value, D3D12_FENCE_FLAG_NONE)
                .hr("ID3D12Device::CreateFence")?;
            let event = CreateEventA(None, false, false, None).hr("CreateEventA")?;
            Ok(Self { fence, event })
        }
    }

    pub fn fence(&self) -> &ID3D12Fence {
        &self.fence
    }
}

impl GpuFence for Dx12Fence {
    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        unsafe {
            if self.fence.GetCompletedValue() >= value {
                return Ok(());
            }

            self.fence
                .SetEventOnCompletion(value, self.event)
                .hr("ID3D12Fence::SetEventOnCompletion")?;

            if WaitForSingleObject(self.event, INFINITE) != WAIT_OBJECT_0 {
                return Err(GraphicsError::Synchronization(format!(
                    "WaitForSingleObject failed while waiting for fence value {}",
                    value
                ))
                .into());
            }
        }
        Ok(())
    }
}

impl Drop for Dx12Fence {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.event);
        }
    }
}
