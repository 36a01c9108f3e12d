//! DirectX 12 描述符堆
//!
//! 只需要 CPU 侧的 RTV 和 DSV 堆；常量和几何缓冲区都通过根描述符绑定。

use windows::Win32::Graphics::Direct3D12::*;

use super::{set_name, HrContext};
use crate::core::error::{GraphicsError, Result};

/// 不可被着色器访问的描述符堆
pub struct DescriptorHeap {
    // 句柄指向堆内存，堆随描述符一起存活
    _heap: ID3D12DescriptorHeap,
    increment_size: usize,
    cpu_start: usize,
    num_descriptors: u32,
}

impl DescriptorHeap {
    pub fn new(
        device: &ID3D12Device2,
        heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
        num_descriptors: u32,
        name: &str,
    ) -> Result<Self> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: heap_type,
            NumDescriptors: num_descriptors,
            Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
            NodeMask: 0,
        };

        unsafe {
            let heap: ID3D12DescriptorHeap = device
                .CreateDescriptorHeap(&desc)
                .hr("ID3D12Device::CreateDescriptorHeap")?;

            set_name(&heap, name);

            let increment_size = device.GetDescriptorHandleIncrementSize(heap_type) as usize;
            let cpu_start = heap.GetCPUDescriptorHandleForHeapStart().ptr;

            Ok(Self {
                _heap: heap,
                increment_size,
                cpu_start,
                num_descriptors,
            })
        }
    }

    /// 第 `index` 个描述符的 CPU 句柄
    pub fn cpu_handle(&self, index: usize) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        if index >= self.num_descriptors as usize {
            return Err(GraphicsError::ResourceCreation(format!(
                "Descriptor {} out of range ({} in heap)",
                index, self.num_descriptors
            ))
            .into());
        }
        Ok(D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: self.cpu_start + index * self.increment_size,
        })
    }
}
