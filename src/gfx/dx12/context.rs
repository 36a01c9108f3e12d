//! DirectX 12 设备上下文
//!
//! # 初始化流程
//!
//! 1. 启用调试层（可选）
//! 2. 创建 DXGI 工厂并枚举适配器
//! 3. 按配置选择适配器（可在终端中交互选择）
//! 4. 以 Feature Level 12_1 创建设备
//! 5. 检查 Shader Model 6.5 和网格着色器支持
//! 6. 创建 DIRECT 命令队列
//!
//! 交换链由 [`Dx12Context::create_surface`] 单独创建。

use std::ffi::c_void;
use std::io::{BufRead, Write};

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tracing::{debug, info};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;
use winit::window::Window;

use super::command::Dx12CommandSlot;
use super::debug::enable_debug_layer;
use super::pipeline::Dx12Pipeline;
use super::resource::{Dx12Buffer, Dx12Fence};
use super::surface::Dx12Surface;
use super::HrContext;
use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, MeshRenderError, Result};
use crate::gfx::adapter::{select_adapter, AdapterInfo, AdapterSelection, DeviceCapabilities};
use crate::gfx::backend::GpuDevice;
use crate::renderer::pipeline::{PipelineDescriptor, ShaderBlob};
use crate::renderer::resource::BufferDescriptor;

/// DirectX 12 设备、命令队列和创建它们的 DXGI 工厂
pub struct Dx12Context {
    queue: ID3D12CommandQueue,
    device: ID3D12Device2,
    factory: IDXGIFactory4,
    adapter: AdapterInfo,
    capabilities: DeviceCapabilities,
}

impl Dx12Context {
    /// 创建设备和命令队列
    ///
    /// 交互选择适配器时从 `input` 读取，提示写入 `output`。
    pub fn new<R: BufRead, W: Write>(config: &GraphicsConfig, input: &mut R, output: &mut W) -> Result<Self> {
        if config.debug_layer {
            enable_debug_layer(config.gpu_validation);
        }

        unsafe {
            let factory_flags = if config.debug_layer {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 =
                CreateDXGIFactory2(factory_flags).hr("CreateDXGIFactory2")?;

            let (adapters, infos) = enumerate_adapters(&factory)?;
            let chosen = select_adapter(&infos, AdapterSelection::from_config(config), input, output)?;
            let adapter_info = infos[chosen].clone();

            let mut device: Option<ID3D12Device2> = None;
            if let Err(e) = D3D12CreateDevice(&adapters[chosen], D3D_FEATURE_LEVEL_12_1, &mut device) {
                return Err(GraphicsError::UnsupportedHardware(format!(
                    "{} cannot create a Feature Level 12_1 device: {}",
                    adapter_info.description,
                    e.message()
                ))
                .into());
            }
            let device = device.ok_or_else(|| {
                GraphicsError::DeviceCreation("D3D12CreateDevice returned no device".to_string())
            })?;

            let capabilities = query_capabilities(&device);
            debug!(?capabilities, "Device capabilities");
            capabilities.validate()?;

            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let queue: ID3D12CommandQueue = device
                .CreateCommandQueue(&queue_desc)
                .hr("ID3D12Device::CreateCommandQueue")?;

            info!(adapter = %adapter_info.description, "D3D12 device created");

            Ok(Self {
                queue,
                device,
                factory,
                adapter: adapter_info,
                capabilities,
            })
        }
    }

    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// 为窗口创建交换链，尺寸取窗口客户区大小
    pub fn create_surface(&self, window: &Window, buffer_count: usize) -> Result<Dx12Surface> {
        let handle = window.window_handle().map_err(|e| {
            MeshRenderError::Initialization(format!("Window handle unavailable: {}", e))
        })?;
        let hwnd = match handle.as_raw() {
            RawWindowHandle::Win32(win32) => HWND(win32.hwnd.get() as *mut c_void),
            _ => {
                return Err(MeshRenderError::Initialization(
                    "Expected a Win32 window handle".to_string(),
                ))
            }
        };

        let size = window.inner_size();
        Dx12Surface::new(
            &self.factory,
            &self.device,
            &self.queue,
            hwnd,
            (size.width, size.height),
            buffer_count,
        )
    }
}

fn enumerate_adapters(factory: &IDXGIFactory4) -> Result<(Vec<IDXGIAdapter1>, Vec<AdapterInfo>)> {
    let mut adapters = Vec::new();
    let mut infos = Vec::new();

    unsafe {
        let mut index = 0;
        // 枚举到 DXGI_ERROR_NOT_FOUND 为止
        while let Ok(adapter) = factory.EnumAdapters1(index) {
            let desc = adapter.GetDesc1().hr("IDXGIAdapter1::GetDesc1")?;
            let len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());

            let info = AdapterInfo {
                index,
                description: String::from_utf16_lossy(&desc.Description[..len]),
                is_software: desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0,
                dedicated_video_memory: desc.DedicatedVideoMemory as u64,
            };
            debug!(index, adapter = %info.description, software = info.is_software, "Adapter found");

            adapters.push(adapter);
            infos.push(info);
            index += 1;
        }
    }

    Ok((adapters, infos))
}

/// 查询 Shader Model 和网格着色器层级
///
/// 旧运行时不认识的查询会失败，此时视为不支持。
fn query_capabilities(device: &ID3D12Device2) -> DeviceCapabilities {
    unsafe {
        let mut shader_model = D3D12_FEATURE_DATA_SHADER_MODEL {
            HighestShaderModel: D3D_SHADER_MODEL_6_5,
        };
        let shader_model = match device.CheckFeatureSupport(
            D3D12_FEATURE_SHADER_MODEL,
            &mut shader_model as *mut _ as *mut c_void,
            std::mem::size_of::<D3D12_FEATURE_DATA_SHADER_MODEL>() as u32,
        ) {
            Ok(()) => {
                let raw = shader_model.HighestShaderModel.0 as u32;
                (raw >> 4, raw & 0xF)
            }
            Err(_) => (0, 0),
        };

        let mut options7 = D3D12_FEATURE_DATA_D3D12_OPTIONS7::default();
        let mesh_shader_tier = match device.CheckFeatureSupport(
            D3D12_FEATURE_D3D12_OPTIONS7,
            &mut options7 as *mut _ as *mut c_void,
            std::mem::size_of::<D3D12_FEATURE_DATA_D3D12_OPTIONS7>() as u32,
        ) {
            Ok(()) => options7.MeshShaderTier.0 as u32,
            Err(_) => 0,
        };

        DeviceCapabilities {
            feature_level: (12, 1),
            shader_model,
            mesh_shader_tier,
        }
    }
}

impl GpuDevice for Dx12Context {
    type Buffer = Dx12Buffer;
    type Fence = Dx12Fence;
    type Pipeline = Dx12Pipeline;
    type Surface = Dx12Surface;
    type CommandSlot = Dx12CommandSlot;

    fn backend_name(&self) -> &'static str {
        "DirectX 12"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Dx12Buffer> {
        Dx12Buffer::new(&self.device, descriptor)
    }

    fn create_fence(&self, initial_value: u64) -> Result<Dx12Fence> {
        Dx12Fence::new(&self.device, initial_value)
    }

    fn create_pipeline(
        &self,
        mesh_shader: &ShaderBlob,
        pixel_shader: &ShaderBlob,
        descriptor: &PipelineDescriptor,
    ) -> Result<Dx12Pipeline> {
        Dx12Pipeline::new(&self.device, mesh_shader, pixel_shader, descriptor)
    }

    fn create_command_slot(&self, pipeline: &Dx12Pipeline) -> Result<Dx12CommandSlot> {
        Dx12CommandSlot::new(&self.device, pipeline)
    }

    fn execute(&self, commands: &mut Dx12CommandSlot) -> Result<()> {
        let list = commands.submit()?;
        unsafe { self.queue.ExecuteCommandLists(&[Some(list)]) };
        Ok(())
    }

    fn signal(&self, fence: &Dx12Fence, value: u64) -> Result<()> {
        unsafe {
            self.queue
                .Signal(fence.fence(), value)
                .hr("ID3D12CommandQueue::Signal")
        }
    }
}
