//! 图形后端模块
//!
//! - `backend`：渲染器使用的设备、缓冲区、fence、呈现表面 trait
//! - `adapter`：适配器选择和设备能力检查
//! - `dx12`：DirectX 12 实现（仅 Windows）
//! - `headless`：无窗口的软件实现，带独立的 GPU 时间线线程

pub mod adapter;
pub mod backend;
#[cfg(target_os = "windows")]
pub mod dx12;
pub mod headless;

pub use backend::{GpuBuffer, GpuDevice, GpuFence, PresentSurface};
#[cfg(target_os = "windows")]
pub use dx12::Dx12Context;
pub use headless::HeadlessDevice;
