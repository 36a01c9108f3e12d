//! D3D12 调试层与存活对象报告

use tracing::{debug, info, warn};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;

/// 启用调试层，必须在创建设备之前调用
///
/// 调试层不可用（未安装图形工具）时只记录警告。
pub fn enable_debug_layer(gpu_validation: bool) {
    unsafe {
        let mut debug: Option<ID3D12Debug> = None;
        if let Err(e) = D3D12GetDebugInterface(&mut debug) {
            warn!("Failed to enable D3D12 debug layer: {}", e.message());
            return;
        }

        let Some(debug) = debug else {
            warn!("D3D12 debug interface unavailable");
            return;
        };
        debug.EnableDebugLayer();
        info!("D3D12 debug layer enabled");

        if gpu_validation {
            match debug.cast::<ID3D12Debug1>() {
                Ok(debug1) => {
                    debug1.SetEnableGPUBasedValidation(true);
                    info!("GPU-based validation enabled");
                }
                Err(e) => warn!("GPU-based validation unavailable: {}", e.message()),
            }
        }
    }
}

/// 输出仍然存活的 DXGI/D3D12 对象，在所有 GPU 对象释放后调用
pub fn report_live_objects() {
    unsafe {
        match DXGIGetDebugInterface1::<IDXGIDebug1>(0) {
            Ok(dxgi_debug) => {
                debug!("Reporting live DXGI objects");
                if let Err(e) = dxgi_debug.ReportLiveObjects(
                    DXGI_DEBUG_ALL,
                    DXGI_DEBUG_RLO_DETAIL | DXGI_DEBUG_RLO_IGNORE_INTERNAL,
                ) {
                    warn!("ReportLiveObjects failed: {}", e.message());
                }
            }
            Err(e) => debug!("DXGI debug interface unavailable: {}", e.message()),
        }
    }
}
