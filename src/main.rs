//! MeshRender - 网格着色器渲染器入口
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 指定适配器和模型
//! cargo run -- --adapter 1 --model assets/bunny.obj
//!
//! # 启动时在终端中选择适配器
//! cargo run -- --choose-adapter
//!
//! # 不创建窗口，用软件设备渲染 120 帧后退出
//! cargo run -- --headless 120
//! ```
//!
//! 任何初始化或逐帧错误都是致命的：记录日志、显示消息框（Windows）并以退出码 1 结束。

use std::path::Path;

use anyhow::{bail, Context};
use tracing::{error, info, trace};

use mesh_render::core::{log, Config, SceneConfig};
use mesh_render::geometry::loaders::load_mesh;
use mesh_render::geometry::MeshData;
use mesh_render::gfx::HeadlessDevice;
use mesh_render::renderer::{Renderer, RendererSettings};

/// 后台缓冲区（以及帧槽）数量
const BACK_BUFFER_COUNT: usize = 2;

fn main() {
    if let Err(e) = run() {
        let message = format!("{:#}", e);
        error!("{}", message);
        show_fatal_error(&message);
        std::process::exit(1);
    }
}

/// # 初始化流程
///
/// 1. 加载配置文件（config.toml）并应用命令行参数
/// 2. 初始化日志系统
/// 3. 加载场景配置（scene.toml）和模型
/// 4. 创建设备、呈现表面和渲染器
/// 5. 进入帧循环
fn run() -> anyhow::Result<()> {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args());
    config.validate().context("Invalid configuration")?;

    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)
        .context("Failed to initialize logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), "MeshRender starting");

    let scene = SceneConfig::from_file_or_default("scene.toml");
    info!(
        view_translation = ?scene.camera.view_translation,
        camera_fov = scene.camera.fov,
        model = %config.assets.model,
        "Scene configuration"
    );

    let mesh = load_mesh(Path::new(&config.assets.model))
        .with_context(|| format!("Failed to load model '{}'", config.assets.model))?;
    let settings = RendererSettings::from_config(&config);

    match config.graphics.headless_frames {
        Some(frames) => run_headless(&config, &settings, scene, &mesh, frames),
        None => run_windowed(&config, &settings, scene, &mesh),
    }
}

/// 无窗口运行：渲染固定帧数，然后检查校验错误和对象泄漏
fn run_headless(
    config: &Config,
    settings: &RendererSettings,
    scene: SceneConfig,
    mesh: &MeshData,
    frames: u64,
) -> anyhow::Result<()> {
    let device = HeadlessDevice::new().context("Failed to create headless device")?;
    let surface = device
        .create_surface(config.window.width, config.window.height, BACK_BUFFER_COUNT)
        .context("Failed to create headless surface")?;
    let live = device.live_objects();

    let mut renderer = Renderer::new(device, surface, settings, scene, mesh)
        .context("Failed to initialize renderer")?;

    for _ in 0..frames {
        let stats = renderer.render_frame().context("Frame failed")?;
        trace!(?stats, "Frame stats");
    }

    let errors = renderer.device().validation_errors();
    let stalls = renderer.stall_count();
    drop(renderer);

    info!(frames, stalls, "Headless run complete");

    if let Some(first) = errors.first() {
        bail!("{} validation errors, first: {}", errors.len(), first);
    }
    if live.count() != 0 {
        bail!("{} GPU objects still alive after shutdown", live.count());
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn run_windowed(
    config: &Config,
    settings: &RendererSettings,
    scene: SceneConfig,
    mesh: &MeshData,
) -> anyhow::Result<()> {
    use mesh_render::gfx::dx12::debug::report_live_objects;
    use mesh_render::gfx::Dx12Context;
    use winit::dpi::PhysicalSize;
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::window::WindowBuilder;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .with_resizable(false)
        .build(&event_loop)
        .context("Failed to create window")?;

    let context = {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        Dx12Context::new(&config.graphics, &mut input, &mut output)
            .context("Failed to create D3D12 device")?
    };
    let capabilities = context.capabilities();
    info!(
        adapter = %context.adapter().description,
        video_memory_mb = context.adapter().dedicated_video_memory / (1024 * 1024),
        shader_model = ?capabilities.shader_model,
        mesh_shader_tier = capabilities.mesh_shader_tier,
        "Rendering with DirectX 12"
    );
    let surface = context
        .create_surface(&window, BACK_BUFFER_COUNT)
        .context("Failed to create swap chain")?;

    let mut renderer = Some(
        Renderer::new(context, surface, settings, scene, mesh).context("Failed to initialize renderer")?,
    );
    info!("Entering main loop");

    let mut frame_error = None;
    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    info!("Close requested, shutting down");
                    elwt.exit();
                }
                Event::AboutToWait => {
                    if let Some(renderer) = renderer.as_mut() {
                        if let Err(e) = renderer.render_frame() {
                            frame_error = Some(e);
                            elwt.exit();
                        }
                    }
                }
                _ => (),
            }
        })
        .context("Event loop failed")?;

    // 渲染器必须在窗口之前释放
    drop(renderer);
    drop(window);
    report_live_objects();

    match frame_error {
        Some(e) => Err(e).context("Frame failed"),
        None => Ok(()),
    }
}

#[cfg(not(target_os = "windows"))]
fn run_windowed(
    _config: &Config,
    _settings: &RendererSettings,
    _scene: SceneConfig,
    _mesh: &MeshData,
) -> anyhow::Result<()> {
    bail!("Windowed rendering requires DirectX 12; use --headless <frames> on this platform")
}

#[cfg(target_os = "windows")]
fn show_fatal_error(message: &str) {
    use windows::core::PCWSTR;
    use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

    eprintln!("{}", message);
    let text: Vec<u16> = message.encode_utf16().chain(Some(0)).collect();
    let caption: Vec<u16> = "MeshRender".encode_utf16().chain(Some(0)).collect();
    unsafe {
        let _ = MessageBoxW(
            None,
            PCWSTR(text.as_ptr()),
            PCWSTR(caption.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

#[cfg(not(target_os = "windows"))]
fn show_fatal_error(message: &str) {
    eprintln!("{}", message);
}
