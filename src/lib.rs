//! MeshRender - 双缓冲的 DirectX 12 网格着色器渲染器
//!
//! 从 OBJ 文件加载一个静态模型，一次性上传到 GPU 本地内存，
//! 然后每帧通过网格着色器绘制。CPU 与 GPU 之间通过每个帧槽一个 fence 同步，
//! CPU 最多领先 GPU 一帧。
//!
//! # 模块结构
//!
//! - `core`: 配置、日志、场景、错误处理
//! - `math`: 矩阵工具
//! - `geometry`: 顶点、网格、OBJ 加载器
//! - `gfx`: 图形后端抽象、DirectX 12 实现和无窗口实现
//! - `renderer`: 帧循环、常量缓冲区环、同步
//!
//! # 使用示例
//!
//! ```no_run
//! use mesh_render::core::SceneConfig;
//! use mesh_render::geometry::loaders::load_mesh;
//! use mesh_render::gfx::HeadlessDevice;
//! use mesh_render::renderer::{Renderer, RendererSettings};
//! use std::path::{Path, PathBuf};
//!
//! let device = HeadlessDevice::new()?;
//! let surface = device.create_surface(1200, 900, 2)?;
//! let mesh = load_mesh(Path::new("assets/dragon.obj"))?;
//! let settings = RendererSettings {
//!     mesh_shader: PathBuf::from("MeshletMS.cso"),
//!     pixel_shader: PathBuf::from("MeshletPS.cso"),
//!     vsync_interval: 1,
//! };
//!
//! let mut renderer = Renderer::new(device, surface, &settings, SceneConfig::default(), &mesh)?;
//! renderer.render_frame()?;
//! # Ok::<(), mesh_render::core::MeshRenderError>(())
//! ```

pub mod core;
pub mod geometry;
pub mod gfx;
pub mod math;
pub mod renderer;
