//! 无窗口设备实现

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use super::live::{LiveGuard, LiveObjects};
use super::timeline::TimelineCounter;
use super::{GpuEvent, DXGI_ERROR_DEVICE_REMOVED, E_FAIL, E_INVALIDARG};
use crate::core::error::{GraphicsError, HResult, Result};
use crate::gfx::adapter::DeviceCapabilities;
use crate::gfx::backend::{GpuBuffer, GpuDevice, GpuFence, PresentSurface};
use crate::renderer::command::{CommandBufferState, CommandRecorder, Viewport};
use crate::renderer::pipeline::{PipelineDescriptor, ShaderBlob};
use crate::renderer::resource::{
    align_to, BufferDescriptor, MemoryType, ResourceState, Transition, CONSTANT_BUFFER_ALIGNMENT,
};

/// 编译后的着色器容器以 "DXBC" 开头（DXIL 也使用同一容器格式）
const SHADER_CONTAINER_MAGIC: &[u8] = b"DXBC";

/// 虚拟地址的起点和资源对齐
const ADDRESS_BASE: u64 = 0x1_0000_0000;
const RESOURCE_ALIGNMENT: u64 = 64 * 1024;

fn call_error(operation: &'static str, code: i32) -> GraphicsError {
    GraphicsError::Call {
        operation,
        code: HResult(code),
    }
}

/// CPU 与 GPU 线程共享的状态
struct Shared {
    executed_serial: AtomicU64,
    validation_errors: Mutex<Vec<String>>,
    events: Mutex<Vec<GpuEvent>>,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl Shared {
    fn report(&self, message: String) {
        warn!(target: "headless", "{}", message);
        self.validation_errors.lock().push(message);
    }

    fn record(&self, event: GpuEvent) {
        self.events.lock().push(event);
    }

    fn executed(&self) -> u64 {
        self.executed_serial.load(Ordering::SeqCst)
    }

    fn wait_while_paused(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.resumed.wait(&mut paused);
        }
    }

    fn resume(&self) {
        *self.paused.lock() = false;
        self.resumed.notify_all();
    }
}

struct BufferInner {
    name: String,
    size: u64,
    memory: MemoryType,
    address: u64,
    data: Mutex<Vec<u8>>,
    state: Mutex<ResourceState>,
    /// GPU 尚未执行的常量读取：(偏移, 提交序号)
    pending_reads: Mutex<Vec<(u64, u64)>>,
    shared: Arc<Shared>,
    _live: LiveGuard,
}

/// 无窗口设备上的缓冲区
pub struct HeadlessBuffer {
    inner: Arc<BufferInner>,
}

impl GpuBuffer for HeadlessBuffer {
    fn size(&self) -> u64 {
        self.inner.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let inner = &self.inner;
        if inner.memory != MemoryType::Upload {
            return Err(call_error("ID3D12Resource::Map", E_INVALIDARG).into());
        }

        let end = offset + data.len() as u64;
        if end > inner.size {
            return Err(GraphicsError::ResourceCreation(format!(
                "{}: write of {}..{} exceeds {} bytes",
                inner.name, offset, end, inner.size
            ))
            .into());
        }

        let executed = inner.shared.executed();
        let mut pending = inner.pending_reads.lock();
        pending.retain(|&(_, serial)| serial > executed);
        for &(read_offset, serial) in pending.iter() {
            if read_offset < end && offset < read_offset + CONSTANT_BUFFER_ALIGNMENT {
                inner.shared.report(format!(
                    "{}: CPU write to bytes {}..{} while submission {} still reads offset {}",
                    inner.name, offset, end, serial, read_offset
                ));
            }
        }
        drop(pending);

        inner.data.lock()[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn gpu_address(&self) -> u64 {
        self.inner.address
    }
}

/// 无窗口设备上的 fence
pub struct HeadlessFence {
    counter: Arc<TimelineCounter>,
    _live: LiveGuard,
}

impl GpuFence for HeadlessFence {
    fn completed_value(&self) -> u64 {
        self.counter.value()
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        self.counter.wait_for(value);
        Ok(())
    }
}

/// 管线状态对象
pub struct HeadlessPipeline {
    _live: LiveGuard,
}

struct ImageInner {
    label: String,
    state: Mutex<ResourceState>,
    _live: LiveGuard,
}

impl ImageInner {
    fn new(label: String, state: ResourceState, live: &LiveObjects) -> Arc<Self> {
        Arc::new(Self {
            label,
            state: Mutex::new(state),
            _live: live.track(),
        })
    }

    fn expect_state(&self, shared: &Shared, expected: ResourceState, command: &str) {
        let actual = *self.state.lock();
        if actual != expected {
            shared.report(format!(
                "{}: {} requires state {}, found {}",
                self.label, command, expected, actual
            ));
        }
    }
}

/// 呈现表面：N 个后台缓冲区加一个深度缓冲区
pub struct HeadlessSurface {
    queue: Sender<Work>,
    images: Vec<Arc<ImageInner>>,
    depth: Arc<ImageInner>,
    current: usize,
    extent: (u32, u32),
    _live: LiveGuard,
}

impl PresentSurface for HeadlessSurface {
    fn buffer_count(&self) -> usize {
        self.images.len()
    }

    fn current_index(&self) -> usize {
        self.current
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn present(&mut self, sync_interval: u32) -> Result<usize> {
        let index = self.current;
        self.queue
            .send(Work::Present {
                index,
                image: Arc::clone(&self.images[index]),
            })
            .map_err(|_| call_error("IDXGISwapChain::Present", DXGI_ERROR_DEVICE_REMOVED))?;

        self.current = (self.current + 1) % self.images.len();
        trace!(index, sync_interval, next = self.current, "Present");
        Ok(self.current)
    }
}

/// 录制的命令
enum Command {
    SetPipeline,
    SetViewport(Viewport),
    Copy {
        dst: Arc<BufferInner>,
        src: Arc<BufferInner>,
    },
    BufferBarrier {
        buffer: Arc<BufferInner>,
        transition: Transition,
    },
    ImageBarrier {
        index: usize,
        image: Arc<ImageInner>,
        transition: Transition,
    },
    SetRenderTarget {
        index: usize,
        image: Arc<ImageInner>,
        depth: Arc<ImageInner>,
    },
    ClearRenderTarget {
        index: usize,
        image: Arc<ImageInner>,
    },
    ClearDepth {
        depth: Arc<ImageInner>,
    },
    BindConstants {
        buffer: Arc<BufferInner>,
        offset: u64,
    },
    BindGeometry {
        vertices: Arc<BufferInner>,
        indices: Arc<BufferInner>,
    },
    DispatchMesh {
        groups: u32,
    },
}

/// 命令分配器 + 命令列表
pub struct HeadlessCommandSlot {
    shared: Arc<Shared>,
    state: CommandBufferState,
    commands: Vec<Command>,
    last_submission: Option<u64>,
    _live: LiveGuard,
}

impl HeadlessCommandSlot {
    fn push(&mut self, name: &str, command: Command) -> Result<()> {
        self.state.require_recording(name)?;
        self.commands.push(command);
        Ok(())
    }
}

impl CommandRecorder<HeadlessDevice> for HeadlessCommandSlot {
    fn state(&self) -> CommandBufferState {
        self.state
    }

    fn reset(&mut self, pipeline: Option<&HeadlessPipeline>) -> Result<()> {
        if let Some(serial) = self.last_submission {
            if serial > self.shared.executed() {
                self.shared.report(format!(
                    "Command allocator reset while submission {} is still executing",
                    serial
                ));
                return Err(call_error("ID3D12CommandAllocator::Reset", E_FAIL).into());
            }
        }

        self.state.begin_recording()?;
        self.commands.clear();
        if pipeline.is_some() {
            self.commands.push(Command::SetPipeline);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.finish_recording()
    }

    fn copy_buffer(&mut self, dst: &HeadlessBuffer, src: &HeadlessBuffer) -> Result<()> {
        self.push(
            "CopyResource",
            Command::Copy {
                dst: Arc::clone(&dst.inner),
                src: Arc::clone(&src.inner),
            },
        )
    }

    fn buffer_barrier(&mut self, buffer: &HeadlessBuffer, transition: Transition) -> Result<()> {
        self.push(
            "ResourceBarrier",
            Command::BufferBarrier {
                buffer: Arc::clone(&buffer.inner),
                transition,
            },
        )
    }

    fn back_buffer_barrier(
        &mut self,
        surface: &HeadlessSurface,
        index: usize,
        transition: Transition,
    ) -> Result<()> {
        let image = surface_image(surface, index)?;
        self.push("ResourceBarrier", Command::ImageBarrier { index, image, transition })
    }

    fn set_pipeline(&mut self, _pipeline: &HeadlessPipeline) -> Result<()> {
        self.push("SetPipelineState", Command::SetPipeline)
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.push("RSSetViewports", Command::SetViewport(*viewport))
    }

    fn set_render_target(&mut self, surface: &HeadlessSurface, index: usize) -> Result<()> {
        let image = surface_image(surface, index)?;
        self.push(
            "OMSetRenderTargets",
            Command::SetRenderTarget {
                index,
                image,
                depth: Arc::clone(&surface.depth),
            },
        )
    }

    fn clear_render_target(&mut self, surface: &HeadlessSurface, index: usize, _color: [f32; 4]) -> Result<()> {
        let image = surface_image(surface, index)?;
        self.push("ClearRenderTargetView", Command::ClearRenderTarget { index, image })
    }

    fn clear_depth(&mut self, surface: &HeadlessSurface, _depth: f32) -> Result<()> {
        self.push(
            "ClearDepthStencilView",
            Command::ClearDepth {
                depth: Arc::clone(&surface.depth),
            },
        )
    }

    fn bind_constants(&mut self, buffer: &HeadlessBuffer, offset: u64) -> Result<()> {
        self.push(
            "SetGraphicsRootConstantBufferView",
            Command::BindConstants {
                buffer: Arc::clone(&buffer.inner),
                offset,
            },
        )
    }

    fn bind_geometry(&mut self, vertices: &HeadlessBuffer, indices: &HeadlessBuffer) -> Result<()> {
        self.push(
            "SetGraphicsRootShaderResourceView",
            Command::BindGeometry {
                vertices: Arc::clone(&vertices.inner),
                indices: Arc::clone(&indices.inner),
            },
        )
    }

    fn dispatch_mesh(&mut self, groups: u32) -> Result<()> {
        self.push("DispatchMesh", Command::DispatchMesh { groups })
    }
}

fn surface_image(surface: &HeadlessSurface, index: usize) -> Result<Arc<ImageInner>> {
    surface
        .images
        .get(index)
        .cloned()
        .ok_or_else(|| call_error("IDXGISwapChain::GetBuffer", E_INVALIDARG).into())
}

/// 发送给 GPU 线程的工作
enum Work {
    Execute { serial: u64, commands: Vec<Command> },
    Signal { counter: Arc<TimelineCounter>, value: u64 },
    Present { index: usize, image: Arc<ImageInner> },
    Shutdown,
}

/// 暂停 GPU 线程，释放时恢复
pub struct PauseGuard {
    shared: Arc<Shared>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.shared.resume();
    }
}

/// 无窗口软件设备
pub struct HeadlessDevice {
    shared: Arc<Shared>,
    queue: Sender<Work>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_serial: AtomicU64,
    next_address: AtomicU64,
    capabilities: DeviceCapabilities,
    live: LiveObjects,
    _live: LiveGuard,
}

impl HeadlessDevice {
    /// 无窗口设备报告的能力
    pub const CAPABILITIES: DeviceCapabilities = DeviceCapabilities {
        feature_level: (12, 1),
        shader_model: (6, 5),
        mesh_shader_tier: 1,
    };

    pub fn new() -> Result<Self> {
        Self::with_capabilities(Self::CAPABILITIES)
    }

    /// 以给定能力创建设备，能力不满足最低要求时失败
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Result<Self> {
        capabilities.validate()?;

        let shared = Arc::new(Shared {
            executed_serial: AtomicU64::new(0),
            validation_errors: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            paused: Mutex::new(false),
            resumed: Condvar::new(),
        });

        let (queue, receiver) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("headless-gpu".to_string())
            .spawn(move || run_worker(worker_shared, receiver))
            .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to start GPU thread: {}", e)))?;

        let live = LiveObjects::new();
        let guard = live.track();

        info!(
            feature_level = ?capabilities.feature_level,
            shader_model = ?capabilities.shader_model,
            "Headless device created"
        );

        Ok(Self {
            shared,
            queue,
            worker: Mutex::new(Some(worker)),
            next_serial: AtomicU64::new(0),
            next_address: AtomicU64::new(ADDRESS_BASE),
            capabilities,
            live,
            _live: guard,
        })
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// 创建呈现表面，后台缓冲区从 Present 状态开始
    pub fn create_surface(&self, width: u32, height: u32, buffer_count: usize) -> Result<HeadlessSurface> {
        if width == 0 || height == 0 || !(2..=16).contains(&buffer_count) {
            return Err(call_error("IDXGIFactory2::CreateSwapChainForHwnd", E_INVALIDARG).into());
        }

        let images = (0..buffer_count)
            .map(|i| ImageInner::new(format!("Back Buffer {}", i), ResourceState::Present, &self.live))
            .collect();
        let depth = ImageInner::new("Depth Buffer".to_string(), ResourceState::DepthWrite, &self.live);

        debug!(width, height, buffers = buffer_count, "Headless surface created");
        Ok(HeadlessSurface {
            queue: self.queue.clone(),
            images,
            depth,
            current: 0,
            extent: (width, height),
            _live: self.live.track(),
        })
    }

    /// 存活对象计数，设备释放后仍然有效
    pub fn live_objects(&self) -> LiveObjects {
        self.live.clone()
    }

    /// 暂停 GPU 线程
    pub fn pause(&self) -> PauseGuard {
        *self.shared.paused.lock() = true;
        PauseGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// 模拟设备移除
    ///
    /// 已提交的工作照常执行完，之后 GPU 线程退出。此后的提交和 Present
    /// 都返回 `DXGI_ERROR_DEVICE_REMOVED`。
    pub fn remove_device(&self) {
        self.shared.resume();
        let _ = self.queue.send(Work::Shutdown);
        self.join_worker();
        warn!("Headless device removed");
    }

    fn join_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Headless GPU thread panicked");
            }
        }
    }

    /// 阻塞直到之前提交的所有工作完成
    pub fn wait_idle(&self) -> Result<()> {
        let counter = Arc::new(TimelineCounter::new(0));
        self.submit(
            Work::Signal {
                counter: Arc::clone(&counter),
                value: 1,
            },
            "ID3D12CommandQueue::Signal",
        )?;
        counter.wait_for(1);
        Ok(())
    }

    /// 读取缓冲区当前内容（GPU 线程执行到的位置）
    pub fn read_buffer(&self, buffer: &HeadlessBuffer) -> Vec<u8> {
        buffer.inner.data.lock().clone()
    }

    pub fn validation_errors(&self) -> Vec<String> {
        self.shared.validation_errors.lock().clone()
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        self.shared.events.lock().clone()
    }

    fn submit(&self, work: Work, operation: &'static str) -> Result<()> {
        self.queue
            .send(work)
            .map_err(|_| call_error(operation, DXGI_ERROR_DEVICE_REMOVED).into())
    }
}

impl GpuDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Fence = HeadlessFence;
    type Pipeline = HeadlessPipeline;
    type Surface = HeadlessSurface;
    type CommandSlot = HeadlessCommandSlot;

    fn backend_name(&self) -> &'static str {
        "Headless"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<HeadlessBuffer> {
        let size = descriptor.aligned_size();
        if size == 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "{}: buffer size must not be zero",
                descriptor.label()
            ))
            .into());
        }

        let address = self
            .next_address
            .fetch_add(align_to(size, RESOURCE_ALIGNMENT), Ordering::SeqCst);

        Ok(HeadlessBuffer {
            inner: Arc::new(BufferInner {
                name: descriptor.label().to_string(),
                size,
                memory: descriptor.memory_type,
                address,
                data: Mutex::new(vec![0; size as usize]),
                state: Mutex::new(descriptor.initial_state),
                pending_reads: Mutex::new(Vec::new()),
                shared: Arc::clone(&self.shared),
                _live: self.live.track(),
            }),
        })
    }

    fn create_fence(&self, initial_value: u64) -> Result<HeadlessFence> {
        Ok(HeadlessFence {
            counter: Arc::new(TimelineCounter::new(initial_value)),
            _live: self.live.track(),
        })
    }

    fn create_pipeline(
        &self,
        mesh_shader: &ShaderBlob,
        pixel_shader: &ShaderBlob,
        descriptor: &PipelineDescriptor,
    ) -> Result<HeadlessPipeline> {
        // 根签名从网格着色器容器中提取
        if !mesh_shader.bytes().starts_with(SHADER_CONTAINER_MAGIC) {
            return Err(call_error("ID3D12Device::CreateRootSignature", E_INVALIDARG).into());
        }
        if !pixel_shader.bytes().starts_with(SHADER_CONTAINER_MAGIC) {
            return Err(call_error("ID3D12Device2::CreatePipelineState", E_INVALIDARG).into());
        }

        // 交换链和深度缓冲区都是单采样
        if descriptor.sample_count != 1 {
            return Err(call_error("ID3D12Device2::CreatePipelineState", E_INVALIDARG).into());
        }

        debug!(name = ?descriptor.name, "Headless pipeline created");
        Ok(HeadlessPipeline {
            _live: self.live.track(),
        })
    }

    fn create_command_slot(&self, _pipeline: &HeadlessPipeline) -> Result<HeadlessCommandSlot> {
        Ok(HeadlessCommandSlot {
            shared: Arc::clone(&self.shared),
            state: CommandBufferState::Initial,
            commands: Vec::new(),
            last_submission: None,
            _live: self.live.track(),
        })
    }

    fn execute(&self, commands: &mut HeadlessCommandSlot) -> Result<()> {
        commands.state.submit()?;
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst) + 1;

        for command in &commands.commands {
            if let Command::BindConstants { buffer, offset } = command {
                buffer.pending_reads.lock().push((*offset, serial));
            }
        }

        commands.last_submission = Some(serial);
        self.submit(
            Work::Execute {
                serial,
                commands: std::mem::take(&mut commands.commands),
            },
            "ID3D12CommandQueue::ExecuteCommandLists",
        )
    }

    fn signal(&self, fence: &HeadlessFence, value: u64) -> Result<()> {
        self.submit(
            Work::Signal {
                counter: Arc::clone(&fence.counter),
                value,
            },
            "ID3D12CommandQueue::Signal",
        )
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        self.shared.resume();
        let _ = self.queue.send(Work::Shutdown);
        self.join_worker();
        info!(errors = self.shared.validation_errors.lock().len(), "Headless device destroyed");
    }
}

/// GPU 线程：按提交顺序执行工作
fn run_worker(shared: Arc<Shared>, receiver: Receiver<Work>) {
    let mut displayed: Option<usize> = None;

    while let Ok(work) = receiver.recv() {
        shared.wait_while_paused();
        match work {
            Work::Execute { serial, commands } => {
                execute_commands(&shared, &commands, displayed);
                shared.executed_serial.store(serial, Ordering::SeqCst);
            }
            Work::Signal { counter, value } => counter.signal(value),
            Work::Present { index, image } => {
                image.expect_state(&shared, ResourceState::Present, "Present");
                displayed = Some(index);
                shared.record(GpuEvent::Present { index });
            }
            Work::Shutdown => break,
        }
    }
}

#[derive(Default)]
struct Bindings {
    pipeline: bool,
    viewport: Option<Viewport>,
    target: Option<(usize, Arc<ImageInner>)>,
    constants: Option<u64>,
    geometry: Option<(Arc<BufferInner>, Arc<BufferInner>)>,
}

fn check_not_displayed(shared: &Shared, index: usize, displayed: Option<usize>, command: &str) {
    if displayed == Some(index) {
        shared.report(format!(
            "Back Buffer {}: {} writes to the image currently displayed",
            index, command
        ));
    }
}

fn apply_transition(shared: &Shared, label: &str, state: &Mutex<ResourceState>, transition: Transition) {
    let mut current = state.lock();
    if *current != transition.before {
        shared.report(format!(
            "{}: barrier expects {} but resource is in {}",
            label, transition.before, *current
        ));
    }
    *current = transition.after;
}

fn execute_commands(shared: &Shared, commands: &[Command], displayed: Option<usize>) {
    let mut bindings = Bindings::default();

    for command in commands {
        match command {
            Command::SetPipeline => bindings.pipeline = true,
            Command::SetViewport(viewport) => bindings.viewport = Some(*viewport),
            Command::Copy { dst, src } => {
                if Arc::ptr_eq(dst, src) {
                    shared.report(format!("{}: copy source and destination are the same", dst.name));
                    continue;
                }
                let dst_state = *dst.state.lock();
                if dst_state != ResourceState::CopyDest {
                    shared.report(format!(
                        "{}: copy destination must be in {}, found {}",
                        dst.name,
                        ResourceState::CopyDest,
                        dst_state
                    ));
                }
                if src.size > dst.size {
                    shared.report(format!(
                        "{}: copy of {} bytes into {} bytes",
                        dst.name, src.size, dst.size
                    ));
                    continue;
                }
                let source = src.data.lock();
                dst.data.lock()[..source.len()].copy_from_slice(&source);
            }
            Command::BufferBarrier { buffer, transition } => {
                apply_transition(shared, &buffer.name, &buffer.state, *transition);
            }
            Command::ImageBarrier { index, image, transition } => {
                apply_transition(shared, &image.label, &image.state, *transition);
                shared.record(GpuEvent::ImageTransition {
                    index: *index,
                    before: transition.before,
                    after: transition.after,
                });
            }
            Command::SetRenderTarget { index, image, depth } => {
                image.expect_state(shared, ResourceState::RenderTarget, "OMSetRenderTargets");
                depth.expect_state(shared, ResourceState::DepthWrite, "OMSetRenderTargets");
                check_not_displayed(shared, *index, displayed, "OMSetRenderTargets");
                bindings.target = Some((*index, Arc::clone(image)));
            }
            Command::ClearRenderTarget { index, image } => {
                image.expect_state(shared, ResourceState::RenderTarget, "ClearRenderTargetView");
                check_not_displayed(shared, *index, displayed, "ClearRenderTargetView");
            }
            Command::ClearDepth { depth } => {
                depth.expect_state(shared, ResourceState::DepthWrite, "ClearDepthStencilView");
            }
            Command::BindConstants { buffer, offset } => {
                bindings.constants = Some(buffer.address + offset);
            }
            Command::BindGeometry { vertices, indices } => {
                bindings.geometry = Some((Arc::clone(vertices), Arc::clone(indices)));
            }
            Command::DispatchMesh { groups } => dispatch(shared, &bindings, *groups, displayed),
        }
    }
}

fn dispatch(shared: &Shared, bindings: &Bindings, groups: u32, displayed: Option<usize>) {
    if !bindings.pipeline {
        shared.report("DispatchMesh: no pipeline state bound".to_string());
    }

    if let Some((vertices, indices)) = &bindings.geometry {
        for buffer in [vertices, indices] {
            let state = *buffer.state.lock();
            if state != ResourceState::ShaderResource {
                shared.report(format!(
                    "{}: DispatchMesh reads it in {}, expected {}",
                    buffer.name,
                    state,
                    ResourceState::ShaderResource
                ));
            }
        }
    } else {
        shared.report("DispatchMesh: geometry not bound".to_string());
    }

    let (viewport, (index, image), constants) =
        match (bindings.viewport, &bindings.target, bindings.constants) {
            (Some(viewport), Some(target), Some(constants)) => (viewport, target, constants),
            _ => {
                shared.report("DispatchMesh: viewport, render target and constants must be bound".to_string());
                return;
            }
        };

    image.expect_state(shared, ResourceState::RenderTarget, "DispatchMesh");
    check_not_displayed(shared, *index, displayed, "DispatchMesh");

    shared.record(GpuEvent::Dispatch {
        groups,
        constants_address: constants,
        render_target: *index,
        viewport,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MeshRenderError;
    use crate::renderer::resource::BufferUsage;

    fn blob(bytes: &[u8]) -> ShaderBlob {
        ShaderBlob::from_bytes("test.cso", bytes.to_vec())
    }

    fn pipeline(device: &HeadlessDevice) -> HeadlessPipeline {
        device
            .create_pipeline(&blob(b"DXBC ms"), &blob(b"DXBC ps"), &PipelineDescriptor::default())
            .unwrap()
    }

    #[test]
    fn test_unsupported_hardware_is_rejected() {
        let caps = DeviceCapabilities {
            mesh_shader_tier: 0,
            ..HeadlessDevice::CAPABILITIES
        };
        assert!(matches!(
            HeadlessDevice::with_capabilities(caps),
            Err(MeshRenderError::Graphics(GraphicsError::UnsupportedHardware(_)))
        ));
    }

    #[test]
    fn test_pipeline_requires_shader_container() {
        let device = HeadlessDevice::new().unwrap();
        let err = device
            .create_pipeline(&blob(b"garbage"), &blob(b"DXBC"), &PipelineDescriptor::default())
            .err()
            .unwrap();
        assert_eq!(err.status_code(), Some(E_INVALIDARG));
        assert!(err.to_string().contains("CreateRootSignature"));
    }

    #[test]
    fn test_multisampled_pipeline_is_rejected() {
        let device = HeadlessDevice::new().unwrap();
        let descriptor = PipelineDescriptor {
            sample_count: 4,
            ..PipelineDescriptor::default()
        };
        let err = device
            .create_pipeline(&blob(b"DXBC ms"), &blob(b"DXBC ps"), &descriptor)
            .err()
            .unwrap();
        assert_eq!(err.status_code(), Some(E_INVALIDARG));
        assert_eq!(device.live_objects().count(), 1);
    }

    #[test]
    fn test_device_local_memory_is_not_mappable() {
        let device = HeadlessDevice::new().unwrap();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::Vertex, MemoryType::DeviceLocal))
            .unwrap();
        assert!(buffer.write(0, &[1, 2, 3]).is_err());

        let upload = device
            .create_buffer(&BufferDescriptor::new(4, BufferUsage::Staging, MemoryType::Upload))
            .unwrap();
        assert!(upload.write(2, &[1, 2, 3]).is_err());
        upload.write(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.read_buffer(&upload), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fence_signal_follows_queue_order() {
        let device = HeadlessDevice::new().unwrap();
        let fence = device.create_fence(0).unwrap();

        device.signal(&fence, 3).unwrap();
        fence.wait_for(3).unwrap();
        assert_eq!(fence.completed_value(), 3);
    }

    #[test]
    fn test_removed_device_rejects_work() {
        let device = HeadlessDevice::new().unwrap();
        let mut surface = device.create_surface(64, 64, 2).unwrap();
        let fence = device.create_fence(0).unwrap();

        // 移除前提交的工作仍然完成
        device.signal(&fence, 1).unwrap();
        device.remove_device();
        assert_eq!(fence.completed_value(), 1);

        let err = device.signal(&fence, 2).err().unwrap();
        assert_eq!(err.status_code(), Some(DXGI_ERROR_DEVICE_REMOVED));
        let err = surface.present(1).err().unwrap();
        assert_eq!(err.status_code(), Some(DXGI_ERROR_DEVICE_REMOVED));
        assert_eq!(surface.current_index(), 0);
        assert!(device.wait_idle().is_err());
    }

    #[test]
    fn test_reset_while_executing_is_rejected() {
        let device = HeadlessDevice::new().unwrap();
        let pipeline = pipeline(&device);
        let mut slot = device.create_command_slot(&pipeline).unwrap();

        let pause = device.pause();
        slot.reset(None).unwrap();
        slot.close().unwrap();
        device.execute(&mut slot).unwrap();

        let err = slot.reset(None).err().unwrap();
        assert_eq!(err.status_code(), Some(E_FAIL));
        assert_eq!(device.validation_errors().len(), 1);

        drop(pause);
        device.wait_idle().unwrap();
        slot.reset(None).unwrap();
    }

    #[test]
    fn test_execute_requires_closed_list() {
        let device = HeadlessDevice::new().unwrap();
        let pipeline = pipeline(&device);
        let mut slot = device.create_command_slot(&pipeline).unwrap();

        assert!(device.execute(&mut slot).is_err());
        slot.reset(Some(&pipeline)).unwrap();
        assert!(device.execute(&mut slot).is_err());
        assert!(slot.close().is_ok());
        assert!(slot.dispatch_mesh(1).is_err());
    }

    #[test]
    fn test_mismatched_barrier_is_reported() {
        let device = HeadlessDevice::new().unwrap();
        let pipeline = pipeline(&device);
        let mut slot = device.create_command_slot(&pipeline).unwrap();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::Index, MemoryType::DeviceLocal))
            .unwrap();

        slot.reset(None).unwrap();
        slot.buffer_barrier(
            &buffer,
            Transition::new(ResourceState::ShaderResource, ResourceState::CopyDest),
        )
        .unwrap();
        slot.close().unwrap();
        device.execute(&mut slot).unwrap();
        device.wait_idle().unwrap();

        let errors = device.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("barrier expects ShaderResource"));
    }

    #[test]
    fn test_writing_displayed_image_is_reported() {
        let device = HeadlessDevice::new().unwrap();
        let pipeline = pipeline(&device);
        let mut slot = device.create_command_slot(&pipeline).unwrap();
        let mut surface = device.create_surface(64, 64, 2).unwrap();

        assert_eq!(surface.present(1).unwrap(), 1);

        // 图像 0 正在显示，仍然渲染到它
        slot.reset(Some(&pipeline)).unwrap();
        slot.back_buffer_barrier(
            &surface,
            0,
            Transition::new(ResourceState::Present, ResourceState::RenderTarget),
        )
        .unwrap();
        slot.clear_render_target(&surface, 0, [0.0; 4]).unwrap();
        slot.close().unwrap();
        device.execute(&mut slot).unwrap();
        device.wait_idle().unwrap();

        let errors = device.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("currently displayed"));
    }

    #[test]
    fn test_constant_overwrite_while_in_flight_is_reported() {
        let device = HeadlessDevice::new().unwrap();
        let pipeline = pipeline(&device);
        let mut slot = device.create_command_slot(&pipeline).unwrap();
        let constants = device
            .create_buffer(&BufferDescriptor::new(512, BufferUsage::Constant, MemoryType::Upload))
            .unwrap();

        let pause = device.pause();
        slot.reset(None).unwrap();
        slot.bind_constants(&constants, 256).unwrap();
        slot.close().unwrap();
        device.execute(&mut slot).unwrap();

        // 另一个槽可以写
        constants.write(0, &[0; 16]).unwrap();
        assert!(device.validation_errors().is_empty());

        constants.write(256, &[0; 16]).unwrap();
        assert_eq!(device.validation_errors().len(), 1);

        drop(pause);
        device.wait_idle().unwrap();
        constants.write(256, &[0; 16]).unwrap();
        assert_eq!(device.validation_errors().len(), 1);
    }

    #[test]
    fn test_live_objects_are_released() {
        let device = HeadlessDevice::new().unwrap();
        let live = device.live_objects();
        let surface = device.create_surface(64, 64, 2).unwrap();
        let fence = device.create_fence(0).unwrap();

        // 设备 + 表面 + 2 个后台缓冲区 + 深度缓冲区 + fence
        assert_eq!(live.count(), 6);

        drop(fence);
        drop(surface);
        drop(device);
        assert_eq!(live.count(), 0);
    }

    #[test]
    fn test_invalid_surface() {
        let device = HeadlessDevice::new().unwrap();
        assert!(device.create_surface(0, 64, 2).is_err());
        assert!(device.create_surface(64, 64, 1).is_err());
    }
}
