//! 网格着色器管线状态
//!
//! 网格着色器管线只能通过管线状态流（pipeline state stream）创建。
//! 流由若干子对象组成，每个子对象是 `类型 + 描述` 并按指针大小对齐。

use std::ffi::c_void;

use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::{set_name, HrContext};
use crate::core::error::Result;
use crate::renderer::pipeline::{
    ColorFormat, CompareFunction, CullMode, DepthFormat, FillMode, FrontFace, PipelineDescriptor,
    ShaderBlob,
};

#[repr(C, align(8))]
struct PipelineSubobject<T> {
    ty: D3D12_PIPELINE_STATE_SUBOBJECT_TYPE,
    desc: T,
}

impl<T> PipelineSubobject<T> {
    fn new(ty: D3D12_PIPELINE_STATE_SUBOBJECT_TYPE, desc: T) -> Self {
        Self { ty, desc }
    }
}

#[repr(C)]
struct MeshPipelineStream {
    root_signature: PipelineSubobject<*mut c_void>,
    mesh_shader: PipelineSubobject<D3D12_SHADER_BYTECODE>,
    pixel_shader: PipelineSubobject<D3D12_SHADER_BYTECODE>,
    blend: PipelineSubobject<D3D12_BLEND_DESC>,
    sample_mask: PipelineSubobject<u32>,
    rasterizer: PipelineSubobject<D3D12_RASTERIZER_DESC>,
    depth_stencil: PipelineSubobject<D3D12_DEPTH_STENCIL_DESC>,
    render_targets: PipelineSubobject<D3D12_RT_FORMAT_ARRAY>,
    depth_format: PipelineSubobject<DXGI_FORMAT>,
    sample_desc: PipelineSubobject<DXGI_SAMPLE_DESC>,
}

/// 根签名 + 管线状态对象
pub struct Dx12Pipeline {
    root_signature: ID3D12RootSignature,
    state: ID3D12PipelineState,
}

impl Dx12Pipeline {
    pub fn new(
        device: &ID3D12Device2,
        mesh_shader: &ShaderBlob,
        pixel_shader: &ShaderBlob,
        descriptor: &PipelineDescriptor,
    ) -> Result<Self> {
        unsafe {
            // 根签名嵌在网格着色器中
            let root_signature: ID3D12RootSignature = device
                .CreateRootSignature(0, mesh_shader.bytes())
                .hr("ID3D12Device::CreateRootSignature")?;

            let mut stream = MeshPipelineStream {
                root_signature: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_ROOT_SIGNATURE,
                    root_signature.as_raw(),
                ),
                mesh_shader: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_MS,
                    bytecode(mesh_shader),
                ),
                pixel_shader: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_PS,
                    bytecode(pixel_shader),
                ),
                blend: PipelineSubobject::new(D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_BLEND, blend_desc(descriptor)),
                sample_mask: PipelineSubobject::new(D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_SAMPLE_MASK, u32::MAX),
                rasterizer: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_RASTERIZER,
                    rasterizer_desc(descriptor),
                ),
                depth_stencil: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_DEPTH_STENCIL,
                    depth_stencil_desc(descriptor),
                ),
                render_targets: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_RENDER_TARGET_FORMATS,
                    render_target_formats(descriptor),
                ),
                depth_format: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_DEPTH_STENCIL_FORMAT,
                    depth_format(descriptor.depth_format),
                ),
                sample_desc: PipelineSubobject::new(
                    D3D12_PIPELINE_STATE_SUBOBJECT_TYPE_SAMPLE_DESC,
                    DXGI_SAMPLE_DESC {
                        Count: descriptor.sample_count,
                        Quality: 0,
                    },
                ),
            };

            let stream_desc = D3D12_PIPELINE_STATE_STREAM_DESC {
                SizeInBytes: std::mem::size_of::<MeshPipelineStream>(),
                pPipelineStateSubobjectStream: &mut stream as *mut MeshPipelineStream as *mut c_void,
            };

            let state: ID3D12PipelineState = device
                .CreatePipelineState(&stream_desc)
                .hr("ID3D12Device2::CreatePipelineState")?;

            if let Some(name) = &descriptor.name {
                set_name(&state, name);
            }

            tracing::info!(
                mesh_shader = %mesh_shader.path().display(),
                pixel_shader = %pixel_shader.path().display(),
                "Mesh shader pipeline created"
            );

            Ok(Self {
                root_signature,
                state,
            })
        }
    }

    pub fn root_signature(&self) -> &ID3D12RootSignature {
        &self.root_signature
    }

    pub fn state(&self) -> &ID3D12PipelineState {
        &self.state
    }
}

fn bytecode(blob: &ShaderBlob) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: blob.bytes().as_ptr() as *const c_void,
        BytecodeLength: blob.bytes().len(),
    }
}

fn blend_desc(descriptor: &PipelineDescriptor) -> D3D12_BLEND_DESC {
    let target = D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: descriptor.blend_enabled.into(),
        LogicOpEnable: false.into(),
        SrcBlend: D3D12_BLEND_ONE,
        DestBlend: D3D12_BLEND_ZERO,
        BlendOp: D3D12_BLEND_OP_ADD,
        SrcBlendAlpha: D3D12_BLEND_ONE,
        DestBlendAlpha: D3D12_BLEND_ZERO,
        BlendOpAlpha: D3D12_BLEND_OP_ADD,
        LogicOp: D3D12_LOGIC_OP_NOOP,
        RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
    };

    D3D12_BLEND_DESC {
        AlphaToCoverageEnable: false.into(),
        IndependentBlendEnable: false.into(),
        RenderTarget: [target; 8],
    }
}

fn rasterizer_desc(descriptor: &PipelineDescriptor) -> D3D12_RASTERIZER_DESC {
    D3D12_RASTERIZER_DESC {
        FillMode: match descriptor.fill_mode {
            FillMode::Solid => D3D12_FILL_MODE_SOLID,
            FillMode::Wireframe => D3D12_FILL_MODE_WIREFRAME,
        },
        CullMode: match descriptor.cull_mode {
            CullMode::None => D3D12_CULL_MODE_NONE,
            CullMode::Front => D3D12_CULL_MODE_FRONT,
            CullMode::Back => D3D12_CULL_MODE_BACK,
        },
        FrontCounterClockwise: (descriptor.front_face == FrontFace::CounterClockwise).into(),
        DepthBias: D3D12_DEFAULT_DEPTH_BIAS as i32,
        DepthBiasClamp: D3D12_DEFAULT_DEPTH_BIAS_CLAMP,
        SlopeScaledDepthBias: D3D12_DEFAULT_SLOPE_SCALED_DEPTH_BIAS,
        DepthClipEnable: true.into(),
        MultisampleEnable: false.into(),
        AntialiasedLineEnable: false.into(),
        ForcedSampleCount: 0,
        ConservativeRaster: D3D12_CONSERVATIVE_RASTERIZATION_MODE_OFF,
    }
}

fn depth_stencil_desc(descriptor: &PipelineDescriptor) -> D3D12_DEPTH_STENCIL_DESC {
    let stencil_op = D3D12_DEPTH_STENCILOP_DESC {
        StencilFailOp: D3D12_STENCIL_OP_KEEP,
        StencilDepthFailOp: D3D12_STENCIL_OP_KEEP,
        StencilPassOp: D3D12_STENCIL_OP_KEEP,
        StencilFunc: D3D12_COMPARISON_FUNC_ALWAYS,
    };

    D3D12_DEPTH_STENCIL_DESC {
        DepthEnable: true.into(),
        DepthWriteMask: if descriptor.depth_write {
            D3D12_DEPTH_WRITE_MASK_ALL
        } else {
            D3D12_DEPTH_WRITE_MASK_ZERO
        },
        DepthFunc: match descriptor.depth_compare {
            CompareFunction::Less => D3D12_COMPARISON_FUNC_LESS,
            CompareFunction::LessEqual => D3D12_COMPARISON_FUNC_LESS_EQUAL,
            CompareFunction::Always => D3D12_COMPARISON_FUNC_ALWAYS,
        },
        StencilEnable: false.into(),
        StencilReadMask: D3D12_DEFAULT_STENCIL_READ_MASK as u8,
        StencilWriteMask: D3D12_DEFAULT_STENCIL_WRITE_MASK as u8,
        FrontFace: stencil_op,
        BackFace: stencil_op,
    }
}

fn render_target_formats(descriptor: &PipelineDescriptor) -> D3D12_RT_FORMAT_ARRAY {
    let mut formats = [DXGI_FORMAT_UNKNOWN; 8];
    formats[0] = color_format(descriptor.color_format);
    D3D12_RT_FORMAT_ARRAY {
        RTFormats: formats,
        NumRenderTargets: 1,
    }
}

pub(crate) fn color_format(format: ColorFormat) -> DXGI_FORMAT {
    match format {
        ColorFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
    }
}

pub(crate) fn depth_format(format: DepthFormat) -> DXGI_FORMAT {
    match format {
        DepthFormat::Depth32Float => DXGI_FORMAT_D32_FLOAT,
    }
}
