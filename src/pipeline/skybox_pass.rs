//! Skybox pass
//!
//! Draws a unit cube around the camera with the translation stripped from the
//! view matrix and depth pinned to the far plane, so only pixels no geometry
//! covered show the environment.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{MAIN_COLOR, MAIN_COLOR_FORMAT, MAIN_DEPTH, MAIN_DEPTH_FORMAT, SKYBOX_MAP, TONEMAP_WGSL};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;
use crate::resources::texture::GpuTexture;
use crate::resources::GpuMesh;

pub struct SkyboxPass {
    pipeline: RenderPipelineHandle,
    bind_group: BindGroupHandle,
    cube: GpuMesh,
    size: (u32, u32),
    color: Option<ResourceId>,
    depth: Option<ResourceId>,
}

impl SkyboxPass {
    /// `source` is a cube map: the HDR environment, or an LDR cubemap
    /// loaded from six face images
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        skybox_buffer: BufferHandle,
        cube: GpuMesh,
        source: &GpuTexture,
        size: (u32, u32),
    ) -> BackendResult<Self> {
        let layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX),
            BindGroupLayoutEntry::texture(1, TextureSampleType::Float { filterable: true }, TextureViewDimension::Cube),
            BindGroupLayoutEntry::sampler(2, SamplerBindingType::Filtering),
        ])?;

        let fragment_entry = if source.format.is_float16() {
            "fs_skybox_hdr"
        } else {
            "fs_skybox_ldr"
        };

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Skybox Pipeline".into()),
            shader: format!("{TONEMAP_WGSL}{SKYBOX_SHADER}"),
            vertex_entry: "vs_skybox",
            fragment_entry: Some(fragment_entry),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            polygon_mode: PolygonMode::Fill,
            depth_stencil: Some(DepthStencilState {
                format: MAIN_DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
            }),
            color_targets: vec![ColorTargetState::opaque(MAIN_COLOR_FORMAT)],
        })?;

        let bind_group = backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::buffer(skybox_buffer)),
                (1, BindGroupEntry::Texture(source.view)),
                (2, BindGroupEntry::Sampler(source.sampler)),
            ],
        )?;

        Ok(Self {
            pipeline,
            bind_group,
            cube,
            size,
            color: None,
            depth: None,
        })
    }
}

impl RenderPass for SkyboxPass {
    fn name(&self) -> &str {
        "skybox"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read_named(SKYBOX_MAP, ResourceUsage::TextureRead);
        ctx.read_named(MAIN_COLOR, ResourceUsage::RenderTarget);
        self.depth = ctx.read_named(MAIN_DEPTH, ResourceUsage::DepthStencilRead);
        self.color = ctx.write_named(MAIN_COLOR, ResourceUsage::RenderTarget);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let (Some(color), Some(depth)) = (self.color, self.depth) else {
            return Ok(());
        };
        let color_view = ctx.view(color)?;
        let depth_view = ctx.view(depth)?;
        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Skybox".into()),
            color_attachments: vec![ColorAttachment {
                view: color_view,
                resolve_target: None,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_load_op: LoadOp::Load,
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        backend.set_viewport(0.0, 0.0, self.size.0 as f32, self.size.1 as f32, 0.0, 1.0);
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, self.bind_group);
        self.cube.draw(&mut *backend);

        backend.end_render_pass();
        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.bind_group);
    }
}

const SKYBOX_SHADER: &str = r#"
struct SkyboxUniform {
    view_proj: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> skybox: SkyboxUniform;
@group(0) @binding(1) var environment: texture_cube<f32>;
@group(0) @binding(2) var environment_sampler: sampler;

struct SkyboxOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@vertex
fn vs_skybox(@location(0) position: vec3<f32>) -> SkyboxOutput {
    let clip = skybox.view_proj * vec4<f32>(position, 1.0);
    var out: SkyboxOutput;
    // z = w lands on the far plane
    out.clip_position = clip.xyww;
    out.direction = position;
    return out;
}

@fragment
fn fs_skybox_hdr(in: SkyboxOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(environment, environment_sampler, in.direction, 0.0).rgb;
    return vec4<f32>(tonemap(color), 1.0);
}

@fragment
fn fs_skybox_ldr(in: SkyboxOutput) -> @location(0) vec4<f32> {
    // sRGB faces sample as linear; the main target holds gamma-encoded colour
    let color = textureSampleLevel(environment, environment_sampler, in.direction, 0.0).rgb;
    return vec4<f32>(pow(color, vec3<f32>(1.0 / 2.2)), 1.0);
}
"#;
