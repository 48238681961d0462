//! G-buffer generation pass for deferred rendering
//!
//! Renders every object into the six G-buffer slots (MRT):
//! - World position (alpha 1 marks covered pixels)
//! - World normal, perturbed by the normal map in textured mode
//! - Linear albedo
//! - Metallic, roughness and ambient occlusion, one slot each
//!
//! No lighting happens here.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{GBufferSlot, SceneLayouts, CAMERA_WGSL, GBUFFER_DEPTH, GBUFFER_DEPTH_FORMAT, GBUFFER_FORMAT, OBJECT_WGSL};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

pub struct GeometryPass {
    fill_pipeline: RenderPipelineHandle,
    /// `None` when the device cannot rasterize lines
    line_pipeline: Option<RenderPipelineHandle>,
    camera: BindGroupHandle,
    size: (u32, u32),
    slots: Vec<ResourceId>,
    depth: Option<ResourceId>,
}

impl GeometryPass {
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        layouts: &SceneLayouts,
        camera: BindGroupHandle,
        size: (u32, u32),
    ) -> BackendResult<Self> {
        let fill_pipeline = backend.create_render_pipeline(&Self::pipeline_desc(layouts, PolygonMode::Fill))?;

        let line_pipeline = if backend.features().polygon_mode_line {
            Some(backend.create_render_pipeline(&Self::pipeline_desc(layouts, PolygonMode::Line))?)
        } else {
            log::warn!("Line polygon mode unsupported, wireframe toggle has no effect");
            None
        };

        Ok(Self {
            fill_pipeline,
            line_pipeline,
            camera,
            size,
            slots: Vec::new(),
            depth: None,
        })
    }

    fn pipeline_desc(layouts: &SceneLayouts, polygon_mode: PolygonMode) -> RenderPipelineDescriptor {
        let label = match polygon_mode {
            PolygonMode::Fill => "Geometry Pipeline",
            PolygonMode::Line => "Geometry Wireframe Pipeline",
        };
        RenderPipelineDescriptor {
            label: Some(label.into()),
            shader: format!("{CAMERA_WGSL}{OBJECT_WGSL}{GEOMETRY_SHADER}"),
            vertex_entry: "vs_geometry",
            fragment_entry: Some("fs_geometry"),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layouts.camera, layouts.object],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            polygon_mode,
            depth_stencil: Some(DepthStencilState {
                format: GBUFFER_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: GBufferSlot::ALL
                .iter()
                .map(|_| ColorTargetState::opaque(GBUFFER_FORMAT))
                .collect(),
        }
    }
}

impl RenderPass for GeometryPass {
    fn name(&self) -> &str {
        "geometry"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        self.slots = GBufferSlot::ALL
            .iter()
            .filter_map(|slot| ctx.write_named(slot.resource_name(), ResourceUsage::RenderTarget))
            .collect();
        self.depth = ctx.write_named(GBUFFER_DEPTH, ResourceUsage::DepthStencilWrite);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let Some(depth) = self.depth else {
            return Ok(());
        };
        let state = ctx.frame.state;

        let mut color_attachments = Vec::with_capacity(self.slots.len());
        for (slot, &resource) in GBufferSlot::ALL.iter().zip(&self.slots) {
            // albedo shows the clear colour where nothing was drawn
            let clear = if *slot == GBufferSlot::Albedo {
                state.clear_color
            } else {
                TRANSPARENT
            };
            color_attachments.push(ColorAttachment {
                view: ctx.view(resource)?,
                resolve_target: None,
                load_op: LoadOp::Clear(clear),
                store_op: StoreOp::Store,
            });
        }
        let depth_view = ctx.view(depth)?;

        let pipeline = match (state.wireframe, self.line_pipeline) {
            (true, Some(line)) => line,
            _ => self.fill_pipeline,
        };

        let frame = ctx.frame;
        let backend = &mut *ctx.backend;
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Geometry".into()),
            color_attachments,
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        backend.set_viewport(0.0, 0.0, self.size.0 as f32, self.size.1 as f32, 0.0, 1.0);
        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, self.camera);
        for draw in frame.draws {
            backend.set_bind_group(1, draw.object);
            draw.mesh.draw(&mut *backend);
        }

        backend.end_render_pass();
        Ok(())
    }
}

const GEOMETRY_SHADER: &str = r#"
@group(1) @binding(1) var albedo_map: texture_2d<f32>;
@group(1) @binding(2) var normal_map: texture_2d<f32>;
@group(1) @binding(3) var metallic_map: texture_2d<f32>;
@group(1) @binding(4) var roughness_map: texture_2d<f32>;
@group(1) @binding(5) var ao_map: texture_2d<f32>;
@group(1) @binding(6) var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
}

struct GBufferOutput {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) albedo: vec4<f32>,
    @location(3) metallic: vec4<f32>,
    @location(4) roughness: vec4<f32>,
    @location(5) ao: vec4<f32>,
}

@vertex
fn vs_geometry(in: VertexInput) -> VertexOutput {
    let world = object.model * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.world_position = world.xyz;
    out.uv = in.uv;
    out.normal = (object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.clip_position = camera.view_proj * world;
    return out;
}

// Tangent frame from screen-space derivatives; meshes carry no tangents.
fn mapped_normal(in: VertexOutput, tangent_normal: vec3<f32>) -> vec3<f32> {
    let q1 = dpdx(in.world_position);
    let q2 = dpdy(in.world_position);
    let st1 = dpdx(in.uv);
    let st2 = dpdy(in.uv);

    let n = normalize(in.normal);
    let t = normalize(q1 * st2.y - q2 * st1.y);
    let b = -normalize(cross(n, t));
    return normalize(mat3x3<f32>(t, b, n) * tangent_normal);
}

@fragment
fn fs_geometry(in: VertexOutput) -> GBufferOutput {
    let albedo_sample = textureSample(albedo_map, material_sampler, in.uv).rgb;
    let normal_sample = textureSample(normal_map, material_sampler, in.uv).xyz * 2.0 - 1.0;
    let metallic_sample = textureSample(metallic_map, material_sampler, in.uv).r;
    let roughness_sample = textureSample(roughness_map, material_sampler, in.uv).r;
    let ao_sample = textureSample(ao_map, material_sampler, in.uv).r;
    let textured_normal = mapped_normal(in, normal_sample);

    let textured = object.material.w > 0.5;
    let normal = select(normalize(in.normal), textured_normal, textured);
    let albedo = select(object.albedo.rgb, pow(albedo_sample, vec3<f32>(2.2)), textured);
    let metallic = select(object.material.x, metallic_sample, textured);
    let roughness = select(object.material.y, roughness_sample, textured);
    let ao = select(object.material.z, ao_sample, textured);

    var out: GBufferOutput;
    out.position = vec4<f32>(in.world_position, 1.0);
    out.normal = vec4<f32>(normal, 1.0);
    out.albedo = vec4<f32>(albedo, 1.0);
    out.metallic = vec4<f32>(vec3<f32>(metallic), 1.0);
    out.roughness = vec4<f32>(vec3<f32>(roughness), 1.0);
    out.ao = vec4<f32>(vec3<f32>(ao), 1.0);
    return out;
}
"#;
