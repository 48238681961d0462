//! Light marker pass
//!
//! Draws a small flat-coloured sphere at each point light, depth-tested
//! against the copied scene depth.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::{bytes_of, MarkerUniform};
use crate::pipeline::{SceneLayouts, CAMERA_WGSL, MAIN_COLOR, MAIN_COLOR_FORMAT, MAIN_DEPTH, MAIN_DEPTH_FORMAT, TONEMAP_WGSL};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;
use crate::resources::GpuMesh;
use crate::scene::LightSet;

pub struct LightMarkerPass {
    pipeline: RenderPipelineHandle,
    camera: BindGroupHandle,
    sphere: GpuMesh,
    /// One uniform buffer and bind group per light
    markers: Vec<(BufferHandle, BindGroupHandle)>,
    size: (u32, u32),
    color: Option<ResourceId>,
    depth: Option<ResourceId>,
}

impl LightMarkerPass {
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        layouts: &SceneLayouts,
        camera: BindGroupHandle,
        sphere: GpuMesh,
        lights: &LightSet,
        size: (u32, u32),
    ) -> BackendResult<Self> {
        let marker_layout =
            backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)])?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Light Marker Pipeline".into()),
            shader: format!("{CAMERA_WGSL}{TONEMAP_WGSL}{MARKER_SHADER}"),
            vertex_entry: "vs_marker",
            fragment_entry: Some("fs_marker"),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layouts.camera, marker_layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            polygon_mode: PolygonMode::Fill,
            depth_stencil: Some(DepthStencilState {
                format: MAIN_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: vec![ColorTargetState::opaque(MAIN_COLOR_FORMAT)],
        })?;

        let mut pass = Self {
            pipeline,
            camera,
            sphere,
            markers: Vec::with_capacity(lights.len()),
            size,
            color: None,
            depth: None,
        };

        for (index, light) in lights.lights().iter().enumerate() {
            let Some(model) = lights.marker_model(index) else {
                continue;
            };
            let uniform = MarkerUniform {
                model,
                color: light.color.extend(1.0),
            };
            let created = backend
                .create_buffer_init(
                    &BufferDescriptor {
                        label: Some(format!("Light Marker {index}")),
                        size: std::mem::size_of::<MarkerUniform>() as u64,
                        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                        mapped_at_creation: false,
                    },
                    bytes_of(&uniform),
                )
                .and_then(|buffer| {
                    match backend.create_bind_group(marker_layout, &[(0, BindGroupEntry::buffer(buffer))]) {
                        Ok(group) => Ok((buffer, group)),
                        Err(e) => {
                            backend.destroy_buffer(buffer);
                            Err(e)
                        }
                    }
                });
            match created {
                Ok(marker) => pass.markers.push(marker),
                Err(e) => {
                    pass.destroy_markers(backend);
                    return Err(e);
                }
            }
        }

        Ok(pass)
    }

    fn destroy_markers<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for (buffer, group) in self.markers.drain(..) {
            backend.destroy_bind_group(group);
            backend.destroy_buffer(buffer);
        }
    }
}

impl RenderPass for LightMarkerPass {
    fn name(&self) -> &str {
        "light_markers"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read_named(MAIN_COLOR, ResourceUsage::RenderTarget);
        ctx.read_named(MAIN_DEPTH, ResourceUsage::DepthStencilRead);
        self.color = ctx.write_named(MAIN_COLOR, ResourceUsage::RenderTarget);
        self.depth = ctx.write_named(MAIN_DEPTH, ResourceUsage::DepthStencilWrite);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let (Some(color), Some(depth)) = (self.color, self.depth) else {
            return Ok(());
        };
        let color_view = ctx.view(color)?;
        let depth_view = ctx.view(depth)?;
        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Light Markers".into()),
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
        backend.set_bind_group(0, self.camera);
        for &(_, group) in &self.markers {
            backend.set_bind_group(1, group);
            self.sphere.draw(&mut *backend);
        }

        backend.end_render_pass();
        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.destroy_markers(backend);
    }
}

const MARKER_SHADER: &str = r#"
struct MarkerUniform {
    model: mat4x4<f32>,
    color: vec4<f32>,
}

@group(1) @binding(0) var<uniform> marker: MarkerUniform;

@vertex
fn vs_marker(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view_proj * marker.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_marker() -> @location(0) vec4<f32> {
    return vec4<f32>(tonemap(marker.color.rgb), 1.0);
}
"#;
