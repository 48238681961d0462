//! Shadow depth pass
//!
//! Renders every shadow caster from the shadow light's orthographic camera
//! into the shadow map. Depth only, no fragment stage.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{SceneLayouts, CAMERA_WGSL, OBJECT_WGSL, SHADOW_FORMAT, SHADOW_MAP};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;

pub struct ShadowPass {
    pipeline: RenderPipelineHandle,
    /// Camera bind group holding the light's view-projection
    light_camera: BindGroupHandle,
    resolution: u32,
    shadow_map: Option<ResourceId>,
}

impl ShadowPass {
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        layouts: &SceneLayouts,
        light_camera: BindGroupHandle,
        resolution: u32,
    ) -> BackendResult<Self> {
        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Shadow Pipeline".into()),
            shader: format!("{CAMERA_WGSL}{OBJECT_WGSL}{SHADOW_SHADER}"),
            vertex_entry: "vs_shadow",
            fragment_entry: None,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layouts.camera, layouts.object],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            polygon_mode: PolygonMode::Fill,
            depth_stencil: Some(DepthStencilState {
                format: SHADOW_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: Vec::new(),
        })?;

        Ok(Self {
            pipeline,
            light_camera,
            resolution,
            shadow_map: None,
        })
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &str {
        "shadow"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        self.shadow_map = ctx.write_named(SHADOW_MAP, ResourceUsage::DepthStencilWrite);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let Some(shadow_map) = self.shadow_map else {
            return Ok(());
        };
        let depth_view = ctx.view(shadow_map)?;
        let frame = ctx.frame;
        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow".into()),
            color_attachments: Vec::new(),
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        let size = self.resolution as f32;
        backend.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, self.light_camera);
        for draw in frame.draws.iter().filter(|d| d.casts_shadow) {
            backend.set_bind_group(1, draw.object);
            draw.mesh.draw(&mut *backend);
        }

        backend.end_render_pass();
        Ok(())
    }
}

const SHADOW_SHADER: &str = r#"
@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view_proj * object.model * vec4<f32>(position, 1.0);
}
"#;
