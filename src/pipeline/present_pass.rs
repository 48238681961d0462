//! Present pass
//!
//! Copies the selected debug view to the swapchain: the lit composite or one
//! raw G-buffer slot. Scalar slots are shown as grey.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::frame::DebugView;
use crate::pipeline::uniforms::{bytes_of, FrameUniform};
use crate::pipeline::{fullscreen_pipeline, GBuffer, GBufferSlot, MainTargets, FULLSCREEN_WGSL, MAIN_COLOR, SWAPCHAIN};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;

pub struct PresentPass {
    pipeline: RenderPipelineHandle,
    uniform: BufferHandle,
    /// Indexed by [`DebugView::index`]
    views: Vec<BindGroupHandle>,
    output: Option<ResourceId>,
}

impl PresentPass {
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        main: &MainTargets,
        gbuffer: &GBuffer,
    ) -> BackendResult<Self> {
        let layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Float { filterable: true }, TextureViewDimension::D2),
            BindGroupLayoutEntry::sampler(1, SamplerBindingType::NonFiltering),
            BindGroupLayoutEntry::uniform(2, ShaderStageFlags::FRAGMENT),
        ])?;
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Present Sampler".into()),
            ..SamplerDescriptor::default().with_filter(FilterMode::Nearest)
        })?;

        let swapchain_format = backend.swapchain_format();
        let pipeline = backend.create_render_pipeline(&fullscreen_pipeline(
            "Present Pipeline",
            format!("{FULLSCREEN_WGSL}{PRESENT_SHADER}"),
            "fs_present",
            vec![layout],
            swapchain_format,
        ))?;

        let uniform = backend.create_buffer(&BufferDescriptor {
            label: Some("Present Uniform".into()),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;

        let sources = std::iter::once(main.color.view)
            .chain(GBufferSlot::ALL.iter().map(|&slot| gbuffer.slot(slot).view));

        let mut pass = Self {
            pipeline,
            uniform,
            views: Vec::with_capacity(DebugView::COUNT),
            output: None,
        };
        for view in sources {
            match backend.create_bind_group(
                layout,
                &[
                    (0, BindGroupEntry::Texture(view)),
                    (1, BindGroupEntry::Sampler(sampler)),
                    (2, BindGroupEntry::buffer(uniform)),
                ],
            ) {
                Ok(group) => pass.views.push(group),
                Err(e) => {
                    pass.destroy_resources(backend);
                    return Err(e);
                }
            }
        }

        Ok(pass)
    }

    fn destroy_resources<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for group in self.views.drain(..) {
            backend.destroy_bind_group(group);
        }
        backend.destroy_buffer(self.uniform);
    }
}

impl RenderPass for PresentPass {
    fn name(&self) -> &str {
        "present"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read_named(MAIN_COLOR, ResourceUsage::TextureRead);
        for slot in GBufferSlot::ALL {
            ctx.read_named(slot.resource_name(), ResourceUsage::TextureRead);
        }
        self.output = ctx.write_named(SWAPCHAIN, ResourceUsage::RenderTarget);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let Some(output) = self.output else {
            return Ok(());
        };
        let output_view = ctx.view(output)?;
        let view = ctx.frame.state.view;
        let (width, height) = ctx.frame.extent;
        let Some(&group) = self.views.get(view.index()) else {
            return Ok(());
        };
        let backend = &mut *ctx.backend;

        let uniform = FrameUniform {
            view: view.index() as u32,
            grayscale: u32::from(view.is_scalar()),
            _pad: [0; 2],
        };
        backend.write_buffer(self.uniform, 0, bytes_of(&uniform));

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Present".into()),
            color_attachments: vec![ColorAttachment {
                view: output_view,
                resolve_target: None,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });

        backend.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, group);
        backend.draw(0..3, 0..1);

        backend.end_render_pass();
        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.destroy_resources(backend);
    }
}

const PRESENT_SHADER: &str = r#"
struct FrameUniform {
    view: u32,
    grayscale: u32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(0) @binding(2) var<uniform> frame: FrameUniform;

@fragment
fn fs_present(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(source, source_sampler, in.uv, 0.0);
    if frame.grayscale != 0u {
        return vec4<f32>(vec3<f32>(color.r), 1.0);
    }
    return vec4<f32>(color.rgb, 1.0);
}
"#;
