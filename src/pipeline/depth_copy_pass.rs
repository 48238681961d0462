//! Copies the G-buffer depth into the main target so the overlay passes
//! depth-test against the scene.

use crate::backend::traits::*;
use crate::pipeline::{GBuffer, MainTargets, GBUFFER_DEPTH, MAIN_DEPTH};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;

pub struct DepthCopyPass {
    src: TextureHandle,
    dst: TextureHandle,
    size: (u32, u32),
    src_id: Option<ResourceId>,
    dst_id: Option<ResourceId>,
}

impl DepthCopyPass {
    pub fn new(gbuffer: &GBuffer, main: &MainTargets) -> Self {
        let (width, height) = gbuffer.size();
        let size = (width.min(main.depth.width), height.min(main.depth.height));
        Self {
            src: gbuffer.depth().handle,
            dst: main.depth.handle,
            size,
            src_id: None,
            dst_id: None,
        }
    }
}

impl RenderPass for DepthCopyPass {
    fn name(&self) -> &str {
        "depth_copy"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        self.src_id = ctx.read_named(GBUFFER_DEPTH, ResourceUsage::CopySrc);
        self.dst_id = ctx.write_named(MAIN_DEPTH, ResourceUsage::CopyDst);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let (Some(src), Some(dst)) = (self.src_id, self.dst_id) else {
            return Ok(());
        };
        // both ends must be bound even though the copy works on textures
        ctx.view(src)?;
        ctx.view(dst)?;
        ctx.backend
            .copy_texture_to_texture(self.src, self.dst, self.size.0, self.size.1);
        Ok(())
    }
}
