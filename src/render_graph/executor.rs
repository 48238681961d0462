//! Render graph executor

use crate::backend::traits::*;
use crate::pipeline::FrameInputs;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;
use std::collections::HashMap;

/// Executor for running the compiled render graph
pub struct RenderGraphExecutor {
    /// Views bound to imported resources
    bindings: HashMap<ResourceId, TextureViewHandle>,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Bind a texture view to an imported resource (persists across frames)
    pub fn bind(&mut self, resource: ResourceId, view: TextureViewHandle) {
        self.bindings.insert(resource, view);
    }

    /// Bind by resource name
    pub fn bind_named(
        &mut self,
        graph: &RenderGraph,
        name: &str,
        view: TextureViewHandle,
    ) -> Result<(), RenderGraphError> {
        let id = graph
            .get_resource(name)
            .ok_or_else(|| RenderGraphError::UnknownResource {
                pass: "<executor>".into(),
                resource: name.to_string(),
            })?;
        self.bind(id, view);
        Ok(())
    }

    /// Execute the render graph
    pub fn execute(
        &self,
        graph: &RenderGraph,
        compiled: &CompiledGraph,
        backend: &mut dyn GraphicsBackend,
        frame: &FrameInputs,
    ) -> Result<(), RenderGraphError> {
        for &pass_id in &compiled.pass_order {
            let (Some(pass), Some(node)) = (graph.get_pass(pass_id), graph.get_pass_node(pass_id))
            else {
                continue;
            };
            log::trace!("Executing pass {}", node.name);
            let mut ctx = PassExecuteContext {
                backend: &mut *backend,
                frame,
                bindings: &self.bindings,
                pass_name: &node.name,
            };
            pass.execute(&mut ctx)?;
        }
        Ok(())
    }
}

impl Default for RenderGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}
