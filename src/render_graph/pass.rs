//! Render pass definitions for the render graph

use crate::backend::traits::*;
use crate::pipeline::FrameInputs;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;
use std::collections::HashMap;

/// Unique identifier for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

/// Context for declaring what a pass reads and writes
pub struct PassSetupContext<'a> {
    pub(crate) imports: &'a mut Vec<ImportedResource>,
    pub(crate) inputs: &'a mut Vec<ResourceAccess>,
    pub(crate) outputs: &'a mut Vec<ResourceAccess>,
    pub(crate) unresolved: &'a mut Vec<String>,
}

impl<'a> PassSetupContext<'a> {
    /// Look up an imported resource by name
    pub fn resource(&self, name: &str) -> Option<ResourceId> {
        self.imports.iter().find(|r| r.name == name).map(|r| r.id)
    }

    /// Declare that this pass reads from a resource
    pub fn read(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.inputs.push(ResourceAccess { resource, usage });
    }

    /// Declare that this pass writes to a resource
    pub fn write(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.outputs.push(ResourceAccess { resource, usage });
    }

    /// Resolve `name` and declare a read. Unknown names are reported at compile time.
    pub fn read_named(&mut self, name: &str, usage: ResourceUsage) -> Option<ResourceId> {
        let id = self.resource(name);
        match id {
            Some(id) => self.read(id, usage),
            None => self.unresolved.push(name.to_string()),
        }
        id
    }

    /// Resolve `name` and declare a write. Unknown names are reported at compile time.
    pub fn write_named(&mut self, name: &str, usage: ResourceUsage) -> Option<ResourceId> {
        let id = self.resource(name);
        match id {
            Some(id) => self.write(id, usage),
            None => self.unresolved.push(name.to_string()),
        }
        id
    }
}

/// Context for executing a render pass
pub struct PassExecuteContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub frame: &'a FrameInputs<'a>,
    pub(crate) bindings: &'a HashMap<ResourceId, TextureViewHandle>,
    pub(crate) pass_name: &'a str,
}

impl<'a> PassExecuteContext<'a> {
    /// Texture view bound to a resource for this frame
    pub fn view(&self, resource: ResourceId) -> Result<TextureViewHandle, RenderGraphError> {
        self.bindings
            .get(&resource)
            .copied()
            .ok_or_else(|| RenderGraphError::MissingBinding {
                pass: self.pass_name.to_string(),
                resource: resource.0,
            })
    }
}

/// Trait for render passes
pub trait RenderPass {
    /// Get the pass name for debugging
    fn name(&self) -> &str;

    /// Setup phase - declare resources and dependencies
    fn setup(&mut self, ctx: &mut PassSetupContext);

    /// Execute phase - record commands
    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError>;

    /// Destroy buffers and bind groups the pass created
    fn release(&mut self, _backend: &mut dyn GraphicsBackend) {}
}

/// Metadata about a pass in the graph
#[derive(Debug)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
}

impl PassNode {
    pub fn reads_resource(&self, resource: ResourceId) -> bool {
        self.inputs.iter().any(|a| a.resource == resource)
    }

    pub fn writes_resource(&self, resource: ResourceId) -> bool {
        self.outputs.iter().any(|a| a.resource == resource)
    }

    pub(crate) fn touches(&self, resource: ResourceId) -> bool {
        self.reads_resource(resource) || self.writes_resource(resource)
    }
}
