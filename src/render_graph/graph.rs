//! Render graph definition and compilation

use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// The main render graph structure
pub struct RenderGraph {
    passes: Vec<Box<dyn RenderPass>>,
    pass_nodes: Vec<PassNode>,
    /// Names a pass asked for that were never imported, per pass index
    unresolved: Vec<Vec<String>>,
    imports: Vec<ImportedResource>,
    next_pass_id: u32,
    next_resource_id: u32,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            unresolved: Vec::new(),
            imports: Vec::new(),
            next_pass_id: 0,
            next_resource_id: 0,
        }
    }

    /// Register a texture owned outside the graph. Re-importing a name returns its id.
    pub fn import(&mut self, name: &str, init: ResourceInit) -> ResourceId {
        if let Some(existing) = self.get_resource(name) {
            return existing;
        }
        let id = ResourceId(self.next_resource_id);
        self.next_resource_id += 1;
        self.imports.push(ImportedResource {
            id,
            name: name.to_string(),
            init,
        });
        id
    }

    /// Get an imported resource by name
    pub fn get_resource(&self, name: &str) -> Option<ResourceId> {
        self.imports.iter().find(|r| r.name == name).map(|r| r.id)
    }

    /// Add a render pass to the graph; its `setup` runs immediately
    pub fn add_pass<P: RenderPass + 'static>(&mut self, pass: P) -> PassId {
        let id = PassId(self.next_pass_id);
        self.next_pass_id += 1;

        let name = pass.name().to_string();
        let mut boxed_pass = Box::new(pass);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut unresolved = Vec::new();
        {
            let mut ctx = PassSetupContext {
                imports: &mut self.imports,
                inputs: &mut inputs,
                outputs: &mut outputs,
                unresolved: &mut unresolved,
            };
            boxed_pass.setup(&mut ctx);
        }

        self.passes.push(boxed_pass);
        self.unresolved.push(unresolved);
        self.pass_nodes.push(PassNode {
            id,
            name,
            inputs,
            outputs,
        });

        id
    }

    /// Compile the graph - dependency analysis, topological sort and lifetimes
    ///
    /// A pass depends on an earlier pass when it reads what the earlier pass
    /// writes, or writes what the earlier pass reads or writes. Ready passes
    /// are emitted in insertion order, so the result is deterministic.
    pub fn compile(&self) -> Result<CompiledGraph, RenderGraphError> {
        for (node, unresolved) in self.pass_nodes.iter().zip(&self.unresolved) {
            if let Some(name) = unresolved.first() {
                return Err(RenderGraphError::UnknownResource {
                    pass: node.name.clone(),
                    resource: name.clone(),
                });
            }
        }

        let count = self.pass_nodes.len();
        let mut dependents: Vec<HashSet<usize>> = vec![HashSet::new(); count];
        let mut in_degree = vec![0usize; count];

        for (later, node) in self.pass_nodes.iter().enumerate() {
            for input in &node.inputs {
                let produced = self.pass_nodes[..later]
                    .iter()
                    .any(|earlier| earlier.writes_resource(input.resource));
                if !produced && self.init_of(input.resource) == Some(ResourceInit::PerFrame) {
                    return Err(RenderGraphError::ReadBeforeWrite {
                        pass: node.name.clone(),
                        resource: self.resource_name(input.resource).to_string(),
                    });
                }
            }

            for (earlier, other) in self.pass_nodes[..later].iter().enumerate() {
                let raw = node.inputs.iter().any(|a| other.writes_resource(a.resource));
                let war_waw = node.outputs.iter().any(|a| other.touches(a.resource));
                if (raw || war_waw) && dependents[earlier].insert(later) {
                    in_degree[later] += 1;
                }
            }
        }

        // Kahn's algorithm, lowest insertion index first
        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(count);
        while let Some(index) = ready.pop_first() {
            sorted.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        let mut resource_lifetimes: HashMap<ResourceId, ResourceLifetime> = HashMap::new();
        for (order, &index) in sorted.iter().enumerate() {
            let node = &self.pass_nodes[index];
            for access in node.inputs.iter().chain(node.outputs.iter()) {
                let lifetime = resource_lifetimes
                    .entry(access.resource)
                    .or_insert(ResourceLifetime {
                        first_use: order,
                        last_use: order,
                    });
                lifetime.last_use = order;
            }
        }

        Ok(CompiledGraph {
            pass_order: sorted.into_iter().map(|i| self.pass_nodes[i].id).collect(),
            resource_lifetimes,
        })
    }

    fn init_of(&self, resource: ResourceId) -> Option<ResourceInit> {
        self.imports.iter().find(|r| r.id == resource).map(|r| r.init)
    }

    fn resource_name(&self, resource: ResourceId) -> &str {
        self.imports
            .iter()
            .find(|r| r.id == resource)
            .map(|r| r.name.as_str())
            .unwrap_or("<unknown>")
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get all imported resources
    pub fn resources(&self) -> &[ImportedResource] {
        &self.imports
    }

    /// Get pass by ID
    pub fn get_pass(&self, id: PassId) -> Option<&dyn RenderPass> {
        let index = self.pass_nodes.iter().position(|n| n.id == id)?;
        Some(self.passes[index].as_ref())
    }

    /// Get pass node by ID
    pub fn get_pass_node(&self, id: PassId) -> Option<&PassNode> {
        self.pass_nodes.iter().find(|n| n.id == id)
    }

    /// Let every pass release what it created
    pub fn release_passes(&mut self, backend: &mut dyn crate::backend::GraphicsBackend) {
        for pass in &mut self.passes {
            pass.release(backend);
        }
    }

    /// Pass names in execution order
    pub fn pass_names(&self, compiled: &CompiledGraph) -> Vec<String> {
        compiled
            .pass_order
            .iter()
            .filter_map(|&id| self.get_pass_node(id))
            .map(|n| n.name.clone())
            .collect()
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

/// Compiled render graph with execution order and resource lifetimes
#[derive(Debug)]
pub struct CompiledGraph {
    pub pass_order: Vec<PassId>,
    pub resource_lifetimes: HashMap<ResourceId, ResourceLifetime>,
}

impl CompiledGraph {
    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: ResourceId, step: usize) -> bool {
        if let Some(lifetime) = self.resource_lifetimes.get(&resource) {
            step >= lifetime.first_use && step <= lifetime.last_use
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stage {
        name: &'static str,
        reads: Vec<&'static str>,
        writes: Vec<&'static str>,
    }

    impl Stage {
        fn new(name: &'static str, reads: &[&'static str], writes: &[&'static str]) -> Self {
            Self {
                name,
                reads: reads.to_vec(),
                writes: writes.to_vec(),
            }
        }
    }

    impl RenderPass for Stage {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            for r in &self.reads {
                ctx.read_named(r, ResourceUsage::TextureRead);
            }
            for w in &self.writes {
                ctx.write_named(w, ResourceUsage::RenderTarget);
            }
        }

        fn execute(&self, _ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
            Ok(())
        }
    }

    #[test]
    fn test_order_follows_data_flow() {
        let mut graph = RenderGraph::new();
        graph.import("a", ResourceInit::PerFrame);
        graph.import("b", ResourceInit::PerFrame);
        graph.import("probe", ResourceInit::Persistent);
        graph.add_pass(Stage::new("produce", &[], &["a"]));
        graph.add_pass(Stage::new("consume", &["a", "probe"], &["b"]));
        graph.add_pass(Stage::new("overlay", &["b"], &["b"]));

        let compiled = graph.compile().unwrap();
        assert_eq!(graph.pass_names(&compiled), vec!["produce", "consume", "overlay"]);

        let a = graph.get_resource("a").unwrap();
        assert!(compiled.is_resource_alive(a, 1));
        assert!(!compiled.is_resource_alive(a, 2));
    }

    #[test]
    fn test_read_before_write_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.import("a", ResourceInit::PerFrame);
        graph.add_pass(Stage::new("consume", &["a"], &[]));
        graph.add_pass(Stage::new("produce", &[], &["a"]));

        assert!(matches!(
            graph.compile(),
            Err(RenderGraphError::ReadBeforeWrite { .. })
        ));
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stage::new("lonely", &["missing"], &[]));

        assert!(matches!(
            graph.compile(),
            Err(RenderGraphError::UnknownResource { .. })
        ));
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph = RenderGraph::new();
        graph.import("x", ResourceInit::PerFrame);
        graph.import("y", ResourceInit::PerFrame);
        graph.add_pass(Stage::new("second", &[], &["y"]));
        graph.add_pass(Stage::new("first", &[], &["x"]));

        let compiled = graph.compile().unwrap();
        assert_eq!(graph.pass_names(&compiled), vec!["second", "first"]);
    }
}
