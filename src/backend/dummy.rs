//! Dummy GPU backend for testing.
//!
//! Performs no GPU work. Every call is recorded as a [`RecordedCommand`] and
//! live resources are tracked so tests can assert pass ordering, viewport
//! sizes and resource cleanup without GPU hardware.

use std::collections::HashMap;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A command observed by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRenderPass {
        label: Option<String>,
        color_views: Vec<TextureViewHandle>,
        depth_view: Option<TextureViewHandle>,
        clears_color: bool,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup(u32, BindGroupHandle),
    SetVertexBuffer(u32, BufferHandle),
    SetViewport { width: f32, height: f32 },
    Draw { vertices: u32, instances: u32 },
    DrawIndexed { indices: u32, instances: u32 },
    WriteBuffer { buffer: BufferHandle, len: usize },
    WriteTexture { texture: TextureHandle, region: TextureRegion },
    CopyTexture { src: TextureHandle, dst: TextureHandle },
    Submit,
    Present,
}

/// Bookkeeping for a live texture.
#[derive(Debug, Clone)]
pub struct DummyTexture {
    pub desc: TextureDescriptor,
}

/// Bookkeeping for a live texture view.
#[derive(Debug, Clone, Copy)]
pub struct DummyTextureView {
    pub texture: TextureHandle,
    pub desc: TextureViewDescriptor,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    width: u32,
    height: u32,
    features: BackendFeatures,
    next_id: u64,
    buffers: HashMap<BufferHandle, BufferDescriptor>,
    textures: HashMap<TextureHandle, DummyTexture>,
    texture_views: HashMap<TextureViewHandle, DummyTextureView>,
    samplers: HashMap<SamplerHandle, SamplerDescriptor>,
    bind_groups: HashMap<BindGroupHandle, BindGroupLayoutHandle>,
    bind_group_layouts: HashMap<BindGroupLayoutHandle, usize>,
    pipelines: HashMap<RenderPipelineHandle, RenderPipelineDescriptor>,
    swapchain_view: Option<TextureViewHandle>,
    in_render_pass: bool,
    commands: Vec<RecordedCommand>,
}

impl DummyBackend {
    /// Create a new dummy backend with the given surface size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            features: BackendFeatures {
                clamp_to_border: true,
                polygon_mode_line: true,
            },
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            bind_groups: HashMap::new(),
            bind_group_layouts: HashMap::new(),
            pipelines: HashMap::new(),
            swapchain_view: None,
            in_render_pass: false,
            commands: Vec::new(),
        }
    }

    /// Override the reported device capabilities.
    pub fn with_features(mut self, features: BackendFeatures) -> Self {
        self.features = features;
        self
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Every command recorded since creation or the last [`Self::clear_commands`].
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Labels of the render passes in recording order.
    pub fn render_pass_labels(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginRenderPass { label, .. } => {
                    Some(label.clone().unwrap_or_default())
                }
                _ => None,
            })
            .collect()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&DummyTexture> {
        self.textures.get(&handle)
    }

    pub fn texture_view(&self, handle: TextureViewHandle) -> Option<&DummyTextureView> {
        self.texture_views.get(&handle)
    }

    pub fn sampler(&self, handle: SamplerHandle) -> Option<&SamplerDescriptor> {
        self.samplers.get(&handle)
    }

    pub fn pipeline(&self, handle: RenderPipelineHandle) -> Option<&RenderPipelineDescriptor> {
        self.pipelines.get(&handle)
    }

    /// Every pipeline created so far, in handle order
    pub fn pipelines(&self) -> Vec<&RenderPipelineDescriptor> {
        let mut handles: Vec<_> = self.pipelines.keys().copied().collect();
        handles.sort_by_key(|h| h.0);
        handles.iter().filter_map(|h| self.pipelines.get(h)).collect()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_texture_view_count(&self) -> usize {
        self.texture_views.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn features(&self) -> BackendFeatures {
        self.features
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::trace!("DummyBackend: resize {}x{}", width, height);
        self.width = width.max(1);
        self.height = height.max(1);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let id = self.next();
        let view = TextureViewHandle(id);
        self.swapchain_view = Some(view);
        Ok(FrameContext {
            swapchain_view: view,
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.commands.push(RecordedCommand::Submit);
        self.commands.push(RecordedCommand::Present);
        self.swapchain_view = None;
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8Unorm
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!("DummyBackend: creating buffer {:?} (size: {})", desc.label, desc.size);
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, desc.clone());
        Ok(handle)
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let mut desc = desc.clone();
        desc.size = data.len() as u64;
        self.create_buffer(&desc)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, _offset: u64, data: &[u8]) {
        self.commands.push(RecordedCommand::WriteBuffer {
            buffer,
            len: data.len(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {:?}, {} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.kind,
            desc.mip_levels
        );
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "invalid extent {}x{} with {} mips",
                desc.width, desc.height, desc.mip_levels
            )));
        }
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, DummyTexture { desc: desc.clone() });
        Ok(handle)
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let tex = self.textures.get(&texture).ok_or(BackendError::InvalidHandle {
            kind: "texture",
            id: texture.0,
        })?;
        let mips = desc.mip_level_count.unwrap_or(tex.desc.mip_levels - desc.base_mip_level);
        let layers = desc
            .array_layer_count
            .unwrap_or(tex.desc.kind.layer_count() - desc.base_array_layer);
        if desc.base_mip_level + mips > tex.desc.mip_levels
            || desc.base_array_layer + layers > tex.desc.kind.layer_count()
        {
            return Err(BackendError::TextureCreationFailed(format!(
                "view range out of bounds for {:?}",
                tex.desc.label
            )));
        }
        let handle = TextureViewHandle(self.next());
        self.texture_views
            .insert(handle, DummyTextureView { texture, desc: *desc });
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, region: &TextureRegion, _data: &[u8]) {
        self.commands.push(RecordedCommand::WriteTexture {
            texture,
            region: *region,
        });
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let handle = SamplerHandle(self.next());
        self.samplers.insert(handle, desc.clone());
        Ok(handle)
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let handle = BindGroupLayoutHandle(self.next());
        self.bind_group_layouts.insert(handle, entries.len());
        Ok(handle)
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let expected = self
            .bind_group_layouts
            .get(&layout)
            .copied()
            .ok_or(BackendError::InvalidHandle {
                kind: "bind group layout",
                id: layout.0,
            })?;
        if expected != entries.len() {
            return Err(BackendError::PipelineCreationFailed(format!(
                "bind group has {} entries, layout expects {}",
                entries.len(),
                expected
            )));
        }
        let handle = BindGroupHandle(self.next());
        self.bind_groups.insert(handle, layout);
        Ok(handle)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        if desc.polygon_mode == PolygonMode::Line && !self.features.polygon_mode_line {
            return Err(BackendError::PipelineCreationFailed(
                "line polygon mode unsupported".into(),
            ));
        }
        let handle = RenderPipelineHandle(self.next());
        self.pipelines.insert(handle, desc.clone());
        Ok(handle)
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        debug_assert!(!self.in_render_pass, "render pass already open");
        self.in_render_pass = true;
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: desc.label.clone(),
            color_views: desc.color_attachments.iter().map(|a| a.view).collect(),
            depth_view: desc.depth_stencil_attachment.as_ref().map(|d| d.view),
            clears_color: desc
                .color_attachments
                .iter()
                .any(|a| matches!(a.load_op, LoadOp::Clear(_))),
        });
    }

    fn end_render_pass(&mut self) {
        self.in_render_pass = false;
        self.commands.push(RecordedCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.commands
            .push(RecordedCommand::SetBindGroup(index, bind_group));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer(slot, buffer));
    }

    fn set_index_buffer(&mut self, _buffer: BufferHandle, _offset: u64, _format: IndexFormat) {}

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.commands
            .push(RecordedCommand::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.commands.push(RecordedCommand::Draw {
            vertices: vertices.len() as u32,
            instances: instances.len() as u32,
        });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.commands.push(RecordedCommand::DrawIndexed {
            indices: indices.len() as u32,
            instances: instances.len() as u32,
        });
    }

    fn copy_texture_to_texture(&mut self, src: TextureHandle, dst: TextureHandle, _width: u32, _height: u32) {
        self.commands.push(RecordedCommand::CopyTexture { src, dst });
    }

    fn submit(&mut self) {
        self.commands.push(RecordedCommand::Submit);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.texture_views.remove(&view);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_range_is_validated() {
        let mut backend = DummyBackend::new(64, 64);
        let tex = backend
            .create_texture(&TextureDescriptor {
                width: 16,
                height: 16,
                kind: TextureKind::Cube,
                mip_levels: 2,
                ..Default::default()
            })
            .unwrap();
        assert!(backend
            .create_texture_view(tex, &TextureViewDescriptor::layer_mip(5, 1))
            .is_ok());
        assert!(backend
            .create_texture_view(tex, &TextureViewDescriptor::layer_mip(6, 0))
            .is_err());
        assert!(backend
            .create_texture_view(tex, &TextureViewDescriptor::layer_mip(0, 2))
            .is_err());
    }

    #[test]
    fn test_render_pass_labels_in_order() {
        let mut backend = DummyBackend::new(64, 64);
        for label in ["a", "b"] {
            backend.begin_render_pass(&RenderPassDescriptor {
                label: Some(label.into()),
                color_attachments: vec![],
                depth_stencil_attachment: None,
            });
            backend.end_render_pass();
        }
        assert_eq!(backend.render_pass_labels(), vec!["a", "b"]);
    }
}
