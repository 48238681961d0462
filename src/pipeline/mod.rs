//! Deferred rendering pipeline
//!
//! One frame runs seven passes, ordered by the render graph from the
//! resources they declare:
//! 1. Shadow - depth of the shadow casters from the shadow light
//! 2. Geometry - world position, normal and material into the G-buffer
//! 3. Lighting - fullscreen resolve of the G-buffer, shadow map and IBL maps
//! 4. Depth copy - G-buffer depth into the main target's depth
//! 5. Light markers - flat spheres at the light positions
//! 6. Skybox - environment cube at infinite distance
//! 7. Present - composite or one G-buffer slot to the swapchain

mod depth_copy_pass;
mod gbuffer;
mod geometry_pass;
mod lighting_pass;
mod marker_pass;
mod present_pass;
mod shadow_map;
mod shadow_pass;
mod skybox_pass;
pub mod uniforms;

pub use depth_copy_pass::DepthCopyPass;
pub use gbuffer::{GBuffer, GBufferSlot, GBUFFER_DEPTH, GBUFFER_DEPTH_FORMAT, GBUFFER_FORMAT};
pub use geometry_pass::GeometryPass;
pub use lighting_pass::LightingPass;
pub use marker_pass::LightMarkerPass;
pub use present_pass::PresentPass;
pub use shadow_map::{ShadowMap, SHADOW_FORMAT, SHADOW_MAP};
pub use shadow_pass::ShadowPass;
pub use skybox_pass::SkyboxPass;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::frame::FrameState;
use crate::ibl::IblMaps;
use crate::render_graph::*;
use crate::resources::GpuMesh;
use crate::resources::texture::{allocate_render_target, GpuTexture};
use crate::resources::PbrTextures;

pub const MAIN_COLOR: &str = "main_color";
pub const MAIN_DEPTH: &str = "main_depth";
pub const SWAPCHAIN: &str = "swapchain";
pub const IRRADIANCE_MAP: &str = "irradiance_map";
pub const PREFILTER_MAP: &str = "prefilter_map";
pub const BRDF_LUT: &str = "brdf_lut";
pub const SKYBOX_MAP: &str = "skybox_map";

/// Tone-mapped, gamma-encoded composite
pub const MAIN_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const MAIN_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// One mesh draw of the shadow and geometry passes
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub mesh: &'a GpuMesh,
    /// Bind group matching [`SceneLayouts::object`]
    pub object: BindGroupHandle,
    pub casts_shadow: bool,
}

/// Everything that changes from frame to frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub state: &'a FrameState,
    pub draws: &'a [DrawItem<'a>],
    /// Swapchain size
    pub extent: (u32, u32),
}

/// Bind group layouts shared by the scene passes.
///
/// Group 0 is a camera (the viewer or the shadow light), group 1 an object.
#[derive(Debug, Clone, Copy)]
pub struct SceneLayouts {
    pub camera: BindGroupLayoutHandle,
    pub object: BindGroupLayoutHandle,
}

impl SceneLayouts {
    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B) -> BackendResult<Self> {
        let camera = backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(
            0,
            ShaderStageFlags::VERTEX_FRAGMENT,
        )])?;

        let mut entries = vec![BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)];
        for binding in 1..=5 {
            entries.push(BindGroupLayoutEntry::texture(
                binding,
                TextureSampleType::Float { filterable: true },
                TextureViewDimension::D2,
            ));
        }
        entries.push(BindGroupLayoutEntry::sampler(6, SamplerBindingType::Filtering));
        let object = backend.create_bind_group_layout(&entries)?;

        Ok(Self { camera, object })
    }

    pub fn camera_bind_group<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        buffer: BufferHandle,
    ) -> BackendResult<BindGroupHandle> {
        backend.create_bind_group(self.camera, &[(0, BindGroupEntry::buffer(buffer))])
    }

    /// Object uniform plus the five maps, sampled with the albedo map's sampler
    pub fn object_bind_group<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        buffer: BufferHandle,
        textures: &PbrTextures,
    ) -> BackendResult<BindGroupHandle> {
        let mut entries = vec![(0, BindGroupEntry::buffer(buffer))];
        for (binding, texture) in (1u32..).zip(textures.iter()) {
            entries.push((binding, BindGroupEntry::Texture(texture.view)));
        }
        entries.push((6, BindGroupEntry::Sampler(textures.albedo.sampler)));
        backend.create_bind_group(self.object, &entries)
    }
}

/// Offscreen colour and depth the lighting and overlay passes draw into
#[derive(Debug)]
pub struct MainTargets {
    pub color: GpuTexture,
    pub depth: GpuTexture,
}

impl MainTargets {
    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B, width: u32, height: u32) -> BackendResult<Self> {
        let sampler = SamplerDescriptor {
            label: Some("Main Target Sampler".into()),
            ..SamplerDescriptor::default().with_filter(FilterMode::Nearest)
        };
        let color = allocate_render_target(
            backend,
            MAIN_COLOR,
            width,
            height,
            MAIN_COLOR_FORMAT,
            TextureUsage::empty(),
            &sampler,
        )?;
        let depth = match allocate_render_target(
            backend,
            MAIN_DEPTH,
            width,
            height,
            MAIN_DEPTH_FORMAT,
            TextureUsage::COPY_DST,
            &sampler,
        ) {
            Ok(depth) => depth,
            Err(e) => {
                color.destroy(backend);
                return Err(e);
            }
        };
        Ok(Self { color, depth })
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        self.color.destroy(backend);
        self.depth.destroy(backend);
    }
}

/// Camera and object declarations shared by the scene shaders
pub(crate) const CAMERA_WGSL: &str = r#"
struct CameraUniform {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    position: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniform;
"#;

pub(crate) const OBJECT_WGSL: &str = r#"
struct ObjectUniform {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    albedo: vec4<f32>,
    material: vec4<f32>,
}

@group(1) @binding(0) var<uniform> object: ObjectUniform;
"#;

/// Fullscreen triangle; uv (0, 0) is the top-left texel
pub(crate) const FULLSCREEN_WGSL: &str = r#"
struct FullscreenOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    var out: FullscreenOutput;
    out.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>(x * 0.5 + 0.5, 0.5 - y * 0.5);
    return out;
}
"#;

/// Reinhard tone mapping followed by gamma 2.2
pub(crate) const TONEMAP_WGSL: &str = r#"
fn tonemap(hdr: vec3<f32>) -> vec3<f32> {
    let mapped = hdr / (hdr + vec3<f32>(1.0));
    return pow(mapped, vec3<f32>(1.0 / 2.2));
}
"#;

/// Pipeline drawing [`FULLSCREEN_WGSL`] into one colour target
pub(crate) fn fullscreen_pipeline(
    label: &str,
    shader: String,
    fragment_entry: &'static str,
    bind_group_layouts: Vec<BindGroupLayoutHandle>,
    format: TextureFormat,
) -> RenderPipelineDescriptor {
    RenderPipelineDescriptor {
        label: Some(label.to_string()),
        shader,
        vertex_entry: "vs_fullscreen",
        fragment_entry: Some(fragment_entry),
        vertex_layouts: Vec::new(),
        bind_group_layouts,
        primitive_topology: PrimitiveTopology::TriangleList,
        front_face: FrontFace::Ccw,
        cull_mode: CullMode::None,
        polygon_mode: PolygonMode::Fill,
        depth_stencil: None,
        color_targets: vec![ColorTargetState::opaque(format)],
    }
}

/// Register every texture the frame passes refer to
pub fn import_frame_resources(graph: &mut RenderGraph) {
    graph.import(SHADOW_MAP, ResourceInit::PerFrame);
    for slot in GBufferSlot::ALL {
        graph.import(slot.resource_name(), ResourceInit::PerFrame);
    }
    graph.import(GBUFFER_DEPTH, ResourceInit::PerFrame);
    graph.import(MAIN_COLOR, ResourceInit::PerFrame);
    graph.import(MAIN_DEPTH, ResourceInit::PerFrame);
    graph.import(SWAPCHAIN, ResourceInit::PerFrame);
    graph.import(IRRADIANCE_MAP, ResourceInit::Persistent);
    graph.import(PREFILTER_MAP, ResourceInit::Persistent);
    graph.import(BRDF_LUT, ResourceInit::Persistent);
    graph.import(SKYBOX_MAP, ResourceInit::Persistent);
}

/// The seven frame passes, ready to be added to a graph
pub struct FramePasses {
    pub shadow: ShadowPass,
    pub geometry: GeometryPass,
    pub lighting: LightingPass,
    pub depth_copy: DepthCopyPass,
    pub markers: LightMarkerPass,
    pub skybox: SkyboxPass,
    pub present: PresentPass,
}

/// Textures bound to the frame graph's resources
pub struct FrameTargets<'a> {
    pub gbuffer: &'a GBuffer,
    pub shadow: &'a ShadowMap,
    pub main: &'a MainTargets,
    pub ibl: &'a IblMaps,
    pub skybox: &'a GpuTexture,
}

/// Compiled frame graph with its resource bindings
pub struct FrameGraph {
    graph: RenderGraph,
    compiled: CompiledGraph,
    executor: RenderGraphExecutor,
    swapchain: ResourceId,
}

impl FrameGraph {
    pub fn new(passes: FramePasses, targets: &FrameTargets) -> Result<Self, RenderGraphError> {
        let mut graph = RenderGraph::new();
        import_frame_resources(&mut graph);
        graph.add_pass(passes.shadow);
        graph.add_pass(passes.geometry);
        graph.add_pass(passes.lighting);
        graph.add_pass(passes.depth_copy);
        graph.add_pass(passes.markers);
        graph.add_pass(passes.skybox);
        graph.add_pass(passes.present);
        let compiled = graph.compile()?;
        log::info!("Frame graph: {}", graph.pass_names(&compiled).join(" -> "));

        let mut executor = RenderGraphExecutor::new();
        executor.bind_named(&graph, SHADOW_MAP, targets.shadow.texture.view)?;
        for slot in GBufferSlot::ALL {
            executor.bind_named(&graph, slot.resource_name(), targets.gbuffer.slot(slot).view)?;
        }
        executor.bind_named(&graph, GBUFFER_DEPTH, targets.gbuffer.depth().view)?;
        executor.bind_named(&graph, MAIN_COLOR, targets.main.color.view)?;
        executor.bind_named(&graph, MAIN_DEPTH, targets.main.depth.view)?;
        executor.bind_named(&graph, IRRADIANCE_MAP, targets.ibl.irradiance_map.view)?;
        executor.bind_named(&graph, PREFILTER_MAP, targets.ibl.prefilter_map.view)?;
        executor.bind_named(&graph, BRDF_LUT, targets.ibl.brdf_lut.view)?;
        executor.bind_named(&graph, SKYBOX_MAP, targets.skybox.view)?;

        let swapchain = graph
            .get_resource(SWAPCHAIN)
            .ok_or_else(|| RenderGraphError::UnknownResource {
                pass: "<frame>".into(),
                resource: SWAPCHAIN.into(),
            })?;

        Ok(Self {
            graph,
            compiled,
            executor,
            swapchain,
        })
    }

    /// Pass names in execution order
    pub fn pass_names(&self) -> Vec<String> {
        self.graph.pass_names(&self.compiled)
    }

    /// Record one frame into `swapchain_view`
    pub fn execute(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        swapchain_view: TextureViewHandle,
        inputs: &FrameInputs,
    ) -> Result<(), RenderGraphError> {
        self.executor.bind(self.swapchain, swapchain_view);
        self.executor.execute(&self.graph, &self.compiled, backend, inputs)
    }

    pub fn release(mut self, backend: &mut dyn GraphicsBackend) {
        self.graph.release_passes(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCommand};
    use crate::ibl::{IblConfig, IblPrecompute};
    use crate::pipeline::uniforms::*;
    use crate::resources::{texture, Mesh};
    use crate::scene::LightSet;

    struct Fixture {
        backend: DummyBackend,
        graph: FrameGraph,
        mesh: GpuMesh,
        object: BindGroupHandle,
        main: MainTargets,
        gbuffer: GBuffer,
        shadow: ShadowMap,
    }

    fn uniform<B: GraphicsBackend + ?Sized>(backend: &mut B, size: usize) -> BufferHandle {
        backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size: size as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })
            .unwrap()
    }

    fn fixture() -> Fixture {
        let mut backend = DummyBackend::new(320, 200);
        let layouts = SceneLayouts::new(&mut backend).unwrap();

        let hdr = texture::placeholder(&mut backend, [255, 255, 255, 255], "hdr").unwrap();
        let config = IblConfig {
            env_resolution: 16,
            irradiance_resolution: 4,
            prefilter_resolution: 8,
            prefilter_mip_levels: 2,
            prefilter_sample_count: 4,
            irradiance_sample_delta: 0.5,
            brdf_resolution: 4,
        };
        let ibl = IblPrecompute::run(&mut backend, &hdr, &config).unwrap();

        let gbuffer = GBuffer::new(&mut backend, 320, 200).unwrap();
        let shadow = ShadowMap::new(&mut backend, 64).unwrap();
        let main = MainTargets::new(&mut backend, 320, 200).unwrap();

        let camera_buffer = uniform(&mut backend, std::mem::size_of::<CameraUniformData>());
        let light_buffer = uniform(&mut backend, std::mem::size_of::<CameraUniformData>());
        let lighting_buffer = uniform(&mut backend, std::mem::size_of::<LightingUniform>());
        let skybox_buffer = uniform(&mut backend, std::mem::size_of::<SkyboxUniform>());
        let object_buffer = uniform(&mut backend, std::mem::size_of::<ObjectUniform>());
        let camera_bg = layouts.camera_bind_group(&mut backend, camera_buffer).unwrap();
        let light_bg = layouts.camera_bind_group(&mut backend, light_buffer).unwrap();
        let textures = PbrTextures::neutral(&mut backend).unwrap();
        let object = layouts.object_bind_group(&mut backend, object_buffer, &textures).unwrap();

        let mesh = GpuMesh::upload(&mut backend, &Mesh::cube()).unwrap();
        let sphere = GpuMesh::upload(&mut backend, &Mesh::sphere(8, 8)).unwrap();
        let lights = LightSet::demo(10.0, 1.0, 7.5);

        let passes = FramePasses {
            shadow: ShadowPass::new(&mut backend, &layouts, light_bg, shadow.resolution).unwrap(),
            geometry: GeometryPass::new(&mut backend, &layouts, camera_bg, gbuffer.size()).unwrap(),
            lighting: LightingPass::new(&mut backend, lighting_buffer, &gbuffer, &shadow, &ibl).unwrap(),
            depth_copy: DepthCopyPass::new(&gbuffer, &main),
            markers: LightMarkerPass::new(&mut backend, &layouts, camera_bg, sphere, &lights, (320, 200))
                .unwrap(),
            skybox: SkyboxPass::new(&mut backend, skybox_buffer, mesh.clone(), &ibl.env_map, (320, 200))
                .unwrap(),
            present: PresentPass::new(&mut backend, &main, &gbuffer).unwrap(),
        };
        let targets = FrameTargets {
            gbuffer: &gbuffer,
            shadow: &shadow,
            main: &main,
            ibl: &ibl,
            skybox: &ibl.env_map,
        };
        let graph = FrameGraph::new(passes, &targets).unwrap();
        backend.clear_commands();

        Fixture {
            backend,
            graph,
            mesh,
            object,
            main,
            gbuffer,
            shadow,
        }
    }

    fn run_frame(fixture: &mut Fixture, state: &FrameState) {
        let draws = [
            DrawItem {
                mesh: &fixture.mesh,
                object: fixture.object,
                casts_shadow: true,
            },
            DrawItem {
                mesh: &fixture.mesh,
                object: fixture.object,
                casts_shadow: false,
            },
        ];
        let frame = fixture.backend.begin_frame().unwrap();
        let inputs = FrameInputs {
            state,
            draws: &draws,
            extent: (frame.width, frame.height),
        };
        fixture
            .graph
            .execute(&mut fixture.backend, frame.swapchain_view, &inputs)
            .unwrap();
        fixture.backend.end_frame().unwrap();
    }

    #[test]
    fn test_pass_order_is_fixed() {
        let fixture = fixture();
        assert_eq!(
            fixture.graph.pass_names(),
            vec!["shadow", "geometry", "lighting", "depth_copy", "light_markers", "skybox", "present"]
        );
    }

    #[test]
    fn test_frame_records_passes_in_order() {
        let mut fixture = fixture();
        run_frame(&mut fixture, &FrameState::default());
        assert_eq!(
            fixture.backend.render_pass_labels(),
            vec!["Shadow", "Geometry", "Lighting", "Light Markers", "Skybox", "Present"]
        );

        let commands = fixture.backend.commands();
        let copy = commands
            .iter()
            .position(|c| {
                *c == RecordedCommand::CopyTexture {
                    src: fixture.gbuffer.depth().handle,
                    dst: fixture.main.depth.handle,
                }
            })
            .unwrap();
        let markers = commands
            .iter()
            .position(|c| matches!(c, RecordedCommand::BeginRenderPass { label, .. } if label.as_deref() == Some("Light Markers")))
            .unwrap();
        assert!(copy < markers);
    }

    #[test]
    fn test_shadow_pass_skips_non_casters() {
        let mut fixture = fixture();
        run_frame(&mut fixture, &FrameState::default());
        let commands = fixture.backend.commands();
        let begin = commands
            .iter()
            .position(|c| matches!(c, RecordedCommand::BeginRenderPass { depth_view, .. } if *depth_view == Some(fixture.shadow.texture.view)))
            .unwrap();
        let end = begin + commands[begin..].iter().position(|c| *c == RecordedCommand::EndRenderPass).unwrap();
        let draws = commands[begin..end]
            .iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { .. }))
            .count();
        assert_eq!(draws, 1);
        assert!(commands[begin..end].contains(&RecordedCommand::SetViewport {
            width: 64.0,
            height: 64.0
        }));
    }

    #[test]
    fn test_overlays_keep_main_target_contents() {
        let mut fixture = fixture();
        run_frame(&mut fixture, &FrameState::default());
        let main_color = fixture.main.color.view;
        let overlay_clears: Vec<bool> = fixture
            .backend
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginRenderPass {
                    color_views,
                    clears_color,
                    label,
                    ..
                } if color_views.contains(&main_color) => Some((label.clone(), *clears_color)),
                _ => None,
            })
            .map(|(label, clears)| clears == (label.as_deref() == Some("Lighting")))
            .collect();
        assert_eq!(overlay_clears, vec![true, true, true]);
    }
}
