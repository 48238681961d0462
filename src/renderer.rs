//! Frame orchestrator
//!
//! Owns every GPU resource of the viewer: scene meshes and materials, IBL
//! maps, the deferred targets and the frame graph. [`Renderer::render_frame`]
//! uploads the per-frame uniforms and records one pass of the graph.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::frame::{FrameChanges, FrameState, MaterialMode};
use crate::ibl::{IblError, IblMaps, IblPrecompute};
use crate::input::InputState;
use crate::pipeline::uniforms::{bytes_of, CameraUniformData, LightingUniform, ObjectUniform, SkyboxUniform};
use crate::pipeline::{
    DepthCopyPass, DrawItem, FrameGraph, FrameInputs, FramePasses, FrameTargets, GBuffer, GeometryPass,
    LightMarkerPass, LightingPass, MainTargets, PresentPass, SceneLayouts, ShadowMap, ShadowPass, SkyboxPass,
};
use crate::render_graph::RenderGraphError;
use crate::resources::texture::{self, GpuTexture, TextureError};
use crate::resources::{obj, GpuMesh, Mesh, ObjError, PbrTextures};
use crate::scene::{
    Camera, CameraController, FreeFlyController, LightSet, MeshSource, SceneDescription, SceneObject, TextureSet,
};
use crate::RendererConfig;
use glam::Vec4;
use std::collections::HashMap;
use thiserror::Error;

/// Segments and rings of the sphere used by the grid and the light markers
const SPHERE_DETAIL: u32 = 64;
/// Environment used when the HDR panorama cannot be loaded
const FALLBACK_ENVIRONMENT: [u8; 4] = [51, 51, 51, 255];

#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Ibl(#[from] IblError),
    #[error("Failed to load mesh: {0}")]
    Obj(#[from] ObjError),
    #[error(transparent)]
    RenderGraph(#[from] RenderGraphError),
}

pub type RendererResult<T> = Result<T, RendererError>;

/// Per-object GPU resources
struct GpuObject {
    mesh: usize,
    uniform: BufferHandle,
    bind_group: BindGroupHandle,
    source: SceneObject,
}

/// Uniform buffers written every frame (or once, for the static light camera)
struct FrameUniforms {
    camera: BufferHandle,
    light_camera: BufferHandle,
    lighting: BufferHandle,
    skybox: BufferHandle,
    camera_group: BindGroupHandle,
    light_camera_group: BindGroupHandle,
}

impl FrameUniforms {
    fn new<B: GraphicsBackend + ?Sized>(backend: &mut B, layouts: &SceneLayouts) -> BackendResult<Self> {
        let camera = uniform_buffer(backend, "Camera Uniform", std::mem::size_of::<CameraUniformData>())?;
        let light_camera =
            uniform_buffer(backend, "Light Camera Uniform", std::mem::size_of::<CameraUniformData>())?;
        let lighting = uniform_buffer(backend, "Lighting Uniform", std::mem::size_of::<LightingUniform>())?;
        let skybox = uniform_buffer(backend, "Skybox Uniform", std::mem::size_of::<SkyboxUniform>())?;
        let camera_group = layouts.camera_bind_group(backend, camera)?;
        let light_camera_group = layouts.camera_bind_group(backend, light_camera)?;
        Ok(Self {
            camera,
            light_camera,
            lighting,
            skybox,
            camera_group,
            light_camera_group,
        })
    }

    fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_bind_group(self.camera_group);
        backend.destroy_bind_group(self.light_camera_group);
        for buffer in [self.camera, self.light_camera, self.lighting, self.skybox] {
            backend.destroy_buffer(buffer);
        }
    }
}

fn uniform_buffer<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    label: &str,
    size: usize,
) -> BackendResult<BufferHandle> {
    backend.create_buffer(&BufferDescriptor {
        label: Some(label.to_string()),
        size: size as u64,
        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        mapped_at_creation: false,
    })
}

fn object_uniform(object: &SceneObject, mode: MaterialMode) -> ObjectUniform {
    let textured = match mode {
        MaterialMode::Textured => 1.0,
        MaterialMode::Untextured => 0.0,
    };
    let material = &object.material;
    ObjectUniform {
        model: object.transform.matrix(),
        normal_matrix: object.transform.normal_matrix(),
        albedo: material.albedo.extend(1.0),
        material: Vec4::new(material.metallic, material.roughness, material.ao, textured),
    }
}

/// The deferred PBR renderer
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    camera: Camera,
    controller: FreeFlyController,
    lights: LightSet,
    state: FrameState,
    uniforms: FrameUniforms,
    meshes: Vec<GpuMesh>,
    materials: HashMap<TextureSet, PbrTextures>,
    objects: Vec<GpuObject>,
    ibl: IblMaps,
    /// Loaded from `skybox_dir`; `None` draws the captured environment
    skybox: Option<GpuTexture>,
    gbuffer: GBuffer,
    shadow: ShadowMap,
    main: MainTargets,
    graph: FrameGraph,
}

impl<B: GraphicsBackend + 'static> Renderer<B> {
    pub fn new(mut backend: B, config: &RendererConfig) -> RendererResult<Self> {
        log::info!("Initializing renderer on {}", backend.name());
        let (width, height) = backend.surface_size();
        let (width, height) = (width.max(1), height.max(1));

        let lights = LightSet::demo(config.shadow.extent, config.shadow.near, config.shadow.far);
        let scene = SceneDescription::demo(lights.clone());
        let layouts = SceneLayouts::new(&mut backend)?;

        // sphere first: the grid and the light markers share it
        let mut meshes = vec![GpuMesh::upload(&mut backend, &Mesh::sphere(SPHERE_DETAIL, SPHERE_DETAIL))?];
        let cube = GpuMesh::upload(&mut backend, &Mesh::cube())?;
        meshes.push(cube.clone());
        let mut mesh_sources: Vec<(MeshSource, usize)> = vec![(MeshSource::Sphere, 0)];

        let mut materials = HashMap::new();
        for set in scene.texture_sets() {
            let dir = config.asset_path(set.directory());
            log::info!("Loading texture set {:?} from {}", set, dir.display());
            materials.insert(set, PbrTextures::load(&mut backend, &dir, set.files())?);
        }

        let uniforms = FrameUniforms::new(&mut backend, &layouts)?;
        let state = FrameState::new(config.clear_color);

        let mut objects = Vec::with_capacity(scene.objects.len());
        for object in scene.objects {
            let mesh = match mesh_sources.iter().find(|(source, _)| *source == object.mesh) {
                Some(&(_, index)) => index,
                None => {
                    let Some(mesh) = Self::build_mesh(&mut backend, config, &object)? else {
                        continue;
                    };
                    meshes.push(mesh);
                    mesh_sources.push((object.mesh.clone(), meshes.len() - 1));
                    meshes.len() - 1
                }
            };
            let Some(textures) = materials.get(&object.textures) else {
                continue;
            };

            let data = object_uniform(&object, state.material_mode);
            let uniform = backend.create_buffer_init(
                &BufferDescriptor {
                    label: Some(format!("{} uniform", object.name)),
                    size: std::mem::size_of::<ObjectUniform>() as u64,
                    usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                    mapped_at_creation: false,
                },
                bytes_of(&data),
            )?;
            let bind_group = layouts.object_bind_group(&mut backend, uniform, textures)?;
            objects.push(GpuObject {
                mesh,
                uniform,
                bind_group,
                source: object,
            });
        }
        log::info!("Scene: {} objects, {} meshes", objects.len(), meshes.len());

        let hdr_path = config.asset_path(&config.hdr);
        let hdr = match texture::load_hdr(&mut backend, &hdr_path) {
            Ok(hdr) => hdr,
            Err(TextureError::Backend(e)) => return Err(e.into()),
            Err(e) => {
                log::error!("Environment could not be loaded: {}", e);
                texture::placeholder(&mut backend, FALLBACK_ENVIRONMENT, "fallback environment")?
            }
        };
        let ibl = IblPrecompute::run(&mut backend, &hdr, &config.ibl);
        hdr.destroy(&mut backend);
        let ibl = ibl?;

        let skybox = match &config.skybox_dir {
            Some(dir) => match texture::load_cubemap(&mut backend, dir) {
                Ok(cubemap) => Some(cubemap),
                Err(TextureError::Backend(e)) => return Err(e.into()),
                Err(e) => {
                    log::error!("Skybox cube map could not be loaded, using the environment: {}", e);
                    None
                }
            },
            None => None,
        };

        let gbuffer = GBuffer::new(&mut backend, width, height)?;
        let shadow = ShadowMap::new(&mut backend, config.shadow.resolution)?;
        let main = MainTargets::new(&mut backend, width, height)?;

        let light_camera = lights.shadow_camera();
        backend.write_buffer(uniforms.light_camera, 0, bytes_of(&light_camera));

        let skybox_source = skybox.as_ref().unwrap_or(&ibl.env_map);
        let passes = FramePasses {
            shadow: ShadowPass::new(&mut backend, &layouts, uniforms.light_camera_group, shadow.resolution)?,
            geometry: GeometryPass::new(&mut backend, &layouts, uniforms.camera_group, gbuffer.size())?,
            lighting: LightingPass::new(&mut backend, uniforms.lighting, &gbuffer, &shadow, &ibl)?,
            depth_copy: DepthCopyPass::new(&gbuffer, &main),
            markers: LightMarkerPass::new(
                &mut backend,
                &layouts,
                uniforms.camera_group,
                meshes[0].clone(),
                &lights,
                (width, height),
            )?,
            skybox: SkyboxPass::new(&mut backend, uniforms.skybox, cube, skybox_source, (width, height))?,
            present: PresentPass::new(&mut backend, &main, &gbuffer)?,
        };
        let graph = FrameGraph::new(
            passes,
            &FrameTargets {
                gbuffer: &gbuffer,
                shadow: &shadow,
                main: &main,
                ibl: &ibl,
                skybox: skybox_source,
            },
        )?;

        let camera = Camera::viewer(width as f32 / height as f32);

        Ok(Self {
            backend,
            camera,
            controller: FreeFlyController::new(),
            lights,
            state,
            uniforms,
            meshes,
            materials,
            objects,
            ibl,
            skybox,
            gbuffer,
            shadow,
            main,
            graph,
        })
    }

    /// Upload the geometry of `object`. A missing OBJ file is logged and yields `None`.
    fn build_mesh(backend: &mut B, config: &RendererConfig, object: &SceneObject) -> RendererResult<Option<GpuMesh>> {
        let mesh = match &object.mesh {
            MeshSource::Sphere => Mesh::sphere(SPHERE_DETAIL, SPHERE_DETAIL),
            MeshSource::Plane {
                half_extent,
                y,
                uv_scale,
            } => Mesh::plane(*half_extent, *y, *uv_scale),
            MeshSource::Obj(path) => {
                let path = config.asset_path(path);
                match obj::load(&path) {
                    Ok(parsed) => {
                        log::info!("Loaded {} ({} triangles)", path.display(), parsed.triangle_count());
                        Mesh::from_obj(&object.name, &parsed)
                    }
                    Err(e @ ObjError::Open { .. }) => {
                        log::error!("Skipping '{}': {}", object.name, e);
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        Ok(Some(GpuMesh::upload(backend, &mesh)?))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn pass_names(&self) -> Vec<String> {
        self.graph.pass_names()
    }

    /// Apply key bindings and fly the camera; `dt_ms` is the frame time in milliseconds
    pub fn update(&mut self, input: &InputState, dt_ms: f32) -> FrameChanges {
        let changes = self.state.apply_input(input);
        if changes.material_mode_changed {
            for object in &self.objects {
                let data = object_uniform(&object.source, self.state.material_mode);
                self.backend.write_buffer(object.uniform, 0, bytes_of(&data));
            }
        }
        self.controller.update(&mut self.camera, &input.camera_input(), dt_ms);
        changes
    }

    /// Record and present one frame
    pub fn render_frame(&mut self) -> RendererResult<()> {
        let camera = self.camera.uniform_data();
        self.backend.write_buffer(self.uniforms.camera, 0, bytes_of(&camera));
        let lighting = self
            .lights
            .lighting_uniform(self.camera.position, self.ibl.max_reflection_lod());
        self.backend.write_buffer(self.uniforms.lighting, 0, bytes_of(&lighting));
        let skybox = self.camera.skybox_uniform();
        self.backend.write_buffer(self.uniforms.skybox, 0, bytes_of(&skybox));

        let frame = match self.backend.begin_frame() {
            Ok(frame) => frame,
            Err(BackendError::SurfaceLost) => {
                let (width, height) = self.backend.surface_size();
                log::warn!("Surface lost, reconfiguring at {}x{}", width, height);
                self.backend.resize(width, height);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let draws: Vec<DrawItem> = self
            .objects
            .iter()
            .map(|object| DrawItem {
                mesh: &self.meshes[object.mesh],
                object: object.bind_group,
                casts_shadow: object.source.casts_shadow,
            })
            .collect();
        let inputs = FrameInputs {
            state: &self.state,
            draws: &draws,
            extent: (frame.width, frame.height),
        };
        self.graph.execute(&mut self.backend, frame.swapchain_view, &inputs)?;
        self.backend.end_frame()?;
        Ok(())
    }

    /// Resize the swapchain and the camera aspect. The deferred targets keep
    /// their creation size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.backend.resize(width, height);
        self.camera.set_aspect(width as f32, height as f32);
        let (gw, gh) = self.gbuffer.size();
        if (gw, gh) != (width, height) {
            log::warn!(
                "Window resized to {}x{}; G-buffer and shadow map stay at {}x{} and {}",
                width,
                height,
                gw,
                gh,
                self.shadow.resolution
            );
        }
    }

    /// Destroy every GPU resource and hand the backend back
    pub fn shutdown(self) -> B {
        let Self {
            mut backend,
            uniforms,
            meshes,
            materials,
            objects,
            ibl,
            skybox,
            gbuffer,
            shadow,
            main,
            graph,
            ..
        } = self;

        graph.release(&mut backend);
        for object in objects {
            backend.destroy_bind_group(object.bind_group);
            backend.destroy_buffer(object.uniform);
        }
        uniforms.destroy(&mut backend);
        for mesh in meshes {
            mesh.destroy(&mut backend);
        }
        for (_, textures) in materials {
            textures.destroy(&mut backend);
        }
        ibl.destroy(&mut backend);
        if let Some(skybox) = skybox {
            skybox.destroy(&mut backend);
        }
        gbuffer.destroy(&mut backend);
        shadow.destroy(&mut backend);
        main.destroy(&mut backend);
        log::info!("Renderer shut down");
        backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCommand};
    use crate::ibl::IblConfig;
    use winit::keyboard::KeyCode;

    fn small_config() -> RendererConfig {
        RendererConfig {
            assets: std::env::temp_dir().join("pbr-deferred-no-assets"),
            ibl: IblConfig {
                env_resolution: 16,
                irradiance_resolution: 4,
                prefilter_resolution: 8,
                prefilter_mip_levels: 2,
                prefilter_sample_count: 4,
                irradiance_sample_delta: 0.5,
                brdf_resolution: 4,
            },
            ..RendererConfig::default()
        }
    }

    #[test]
    fn test_missing_meshes_are_skipped() {
        let renderer = Renderer::new(DummyBackend::new(320, 200), &small_config()).unwrap();
        // ground plane plus the sphere grid; both OBJ files are absent
        assert_eq!(renderer.object_count(), 1 + 49);
    }

    #[test]
    fn test_frame_presents_once() {
        let mut renderer = Renderer::new(DummyBackend::new(320, 200), &small_config()).unwrap();
        renderer.backend.clear_commands();
        renderer.render_frame().unwrap();

        let commands = renderer.backend().commands();
        assert_eq!(commands.last(), Some(&RecordedCommand::Present));
        assert_eq!(
            renderer.backend().render_pass_labels(),
            vec!["Shadow", "Geometry", "Lighting", "Light Markers", "Skybox", "Present"]
        );
    }

    #[test]
    fn test_material_mode_rewrites_object_uniforms() {
        let mut renderer = Renderer::new(DummyBackend::new(320, 200), &small_config()).unwrap();
        renderer.backend.clear_commands();

        let mut input = InputState::new();
        input.key_down(KeyCode::Digit4);
        let changes = renderer.update(&input, 16.0);
        assert!(changes.material_mode_changed);
        assert_eq!(renderer.state().material_mode, MaterialMode::Untextured);

        let writes = renderer
            .backend()
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::WriteBuffer { .. }))
            .count();
        assert_eq!(writes, renderer.object_count());
    }

    #[test]
    fn test_shutdown_releases_gpu_resources() {
        let mut renderer = Renderer::new(DummyBackend::new(320, 200), &small_config()).unwrap();
        renderer.render_frame().unwrap();
        let backend = renderer.shutdown();
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_texture_view_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
