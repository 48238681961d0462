//! Image-based lighting precomputation
//!
//! Four phases run once at startup, each consuming the previous one's output:
//! 1. Environment capture: the equirectangular HDR projected onto a cube map
//! 2. Irradiance convolution: cosine-weighted hemisphere integral per texel
//! 3. Specular prefilter: GGX-convolved cube map, one roughness per mip
//! 4. BRDF integration: split-sum (scale, bias) lookup table
//!
//! Every phase renders through its own [`CaptureTarget`], released when the
//! phase ends whether it succeeded or not.

pub mod capture;
pub mod sampling;
pub mod shaders;

pub use capture::{capture_projection, CaptureTarget, CubeFace};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::{bytes_of, CaptureUniform, IrradianceUniform, PrefilterUniform};
use crate::resources::{
    allocate_empty_cubemap, allocate_render_target, mip_count, GpuMesh, GpuTexture, Mesh,
};
use thiserror::Error;

const CUBE_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
const LUT_FORMAT: TextureFormat = TextureFormat::Rg16Float;
const CAPTURE_DEPTH: TextureFormat = TextureFormat::Depth32Float;

#[derive(Error, Debug)]
pub enum IblError {
    #[error("Invalid IBL configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Resolutions and sample counts of the precomputed maps
#[derive(Debug, Clone, PartialEq)]
pub struct IblConfig {
    pub env_resolution: u32,
    pub irradiance_resolution: u32,
    pub prefilter_resolution: u32,
    pub prefilter_mip_levels: u32,
    pub prefilter_sample_count: u32,
    /// Angular step of the irradiance hemisphere walk, radians
    pub irradiance_sample_delta: f32,
    pub brdf_resolution: u32,
}

impl Default for IblConfig {
    fn default() -> Self {
        Self {
            env_resolution: 512,
            irradiance_resolution: 32,
            prefilter_resolution: 128,
            prefilter_mip_levels: 5,
            prefilter_sample_count: 1024,
            irradiance_sample_delta: 0.025,
            brdf_resolution: 512,
        }
    }
}

impl IblConfig {
    pub fn validate(&self) -> Result<(), IblError> {
        let counts = [
            ("env_resolution", self.env_resolution),
            ("irradiance_resolution", self.irradiance_resolution),
            ("prefilter_resolution", self.prefilter_resolution),
            ("prefilter_sample_count", self.prefilter_sample_count),
            ("brdf_resolution", self.brdf_resolution),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(IblError::InvalidConfig(format!("{name} must be non-zero")));
        }
        let max_mips = mip_count(self.prefilter_resolution, self.prefilter_resolution);
        if self.prefilter_mip_levels == 0 || self.prefilter_mip_levels > max_mips {
            return Err(IblError::InvalidConfig(format!(
                "prefilter_mip_levels must be in 1..={max_mips}, got {}",
                self.prefilter_mip_levels
            )));
        }
        if !(self.irradiance_sample_delta > 0.0) {
            return Err(IblError::InvalidConfig(
                "irradiance_sample_delta must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Outputs of the precompute pipeline
#[derive(Debug, Clone)]
pub struct IblMaps {
    pub env_map: GpuTexture,
    pub irradiance_map: GpuTexture,
    pub prefilter_map: GpuTexture,
    pub brdf_lut: GpuTexture,
}

impl IblMaps {
    /// Highest mip of the prefilter map, the LOD used for roughness 1
    pub fn max_reflection_lod(&self) -> f32 {
        self.prefilter_map.mip_levels.saturating_sub(1) as f32
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        for map in [self.env_map, self.irradiance_map, self.prefilter_map, self.brdf_lut] {
            map.destroy(backend);
        }
    }
}

/// GPU objects shared by the cube phases.
struct CaptureKit {
    cube: GpuMesh,
    capture_uniform: BufferHandle,
    params_uniform: BufferHandle,
    /// uniform, 2D texture, sampler
    equirect_layout: BindGroupLayoutHandle,
    /// uniform, cube texture, sampler, params
    cube_layout: BindGroupLayoutHandle,
}

impl CaptureKit {
    fn new<B: GraphicsBackend + ?Sized>(backend: &mut B) -> BackendResult<Self> {
        let equirect_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX),
            BindGroupLayoutEntry::texture(
                1,
                TextureSampleType::Float { filterable: true },
                TextureViewDimension::D2,
            ),
            BindGroupLayoutEntry::sampler(2, SamplerBindingType::Filtering),
        ])?;
        let cube_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX),
            BindGroupLayoutEntry::texture(
                1,
                TextureSampleType::Float { filterable: true },
                TextureViewDimension::Cube,
            ),
            BindGroupLayoutEntry::sampler(2, SamplerBindingType::Filtering),
            BindGroupLayoutEntry::uniform(3, ShaderStageFlags::FRAGMENT),
        ])?;

        let cube = GpuMesh::upload(backend, &Mesh::cube())?;
        let capture_uniform =
            match uniform_buffer(backend, "Capture Uniform", std::mem::size_of::<CaptureUniform>()) {
                Ok(buffer) => buffer,
                Err(e) => {
                    cube.destroy(backend);
                    return Err(e);
                }
            };
        let params_uniform =
            match uniform_buffer(backend, "IBL Params Uniform", std::mem::size_of::<PrefilterUniform>()) {
                Ok(buffer) => buffer,
                Err(e) => {
                    cube.destroy(backend);
                    backend.destroy_buffer(capture_uniform);
                    return Err(e);
                }
            };

        Ok(Self {
            cube,
            capture_uniform,
            params_uniform,
            equirect_layout,
            cube_layout,
        })
    }

    fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        self.cube.destroy(backend);
        backend.destroy_buffer(self.capture_uniform);
        backend.destroy_buffer(self.params_uniform);
    }

    fn pipeline<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        label: &str,
        shader: String,
        fragment_entry: &'static str,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<RenderPipelineHandle> {
        backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label.to_string()),
            shader,
            vertex_entry: "vs_capture",
            fragment_entry: Some(fragment_entry),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            // the camera sits inside the cube
            cull_mode: CullMode::None,
            polygon_mode: PolygonMode::Fill,
            depth_stencil: Some(DepthStencilState {
                format: CAPTURE_DEPTH,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
            }),
            color_targets: vec![ColorTargetState::opaque(CUBE_FORMAT)],
        })
    }

    /// Bind group sampling a cube map in the convolution shaders.
    fn cube_source<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        source: &GpuTexture,
    ) -> BackendResult<BindGroupHandle> {
        backend.create_bind_group(
            self.cube_layout,
            &[
                (0, BindGroupEntry::buffer(self.capture_uniform)),
                (1, BindGroupEntry::Texture(source.view)),
                (2, BindGroupEntry::Sampler(source.sampler)),
                (3, BindGroupEntry::buffer(self.params_uniform)),
            ],
        )
    }

    /// Render the unit cube once per face into `mip` of `cubemap`.
    ///
    /// Each face is submitted on its own so the matrices written to the shared
    /// uniform are the ones that face executes with.
    #[allow(clippy::too_many_arguments)]
    fn render_faces<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        target: &mut CaptureTarget,
        pipeline: RenderPipelineHandle,
        bind_group: BindGroupHandle,
        cubemap: &GpuTexture,
        mip: u32,
        label: &str,
    ) -> BackendResult<()> {
        let proj = capture_projection();
        for face in CubeFace::ALL {
            let uniform = CaptureUniform {
                view: face.view(),
                proj,
            };
            backend.write_buffer(self.capture_uniform, 0, bytes_of(&uniform));

            let view = target.bind_face(backend, cubemap, face, mip)?;
            backend.begin_render_pass(&target.clear_pass(&format!("{label} {}", face.label()), view));
            let (x, y, w, h) = target.viewport();
            backend.set_viewport(x, y, w, h, 0.0, 1.0);
            backend.set_render_pipeline(pipeline);
            backend.set_bind_group(0, bind_group);
            self.cube.draw(backend);
            backend.end_render_pass();
            backend.submit();
        }
        Ok(())
    }
}

/// Runs the four phases in order.
pub struct IblPrecompute;

impl IblPrecompute {
    pub fn run<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        hdr: &GpuTexture,
        config: &IblConfig,
    ) -> Result<IblMaps, IblError> {
        config.validate()?;
        log::info!("IBL: precomputing from {}", hdr.name);
        let kit = CaptureKit::new(backend)?;
        let result = run_phases(backend, &kit, hdr, config);
        kit.destroy(backend);
        if result.is_ok() {
            log::info!("IBL: precompute finished");
        }
        result
    }
}

fn run_phases<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    kit: &CaptureKit,
    hdr: &GpuTexture,
    config: &IblConfig,
) -> Result<IblMaps, IblError> {
    let env_map = capture_environment(backend, kit, hdr, config.env_resolution)?;

    let irradiance_map = match convolve_irradiance(backend, kit, &env_map, config) {
        Ok(map) => map,
        Err(e) => {
            env_map.destroy(backend);
            return Err(e);
        }
    };

    let prefilter_map = match prefilter_specular(backend, kit, &env_map, config) {
        Ok(map) => map,
        Err(e) => {
            env_map.destroy(backend);
            irradiance_map.destroy(backend);
            return Err(e);
        }
    };

    let brdf_lut = match integrate_brdf_lut(backend, config.brdf_resolution) {
        Ok(lut) => lut,
        Err(e) => {
            for map in [env_map, irradiance_map, prefilter_map] {
                map.destroy(backend);
            }
            return Err(e);
        }
    };

    Ok(IblMaps {
        env_map,
        irradiance_map,
        prefilter_map,
        brdf_lut,
    })
}

fn capture_environment<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    kit: &CaptureKit,
    hdr: &GpuTexture,
    resolution: u32,
) -> Result<GpuTexture, IblError> {
    log::info!("IBL: capturing environment map at {}x{}", resolution, resolution);
    let env_map = allocate_empty_cubemap(backend, "Environment Map", resolution, 1, CUBE_FORMAT)?;

    let result = (|| -> BackendResult<()> {
        let pipeline = kit.pipeline(
            backend,
            "Equirect To Cube",
            shaders::equirect_to_cube(),
            "fs_equirect",
            kit.equirect_layout,
        )?;
        let bind_group = backend.create_bind_group(
            kit.equirect_layout,
            &[
                (0, BindGroupEntry::buffer(kit.capture_uniform)),
                (1, BindGroupEntry::Texture(hdr.view)),
                (2, BindGroupEntry::Sampler(hdr.sampler)),
            ],
        )?;
        let rendered = CaptureTarget::scoped(backend, resolution, resolution, CAPTURE_DEPTH, |target, backend| {
            kit.render_faces(backend, target, pipeline, bind_group, &env_map, 0, "Environment Capture")
        });
        backend.destroy_bind_group(bind_group);
        rendered
    })();

    finish_phase(backend, env_map, result, "environment map")
}

fn convolve_irradiance<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    kit: &CaptureKit,
    env_map: &GpuTexture,
    config: &IblConfig,
) -> Result<GpuTexture, IblError> {
    let resolution = config.irradiance_resolution;
    log::info!("IBL: convolving irradiance map at {}x{}", resolution, resolution);
    let irradiance = allocate_empty_cubemap(backend, "Irradiance Map", resolution, 1, CUBE_FORMAT)?;

    let params = IrradianceUniform {
        sample_delta: config.irradiance_sample_delta,
        _pad: [0.0; 3],
    };
    backend.write_buffer(kit.params_uniform, 0, bytes_of(&params));

    let result = (|| -> BackendResult<()> {
        let pipeline = kit.pipeline(
            backend,
            "Irradiance Convolution",
            shaders::irradiance(),
            "fs_irradiance",
            kit.cube_layout,
        )?;
        let bind_group = kit.cube_source(backend, env_map)?;
        let rendered = CaptureTarget::scoped(backend, resolution, resolution, CAPTURE_DEPTH, |target, backend| {
            kit.render_faces(backend, target, pipeline, bind_group, &irradiance, 0, "Irradiance Convolution")
        });
        backend.destroy_bind_group(bind_group);
        rendered
    })();

    finish_phase(backend, irradiance, result, "irradiance map")
}

fn prefilter_specular<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    kit: &CaptureKit,
    env_map: &GpuTexture,
    config: &IblConfig,
) -> Result<GpuTexture, IblError> {
    let base = config.prefilter_resolution;
    let mips = config.prefilter_mip_levels;
    log::info!("IBL: prefiltering specular map at {}x{} with {} mips", base, base, mips);
    let prefilter = allocate_empty_cubemap(backend, "Prefilter Map", base, mips, CUBE_FORMAT)?;

    let result = (|| -> BackendResult<()> {
        let pipeline = kit.pipeline(
            backend,
            "Specular Prefilter",
            shaders::prefilter(),
            "fs_prefilter",
            kit.cube_layout,
        )?;
        let bind_group = kit.cube_source(backend, env_map)?;
        let rendered = CaptureTarget::scoped(backend, base, base, CAPTURE_DEPTH, |target, backend| {
            for mip in 0..mips {
                let size = sampling::mip_size(base, mip);
                target.resize(backend, size, size)?;

                let params = PrefilterUniform {
                    roughness: sampling::prefilter_roughness(mip, mips),
                    resolution: env_map.width as f32,
                    sample_count: config.prefilter_sample_count,
                    _pad: 0,
                };
                log::debug!(
                    "IBL: prefilter mip {} at {}x{}, roughness {:.2}",
                    mip,
                    size,
                    size,
                    params.roughness
                );
                backend.write_buffer(kit.params_uniform, 0, bytes_of(&params));
                kit.render_faces(backend, target, pipeline, bind_group, &prefilter, mip, "Specular Prefilter")?;
            }
            Ok(())
        });
        backend.destroy_bind_group(bind_group);
        rendered
    })();

    finish_phase(backend, prefilter, result, "prefilter map")
}

fn integrate_brdf_lut<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    resolution: u32,
) -> Result<GpuTexture, IblError> {
    log::info!("IBL: integrating BRDF LUT at {}x{}", resolution, resolution);
    let sampler = SamplerDescriptor {
        label: Some("BRDF LUT Sampler".into()),
        ..SamplerDescriptor::default()
    };
    let lut = allocate_render_target(
        backend,
        "BRDF LUT",
        resolution,
        resolution,
        LUT_FORMAT,
        TextureUsage::TEXTURE_BINDING,
        &sampler,
    )?;

    let result = (|| -> BackendResult<()> {
        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("BRDF Integration".into()),
            shader: shaders::brdf(),
            vertex_entry: "vs_fullscreen",
            fragment_entry: Some("fs_brdf"),
            vertex_layouts: vec![],
            bind_group_layouts: vec![],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            polygon_mode: PolygonMode::Fill,
            depth_stencil: Some(DepthStencilState {
                format: CAPTURE_DEPTH,
                depth_write_enabled: false,
                depth_compare: CompareFunction::Always,
            }),
            color_targets: vec![ColorTargetState::opaque(LUT_FORMAT)],
        })?;
        CaptureTarget::scoped(backend, resolution, resolution, CAPTURE_DEPTH, |target, backend| {
            let view = target.bind_texture(backend, &lut)?;
            backend.begin_render_pass(&target.clear_pass("BRDF Integration", view));
            let (x, y, w, h) = target.viewport();
            backend.set_viewport(x, y, w, h, 0.0, 1.0);
            backend.set_render_pipeline(pipeline);
            backend.draw(0..3, 0..1);
            backend.end_render_pass();
            backend.submit();
            Ok(())
        })
    })();

    finish_phase(backend, lut, result, "BRDF LUT")
}

/// Hand back `output` on success, or destroy it and surface the error.
fn finish_phase<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    output: GpuTexture,
    result: BackendResult<()>,
    what: &str,
) -> Result<GpuTexture, IblError> {
    match result {
        Ok(()) => {
            log::info!("IBL: {} ready", what);
            Ok(output)
        }
        Err(e) => {
            log::error!("IBL: {} failed: {}", what, e);
            output.destroy(backend);
            Err(e.into())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCommand};
    use crate::resources::placeholder;

    fn small_config() -> IblConfig {
        IblConfig {
            env_resolution: 64,
            irradiance_resolution: 8,
            prefilter_resolution: 32,
            prefilter_mip_levels: 5,
            prefilter_sample_count: 16,
            irradiance_sample_delta: 0.5,
            brdf_resolution: 16,
        }
    }

    fn precompute(backend: &mut DummyBackend, config: &IblConfig) -> (GpuTexture, Result<IblMaps, IblError>) {
        let hdr = placeholder(backend, [255, 255, 255, 255], "sky").unwrap();
        backend.clear_commands();
        let maps = IblPrecompute::run(backend, &hdr, config);
        (hdr, maps)
    }

    #[test]
    fn test_phases_run_in_order() {
        let mut backend = DummyBackend::new(64, 64);
        let (_hdr, maps) = precompute(&mut backend, &small_config());
        maps.unwrap();

        let labels = backend.render_pass_labels();
        let phase = |prefix: &str| labels.iter().position(|l| l.starts_with(prefix)).unwrap();
        assert!(phase("Environment Capture") < phase("Irradiance Convolution"));
        assert!(phase("Irradiance Convolution") < phase("Specular Prefilter"));
        assert!(phase("Specular Prefilter") < phase("BRDF Integration"));

        let count = |prefix: &str| labels.iter().filter(|l| l.starts_with(prefix)).count();
        assert_eq!(count("Environment Capture"), 6);
        assert_eq!(count("Irradiance Convolution"), 6);
        assert_eq!(count("Specular Prefilter"), 30);
        assert_eq!(labels.last().map(String::as_str), Some("BRDF Integration"));
    }

    #[test]
    fn test_prefilter_viewport_follows_mip() {
        let mut backend = DummyBackend::new(64, 64);
        let config = IblConfig {
            prefilter_resolution: 128,
            ..small_config()
        };
        let (_hdr, maps) = precompute(&mut backend, &config);
        maps.unwrap();

        let mut in_prefilter = false;
        let mut widths = Vec::new();
        for cmd in backend.commands() {
            match cmd {
                RecordedCommand::BeginRenderPass { label, .. } => {
                    in_prefilter = label
                        .as_deref()
                        .is_some_and(|l| l.starts_with("Specular Prefilter"));
                }
                RecordedCommand::SetViewport { width, .. } if in_prefilter => widths.push(*width as u32),
                _ => {}
            }
        }
        assert_eq!(widths.len(), 30);
        let per_mip: Vec<u32> = widths.chunks(6).map(|c| c[0]).collect();
        assert_eq!(per_mip, vec![128, 64, 32, 16, 8]);
        assert!(widths.chunks(6).all(|c| c.iter().all(|w| *w == c[0])));
    }

    #[test]
    fn test_every_face_is_submitted() {
        let mut backend = DummyBackend::new(64, 64);
        let (_hdr, maps) = precompute(&mut backend, &small_config());
        maps.unwrap();

        let submits = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Submit))
            .count();
        assert_eq!(submits, 6 + 6 + 30 + 1);
    }

    #[test]
    fn test_outputs_and_no_leaks() {
        let mut backend = DummyBackend::new(64, 64);
        let (hdr, maps) = precompute(&mut backend, &small_config());
        let maps = maps.unwrap();

        assert_eq!(maps.env_map.width, 64);
        assert_eq!(maps.irradiance_map.width, 8);
        assert_eq!(maps.prefilter_map.mip_levels, 5);
        assert_eq!(maps.max_reflection_lod(), 4.0);
        assert_eq!(
            backend.texture(maps.brdf_lut.handle).map(|t| t.desc.format),
            Some(TextureFormat::Rg16Float)
        );

        // the source plus four outputs
        assert_eq!(backend.live_texture_count(), 5);
        assert_eq!(backend.live_buffer_count(), 0);

        maps.destroy(&mut backend);
        hdr.destroy(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_texture_view_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut backend = DummyBackend::new(64, 64);
        let config = IblConfig {
            prefilter_mip_levels: 9,
            ..small_config()
        };
        let (_hdr, maps) = precompute(&mut backend, &config);
        assert!(matches!(maps, Err(IblError::InvalidConfig(_))));
        assert!(backend.render_pass_labels().is_empty());

        let zero = IblConfig {
            brdf_resolution: 0,
            ..small_config()
        };
        assert!(zero.validate().is_err());
        assert!(IblConfig::default().validate().is_ok());
    }
}
