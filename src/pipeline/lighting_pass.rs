//! Deferred lighting pass
//!
//! Fullscreen resolve of the G-buffer: Cook-Torrance direct light from every
//! point light (shadowed for the shadow light), diffuse irradiance and
//! split-sum specular IBL scaled by ambient occlusion, then tone mapping
//! into the 8-bit main target. Pixels with no geometry keep the clear colour.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::ibl::IblMaps;
use crate::pipeline::{
    fullscreen_pipeline, GBuffer, GBufferSlot, ShadowMap, BRDF_LUT, FULLSCREEN_WGSL, IRRADIANCE_MAP,
    MAIN_COLOR, MAIN_COLOR_FORMAT, PREFILTER_MAP, SHADOW_MAP, TONEMAP_WGSL,
};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use crate::render_graph::RenderGraphError;

/// Deferred lighting pass
pub struct LightingPass {
    pipeline: RenderPipelineHandle,
    /// Lighting uniform, G-buffer, shadow and IBL groups
    bind_groups: [BindGroupHandle; 3],
    size: (u32, u32),
    output: Option<ResourceId>,
}

impl LightingPass {
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        lighting_buffer: BufferHandle,
        gbuffer: &GBuffer,
        shadow: &ShadowMap,
        ibl: &IblMaps,
    ) -> BackendResult<Self> {
        let uniform_layout =
            backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::FRAGMENT)])?;

        let gbuffer_entries: Vec<BindGroupLayoutEntry> = (0u32..)
            .zip(GBufferSlot::ALL)
            .map(|(binding, _)| {
                BindGroupLayoutEntry::texture(
                    binding,
                    TextureSampleType::Float { filterable: false },
                    TextureViewDimension::D2,
                )
            })
            .collect();
        let gbuffer_layout = backend.create_bind_group_layout(&gbuffer_entries)?;

        let ibl_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Depth, TextureViewDimension::D2),
            BindGroupLayoutEntry::texture(1, TextureSampleType::Float { filterable: true }, TextureViewDimension::Cube),
            BindGroupLayoutEntry::texture(2, TextureSampleType::Float { filterable: true }, TextureViewDimension::Cube),
            BindGroupLayoutEntry::texture(3, TextureSampleType::Float { filterable: true }, TextureViewDimension::D2),
            BindGroupLayoutEntry::sampler(4, SamplerBindingType::Filtering),
        ])?;

        let pipeline = backend.create_render_pipeline(&fullscreen_pipeline(
            "Lighting Pipeline",
            format!("{FULLSCREEN_WGSL}{TONEMAP_WGSL}{LIGHTING_SHADER}"),
            "fs_lighting",
            vec![uniform_layout, gbuffer_layout, ibl_layout],
            MAIN_COLOR_FORMAT,
        ))?;

        let uniform_group = backend.create_bind_group(uniform_layout, &[(0, BindGroupEntry::buffer(lighting_buffer))])?;

        let gbuffer_group_entries: Vec<(u32, BindGroupEntry)> = (0u32..)
            .zip(GBufferSlot::ALL)
            .map(|(binding, slot)| (binding, BindGroupEntry::Texture(gbuffer.slot(slot).view)))
            .collect();
        let gbuffer_group = match backend.create_bind_group(gbuffer_layout, &gbuffer_group_entries) {
            Ok(group) => group,
            Err(e) => {
                backend.destroy_bind_group(uniform_group);
                return Err(e);
            }
        };

        let ibl_group = match backend.create_bind_group(
            ibl_layout,
            &[
                (0, BindGroupEntry::Texture(shadow.texture.view)),
                (1, BindGroupEntry::Texture(ibl.irradiance_map.view)),
                (2, BindGroupEntry::Texture(ibl.prefilter_map.view)),
                (3, BindGroupEntry::Texture(ibl.brdf_lut.view)),
                (4, BindGroupEntry::Sampler(ibl.prefilter_map.sampler)),
            ],
        ) {
            Ok(group) => group,
            Err(e) => {
                backend.destroy_bind_group(uniform_group);
                backend.destroy_bind_group(gbuffer_group);
                return Err(e);
            }
        };

        Ok(Self {
            pipeline,
            bind_groups: [uniform_group, gbuffer_group, ibl_group],
            size: gbuffer.size(),
            output: None,
        })
    }
}

impl RenderPass for LightingPass {
    fn name(&self) -> &str {
        "lighting"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        for slot in GBufferSlot::ALL {
            ctx.read_named(slot.resource_name(), ResourceUsage::TextureRead);
        }
        ctx.read_named(SHADOW_MAP, ResourceUsage::TextureRead);
        ctx.read_named(IRRADIANCE_MAP, ResourceUsage::TextureRead);
        ctx.read_named(PREFILTER_MAP, ResourceUsage::TextureRead);
        ctx.read_named(BRDF_LUT, ResourceUsage::TextureRead);
        self.output = ctx.write_named(MAIN_COLOR, ResourceUsage::RenderTarget);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) -> Result<(), RenderGraphError> {
        let Some(output) = self.output else {
            return Ok(());
        };
        let output_view = ctx.view(output)?;
        let clear_color = ctx.frame.state.clear_color;
        let backend = &mut *ctx.backend;

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Lighting".into()),
            color_attachments: vec![ColorAttachment {
                view: output_view,
                resolve_target: None,
                load_op: LoadOp::Clear(clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });

        backend.set_viewport(0.0, 0.0, self.size.0 as f32, self.size.1 as f32, 0.0, 1.0);
        backend.set_render_pipeline(self.pipeline);
        for (index, group) in (0u32..).zip(self.bind_groups) {
            backend.set_bind_group(index, group);
        }
        backend.draw(0..3, 0..1);

        backend.end_render_pass();
        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for group in self.bind_groups {
            backend.destroy_bind_group(group);
        }
    }
}

const LIGHTING_SHADER: &str = r#"
const PI: f32 = 3.14159265359;
const MAX_LIGHTS: u32 = 4u;

struct LightingUniform {
    camera_position: vec4<f32>,
    light_positions: array<vec4<f32>, 4>,
    light_colors: array<vec4<f32>, 4>,
    light_view_proj: mat4x4<f32>,
    light_count: u32,
    shadow_light: u32,
    max_reflection_lod: f32,
    _pad: u32,
}

@group(0) @binding(0) var<uniform> lighting: LightingUniform;

@group(1) @binding(0) var g_position: texture_2d<f32>;
@group(1) @binding(1) var g_normal: texture_2d<f32>;
@group(1) @binding(2) var g_albedo: texture_2d<f32>;
@group(1) @binding(3) var g_metallic: texture_2d<f32>;
@group(1) @binding(4) var g_roughness: texture_2d<f32>;
@group(1) @binding(5) var g_ao: texture_2d<f32>;

@group(2) @binding(0) var shadow_map: texture_depth_2d;
@group(2) @binding(1) var irradiance_map: texture_cube<f32>;
@group(2) @binding(2) var prefilter_map: texture_cube<f32>;
@group(2) @binding(3) var brdf_lut: texture_2d<f32>;
@group(2) @binding(4) var ibl_sampler: sampler;

fn distribution_ggx(n: vec3<f32>, h: vec3<f32>, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let n_dot_h = max(dot(n, h), 0.0);
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * denom * denom);
}

fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    return n_dot_x / (n_dot_x * (1.0 - k) + k);
}

fn geometry_smith(n: vec3<f32>, v: vec3<f32>, l: vec3<f32>, roughness: f32) -> f32 {
    return geometry_schlick_ggx(max(dot(n, v), 0.0), roughness)
        * geometry_schlick_ggx(max(dot(n, l), 0.0), roughness);
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (1.0 - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

fn fresnel_schlick_roughness(cos_theta: f32, f0: vec3<f32>, roughness: f32) -> vec3<f32> {
    return f0 + (max(vec3<f32>(1.0 - roughness), f0) - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

// 1.0 when the shadow map records an occluder between the light and the point
fn shadow_factor(world_position: vec3<f32>, n: vec3<f32>, l: vec3<f32>) -> f32 {
    let clip = lighting.light_view_proj * vec4<f32>(world_position, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    // outside the light frustum counts as lit
    if ndc.z > 1.0 || any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) {
        return 0.0;
    }
    let size = vec2<i32>(textureDimensions(shadow_map));
    let texel = clamp(vec2<i32>(uv * vec2<f32>(size)), vec2<i32>(0), size - vec2<i32>(1));
    let closest = textureLoad(shadow_map, texel, 0);
    let bias = max(0.05 * (1.0 - dot(n, l)), 0.005);
    return select(0.0, 1.0, ndc.z - bias > closest);
}

@fragment
fn fs_lighting(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(in.clip_position.xy);
    let position_sample = textureLoad(g_position, pixel, 0);
    if position_sample.a == 0.0 {
        discard;
    }

    let world_position = position_sample.xyz;
    let n = normalize(textureLoad(g_normal, pixel, 0).xyz);
    let albedo = textureLoad(g_albedo, pixel, 0).rgb;
    let metallic = textureLoad(g_metallic, pixel, 0).r;
    let roughness = textureLoad(g_roughness, pixel, 0).r;
    let ao = textureLoad(g_ao, pixel, 0).r;

    let v = normalize(lighting.camera_position.xyz - world_position);
    let r = reflect(-v, n);
    let n_dot_v = max(dot(n, v), 0.0);
    let f0 = mix(vec3<f32>(0.04), albedo, metallic);

    var lo = vec3<f32>(0.0);
    for (var i = 0u; i < min(lighting.light_count, MAX_LIGHTS); i++) {
        let to_light = lighting.light_positions[i].xyz - world_position;
        let l = normalize(to_light);
        let h = normalize(v + l);
        let distance = length(to_light);
        let radiance = lighting.light_colors[i].rgb / (distance * distance);

        let ndf = distribution_ggx(n, h, roughness);
        let g = geometry_smith(n, v, l, roughness);
        let f = fresnel_schlick(max(dot(h, v), 0.0), f0);
        let n_dot_l = max(dot(n, l), 0.0);
        let specular = ndf * g * f / (4.0 * n_dot_v * n_dot_l + 0.0001);
        let kd = (vec3<f32>(1.0) - f) * (1.0 - metallic);

        var visibility = 1.0;
        if i == lighting.shadow_light {
            visibility = 1.0 - shadow_factor(world_position, n, l);
        }
        lo += (kd * albedo / PI + specular) * radiance * n_dot_l * visibility;
    }

    let f = fresnel_schlick_roughness(n_dot_v, f0, roughness);
    let kd = (vec3<f32>(1.0) - f) * (1.0 - metallic);
    let irradiance = textureSampleLevel(irradiance_map, ibl_sampler, n, 0.0).rgb;
    let diffuse = irradiance * albedo;

    let prefiltered = textureSampleLevel(prefilter_map, ibl_sampler, r, roughness * lighting.max_reflection_lod).rgb;
    let brdf = textureSampleLevel(brdf_lut, ibl_sampler, vec2<f32>(n_dot_v, roughness), 0.0).rg;
    let specular = prefiltered * (f * brdf.x + brdf.y);

    let ambient = (kd * diffuse + specular) * ao;
    return vec4<f32>(tonemap(ambient + lo), 1.0);
}
"#;
