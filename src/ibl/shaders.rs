//! WGSL sources for the IBL precompute passes

/// Vertex stage shared by the three cube capture shaders.
const CAPTURE_COMMON: &str = r#"
const PI: f32 = 3.14159265359;

struct CaptureUniform {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> capture: CaptureUniform;

struct VertexInput {
    @location(0) position: vec3<f32>,
}

struct CaptureOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local_pos: vec3<f32>,
}

@vertex
fn vs_capture(in: VertexInput) -> CaptureOutput {
    var out: CaptureOutput;
    out.local_pos = in.position;
    out.clip_position = capture.proj * capture.view * vec4<f32>(in.position, 1.0);
    return out;
}
"#;

const EQUIRECT_FS: &str = r#"
@group(0) @binding(1) var equirect_map: texture_2d<f32>;
@group(0) @binding(2) var equirect_sampler: sampler;

fn sample_spherical(v: vec3<f32>) -> vec2<f32> {
    let inv_atan = vec2<f32>(0.1591, 0.3183);
    let uv = vec2<f32>(atan2(v.z, v.x), asin(clamp(v.y, -1.0, 1.0))) * inv_atan + 0.5;
    // image row 0 is the top of the panorama
    return vec2<f32>(uv.x, 1.0 - uv.y);
}

@fragment
fn fs_equirect(in: CaptureOutput) -> @location(0) vec4<f32> {
    let uv = sample_spherical(normalize(in.local_pos));
    let color = textureSampleLevel(equirect_map, equirect_sampler, uv, 0.0).rgb;
    return vec4<f32>(color, 1.0);
}
"#;

const IRRADIANCE_FS: &str = r#"
struct IrradianceUniform {
    sample_delta: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(1) var environment_map: texture_cube<f32>;
@group(0) @binding(2) var environment_sampler: sampler;
@group(0) @binding(3) var<uniform> params: IrradianceUniform;

@fragment
fn fs_irradiance(in: CaptureOutput) -> @location(0) vec4<f32> {
    let normal = normalize(in.local_pos);
    var up = vec3<f32>(0.0, 1.0, 0.0);
    if abs(normal.y) > 0.999 {
        up = vec3<f32>(1.0, 0.0, 0.0);
    }
    let right = normalize(cross(up, normal));
    up = normalize(cross(normal, right));

    let delta = params.sample_delta;
    var irradiance = vec3<f32>(0.0);
    var samples = 0.0;
    for (var phi = 0.0; phi < 2.0 * PI; phi += delta) {
        for (var theta = 0.0; theta < 0.5 * PI; theta += delta) {
            let tangent = vec3<f32>(sin(theta) * cos(phi), sin(theta) * sin(phi), cos(theta));
            let dir = tangent.x * right + tangent.y * up + tangent.z * normal;
            let radiance = textureSampleLevel(environment_map, environment_sampler, dir, 0.0).rgb;
            irradiance += radiance * cos(theta) * sin(theta);
            samples += 1.0;
        }
    }
    return vec4<f32>(PI * irradiance / max(samples, 1.0), 1.0);
}
"#;

/// Hammersley and GGX sampling, shared by the prefilter and BRDF shaders.
const SAMPLING: &str = r#"
fn radical_inverse_vdc(bits: u32) -> f32 {
    return f32(reverseBits(bits)) * 2.3283064365386963e-10;
}

fn hammersley(i: u32, n: u32) -> vec2<f32> {
    return vec2<f32>(f32(i) / f32(n), radical_inverse_vdc(i));
}

fn importance_sample_ggx(xi: vec2<f32>, n: vec3<f32>, roughness: f32) -> vec3<f32> {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = sqrt((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y));
    let sin_theta = sqrt(1.0 - cos_theta * cos_theta);
    let h = vec3<f32>(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta);

    var up = vec3<f32>(1.0, 0.0, 0.0);
    if abs(n.z) < 0.999 {
        up = vec3<f32>(0.0, 0.0, 1.0);
    }
    let tangent = normalize(cross(up, n));
    let bitangent = cross(n, tangent);
    return normalize(tangent * h.x + bitangent * h.y + n * h.z);
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * denom * denom);
}
"#;

const PREFILTER_FS: &str = r#"
struct PrefilterUniform {
    roughness: f32,
    resolution: f32,
    sample_count: u32,
    _pad: u32,
}

@group(0) @binding(1) var environment_map: texture_cube<f32>;
@group(0) @binding(2) var environment_sampler: sampler;
@group(0) @binding(3) var<uniform> params: PrefilterUniform;

@fragment
fn fs_prefilter(in: CaptureOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.local_pos);
    let r = n;
    let v = r;

    let roughness = params.roughness;
    let count = params.sample_count;
    let sa_texel = 4.0 * PI / (6.0 * params.resolution * params.resolution);

    var color = vec3<f32>(0.0);
    var weight = 0.0;
    for (var i = 0u; i < count; i++) {
        let xi = hammersley(i, count);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);

        let n_dot_l = max(dot(n, l), 0.0);
        if n_dot_l > 0.0 {
            let n_dot_h = max(dot(n, h), 0.0);
            let h_dot_v = max(dot(h, v), 0.0);
            let pdf = distribution_ggx(n_dot_h, roughness) * n_dot_h / (4.0 * h_dot_v) + 0.0001;
            let sa_sample = 1.0 / (f32(count) * pdf + 0.0001);
            let mip = select(0.5 * log2(sa_sample / sa_texel), 0.0, roughness == 0.0);

            color += textureSampleLevel(environment_map, environment_sampler, l, mip).rgb * n_dot_l;
            weight += n_dot_l;
        }
    }
    return vec4<f32>(color / max(weight, 0.0001), 1.0);
}
"#;

const BRDF: &str = r#"
const SAMPLE_COUNT: u32 = 1024u;

struct QuadOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> QuadOutput {
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    var out: QuadOutput;
    out.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    // x = n.v, y = roughness, laid out in texture coordinates
    out.uv = vec2<f32>(x * 0.5 + 0.5, 0.5 - y * 0.5);
    return out;
}

fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    return n_dot_x / (n_dot_x * (1.0 - k) + k);
}

@fragment
fn fs_brdf(in: QuadOutput) -> @location(0) vec2<f32> {
    let n_dot_v = max(in.uv.x, 0.001);
    let roughness = in.uv.y;
    let v = vec3<f32>(sqrt(1.0 - n_dot_v * n_dot_v), 0.0, n_dot_v);
    let n = vec3<f32>(0.0, 0.0, 1.0);

    var a = 0.0;
    var b = 0.0;
    for (var i = 0u; i < SAMPLE_COUNT; i++) {
        let xi = hammersley(i, SAMPLE_COUNT);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);

        let n_dot_l = max(l.z, 0.0);
        let n_dot_h = max(h.z, 0.0);
        let v_dot_h = max(dot(v, h), 0.0);

        if n_dot_l > 0.0 {
            let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v);
            let fc = pow(1.0 - v_dot_h, 5.0);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    return vec2<f32>(a, b) / f32(SAMPLE_COUNT);
}
"#;

pub fn equirect_to_cube() -> String {
    format!("{CAPTURE_COMMON}{EQUIRECT_FS}")
}

pub fn irradiance() -> String {
    format!("{CAPTURE_COMMON}{IRRADIANCE_FS}")
}

pub fn prefilter() -> String {
    format!("{CAPTURE_COMMON}{SAMPLING}{PREFILTER_FS}")
}

pub fn brdf() -> String {
    format!("const PI: f32 = 3.14159265359;\n{SAMPLING}{BRDF}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points_present() {
        assert!(equirect_to_cube().contains("fn vs_capture") && equirect_to_cube().contains("fn fs_equirect"));
        assert!(irradiance().contains("fn fs_irradiance"));
        assert!(prefilter().contains("fn fs_prefilter") && prefilter().contains("fn hammersley"));
        assert!(brdf().contains("fn vs_fullscreen") && brdf().contains("fn fs_brdf"));
    }

    #[test]
    fn test_pi_defined_once() {
        for src in [equirect_to_cube(), irradiance(), prefilter(), brdf()] {
            assert_eq!(src.matches("const PI").count(), 1);
        }
    }
}
