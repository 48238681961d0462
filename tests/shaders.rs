//! Every WGSL module the renderer builds must pass naga validation.

mod common;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use pbr_deferred::backend::{DummyBackend, RenderPipelineDescriptor};
use pbr_deferred::{Renderer, RendererConfig};
use rstest::rstest;
use tempfile::TempDir;

const FACES: [&str; 6] = ["right.jpg", "left.jpg", "top.jpg", "bottom.jpg", "front.jpg", "back.jpg"];

fn validate(desc: &RenderPipelineDescriptor) -> Result<(), String> {
    let label = desc.label.as_deref().unwrap_or("<unlabeled>");
    let module = naga::front::wgsl::parse_str(&desc.shader)
        .map_err(|e| format!("{label}: {}", e.emit_to_string(&desc.shader)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| format!("{label}: {}", e.emit_to_string(&desc.shader)))?;

    let entries: Vec<&str> = std::iter::once(desc.vertex_entry).chain(desc.fragment_entry).collect();
    for entry in entries {
        if !module.entry_points.iter().any(|ep| ep.name == entry) {
            return Err(format!("{label}: no entry point '{entry}'"));
        }
    }
    Ok(())
}

#[rstest]
#[case::captured_environment(false)]
#[case::loaded_skybox(true)]
fn test_all_pipelines_validate(#[case] skybox: bool) {
    let assets = TempDir::new().unwrap();
    let mut config = RendererConfig {
        assets: assets.path().to_path_buf(),
        ibl: common::small_ibl_config(),
        ..RendererConfig::default()
    };
    if skybox {
        common::write_faces(assets.path(), &FACES, 4);
        config.skybox_dir = Some(assets.path().to_path_buf());
    }
    let renderer = Renderer::new(DummyBackend::new(320, 200), &config).unwrap();

    let pipelines = renderer.backend().pipelines();
    // four capture phases plus the frame passes
    assert!(pipelines.len() >= 11, "only {} pipelines", pipelines.len());
    let failures: Vec<String> = pipelines.into_iter().filter_map(|p| validate(p).err()).collect();
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn test_lighting_reads_shadow_depth_by_texel() {
    let assets = TempDir::new().unwrap();
    let renderer = common::dummy_renderer(assets.path());
    let lighting = renderer
        .backend()
        .pipelines()
        .into_iter()
        .find(|p| p.label.as_deref() == Some("Lighting Pipeline"))
        .unwrap();
    validate(lighting).unwrap();
    assert!(lighting.shader.contains("textureLoad(shadow_map"));
}
