//! Frame sequencing through the renderer on a recording backend.

mod common;

use pbr_deferred::backend::{
    BackendFeatures, DummyBackend, PolygonMode, RecordedCommand, TextureFormat, TextureViewHandle,
};
use pbr_deferred::frame::DebugView;
use pbr_deferred::input::InputState;
use pbr_deferred::{Renderer, RendererConfig};
use rstest::rstest;
use tempfile::TempDir;
use winit::keyboard::KeyCode;

fn tap(renderer: &mut Renderer<DummyBackend>, input: &mut InputState, key: KeyCode) {
    input.key_down(key);
    renderer.update(input, 0.0);
    input.end_frame();
    input.key_up(key);
    renderer.update(input, 0.0);
    input.end_frame();
}

/// Polygon mode of the pipeline bound inside the "Geometry" pass
fn geometry_polygon_mode(backend: &DummyBackend) -> Option<PolygonMode> {
    let commands = backend.commands();
    let begin = commands.iter().position(
        |c| matches!(c, RecordedCommand::BeginRenderPass { label, .. } if label.as_deref() == Some("Geometry")),
    )?;
    commands[begin..].iter().find_map(|c| match c {
        RecordedCommand::SetPipeline(pipeline) => backend.pipeline(*pipeline).map(|d| d.polygon_mode),
        _ => None,
    })
}

#[test]
fn test_pass_order() {
    let assets = TempDir::new().unwrap();
    let renderer = common::dummy_renderer(assets.path());
    assert_eq!(
        renderer.pass_names(),
        vec!["shadow", "geometry", "lighting", "depth_copy", "light_markers", "skybox", "present"]
    );
}

fn view_format(backend: &DummyBackend, view: TextureViewHandle) -> Option<TextureFormat> {
    let view = backend.texture_view(view)?;
    backend.texture(view.texture).map(|t| t.desc.format)
}

#[test]
fn test_geometry_fills_every_gbuffer_slot() {
    let assets = TempDir::new().unwrap();
    let mut renderer = common::dummy_renderer(assets.path());
    renderer.backend_mut().clear_commands();
    renderer.render_frame().unwrap();

    let backend = renderer.backend();
    let commands = backend.commands();
    let begin = commands
        .iter()
        .position(|c| matches!(c, RecordedCommand::BeginRenderPass { label, .. } if label.as_deref() == Some("Geometry")))
        .unwrap();
    let RecordedCommand::BeginRenderPass {
        color_views,
        depth_view,
        clears_color,
        ..
    } = &commands[begin]
    else {
        unreachable!()
    };
    assert!(*clears_color);
    let formats: Vec<_> = color_views.iter().map(|&v| view_format(backend, v)).collect();
    assert_eq!(formats, vec![Some(TextureFormat::Rgba16Float); 6]);
    let depth = (*depth_view).and_then(|v| view_format(backend, v));
    assert_eq!(depth, Some(TextureFormat::Depth32Float));

    let pipeline = commands[begin..]
        .iter()
        .find_map(|c| match c {
            RecordedCommand::SetPipeline(h) => backend.pipeline(*h),
            _ => None,
        })
        .unwrap();
    let targets: Vec<_> = pipeline.color_targets.iter().map(|t| t.format).collect();
    assert_eq!(targets, vec![TextureFormat::Rgba16Float; 6]);
    assert_eq!(
        pipeline.depth_stencil.as_ref().map(|d| d.format),
        Some(TextureFormat::Depth32Float)
    );
}

#[rstest]
#[case::once(1, DebugView::Position)]
#[case::albedo(3, DebugView::Albedo)]
#[case::ao(6, DebugView::Ao)]
#[case::wraps(7, DebugView::Composite)]
#[case::wraps_past(9, DebugView::Normal)]
fn test_debug_view_cycles(#[case] presses: usize, #[case] expected: DebugView) {
    let assets = TempDir::new().unwrap();
    let mut renderer = common::dummy_renderer(assets.path());
    let mut input = InputState::new();
    for _ in 0..presses {
        tap(&mut renderer, &mut input, KeyCode::Digit1);
    }
    assert_eq!(renderer.state().view, expected);

    renderer.backend_mut().clear_commands();
    renderer.render_frame().unwrap();
    assert_eq!(renderer.backend().render_pass_labels().last().map(String::as_str), Some("Present"));
}

#[test]
fn test_wireframe_switches_geometry_pipeline() {
    let assets = TempDir::new().unwrap();
    let mut renderer = common::dummy_renderer(assets.path());
    let mut input = InputState::new();

    renderer.render_frame().unwrap();
    assert_eq!(geometry_polygon_mode(renderer.backend()), Some(PolygonMode::Fill));

    tap(&mut renderer, &mut input, KeyCode::Digit3);
    renderer.backend_mut().clear_commands();
    renderer.render_frame().unwrap();
    assert_eq!(geometry_polygon_mode(renderer.backend()), Some(PolygonMode::Line));
}

#[test]
fn test_wireframe_without_line_support_stays_filled() {
    let assets = TempDir::new().unwrap();
    let backend = DummyBackend::new(320, 200).with_features(BackendFeatures {
        clamp_to_border: true,
        polygon_mode_line: false,
    });
    let config = RendererConfig {
        assets: assets.path().to_path_buf(),
        ibl: common::small_ibl_config(),
        ..RendererConfig::default()
    };
    let mut renderer = Renderer::new(backend, &config).unwrap();
    let mut input = InputState::new();

    tap(&mut renderer, &mut input, KeyCode::Digit3);
    assert!(renderer.state().wireframe);
    renderer.render_frame().unwrap();
    assert_eq!(geometry_polygon_mode(renderer.backend()), Some(PolygonMode::Fill));
}

#[test]
fn test_resize_keeps_deferred_targets() {
    let assets = TempDir::new().unwrap();
    let mut renderer = common::dummy_renderer(assets.path());
    renderer.resize(640, 400);
    renderer.backend_mut().clear_commands();
    renderer.render_frame().unwrap();

    let viewports: Vec<(f32, f32)> = renderer
        .backend()
        .commands()
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::SetViewport { width, height } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    // geometry at creation size, present at the new swapchain size
    assert!(viewports.contains(&(320.0, 200.0)));
    assert_eq!(viewports.last(), Some(&(640.0, 400.0)));
}

#[test]
fn test_escape_requests_quit() {
    let assets = TempDir::new().unwrap();
    let mut renderer = common::dummy_renderer(assets.path());
    let mut input = InputState::new();
    input.key_down(KeyCode::Escape);
    assert!(renderer.update(&input, 0.0).quit);
}
