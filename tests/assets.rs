//! Asset loading against files on disk.

mod common;

use pbr_deferred::backend::{DummyBackend, RecordedCommand, TextureFormat, TextureKind};
use pbr_deferred::resources::texture::{self, TextureError, CUBEMAP_FACE_FILES};
use pbr_deferred::resources::{obj, ObjError};
use rstest::rstest;
use tempfile::TempDir;

#[rstest]
#[case::single(1)]
#[case::pair(2)]
#[case::many(5)]
fn test_obj_packs_eight_floats_per_corner(#[case] faces: usize) {
    let dir = TempDir::new().unwrap();
    let path = common::write_text(dir.path(), "soup.obj", &common::triangle_soup(faces));

    let mesh = obj::load(&path).unwrap();
    assert_eq!(mesh.packed.len(), 3 * faces * 8);
    assert_eq!(mesh.triangle_count(), faces);
}

#[test]
fn test_obj_mixed_face_formats_are_rejected() {
    let dir = TempDir::new().unwrap();
    let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\n\
                  f 1/1/1 2/1/1 3/1/1\n\
                  f 1//1 2//1 3//1\n";
    let path = common::write_text(dir.path(), "mixed.obj", source);

    let err = obj::load(&path).unwrap_err();
    assert!(matches!(err, ObjError::FaceFormatMismatch { line: 7, .. }), "{err}");
    assert_eq!(err.code(), -5);
}

#[test]
fn test_obj_missing_file_is_open_error() {
    let dir = TempDir::new().unwrap();
    let err = obj::load(dir.path().join("absent.obj")).unwrap_err();
    assert!(matches!(err, ObjError::Open { .. }));
    assert_eq!(err.code(), -1);
}

#[test]
fn test_hdr_loader_rejects_ldr_images() {
    let dir = TempDir::new().unwrap();
    let path = common::write_png(dir.path(), "panorama.png", 8, 4);
    let mut backend = DummyBackend::new(64, 64);

    let err = texture::load_hdr(&mut backend, &path).unwrap_err();
    assert!(matches!(err, TextureError::NotHdr { .. }), "{err}");
    assert_eq!(backend.live_texture_count(), 0);
}

#[test]
fn test_hdr_loads_as_half_float() {
    let dir = TempDir::new().unwrap();
    let path = common::write_hdr(dir.path(), "panorama.hdr", 8, 4, [2.0, 1.0, 0.5]);
    let mut backend = DummyBackend::new(64, 64);

    let hdr = texture::load_hdr(&mut backend, &path).unwrap();
    assert_eq!(hdr.format, TextureFormat::Rgba16Float);
    assert_eq!((hdr.width, hdr.height), (8, 4));
    assert_eq!(hdr.mip_levels, 1);
    assert_eq!(hdr.kind, TextureKind::D2);
}

#[test]
fn test_cubemap_with_missing_face_allocates_nothing() {
    let dir = TempDir::new().unwrap();
    common::write_faces(dir.path(), &CUBEMAP_FACE_FILES[..5], 4);
    let mut backend = DummyBackend::new(64, 64);

    let err = texture::load_cubemap(&mut backend, dir.path()).unwrap_err();
    assert!(matches!(err, TextureError::MissingFace { face: "back.jpg", .. }), "{err}");
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_texture_view_count(), 0);
}

#[test]
fn test_cubemap_faces_must_share_a_size() {
    let dir = TempDir::new().unwrap();
    common::write_faces(dir.path(), &CUBEMAP_FACE_FILES[..5], 4);
    common::write_faces(dir.path(), &CUBEMAP_FACE_FILES[5..], 8);
    let mut backend = DummyBackend::new(64, 64);

    let err = texture::load_cubemap(&mut backend, dir.path()).unwrap_err();
    assert!(matches!(err, TextureError::FaceSizeMismatch { .. }), "{err}");
    assert_eq!(backend.live_texture_count(), 0);
}

#[test]
fn test_cubemap_uploads_six_layers() {
    let dir = TempDir::new().unwrap();
    common::write_faces(dir.path(), &CUBEMAP_FACE_FILES, 4);
    let mut backend = DummyBackend::new(64, 64);

    let cube = texture::load_cubemap(&mut backend, dir.path()).unwrap();
    assert_eq!(cube.kind, TextureKind::Cube);
    assert_eq!((cube.width, cube.height), (4, 4));

    let layers: Vec<u32> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::WriteTexture { texture, region } if *texture == cube.handle => {
                Some(region.array_layer)
            }
            _ => None,
        })
        .collect();
    assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
}
