//! Wavefront OBJ loading
//!
//! Supports the four face record shapes `v`, `v/vt`, `v//vn` and `v/vt/vn`.
//! A file must use exactly one of them; the first face record fixes the
//! shape for the rest of the file. Faces with more than three corners are
//! fan-triangulated, and the result is de-indexed into a flat stream of
//! `position, uv, normal` records.

use crate::backend::types::Vertex;
use glam::{Vec2, Vec3};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Floats per packed vertex record.
pub const PACKED_STRIDE: usize = Vertex::FLOATS;

/// OBJ parse failures. Each kind maps to a stable negative status code.
#[derive(Error, Debug)]
pub enum ObjError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: malformed vertex record")]
    Vertex { line: usize },

    #[error("line {line}: malformed texture coordinate record")]
    Uv { line: usize },

    #[error("line {line}: malformed normal record")]
    Normal { line: usize },

    #[error("line {line}: face format {found:?} does not match {expected:?}")]
    FaceFormatMismatch {
        line: usize,
        expected: FaceFormat,
        found: FaceFormat,
    },

    #[error("line {line}: malformed face record: {reason}")]
    FaceRecord { line: usize, reason: String },
}

impl ObjError {
    pub fn code(&self) -> i32 {
        match self {
            ObjError::Open { .. } => -1,
            ObjError::Vertex { .. } => -2,
            ObjError::Uv { .. } => -3,
            ObjError::Normal { .. } => -4,
            ObjError::FaceFormatMismatch { .. } | ObjError::FaceRecord { .. } => -5,
        }
    }
}

/// Shape of a single face corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceFormat {
    /// `v`
    V,
    /// `v/vt`
    VVt,
    /// `v//vn`
    VVn,
    /// `v/vt/vn`
    VVtVn,
}

impl FaceFormat {
    fn detect(corner: &str) -> Option<Self> {
        let parts: Vec<&str> = corner.split('/').collect();
        match parts.as_slice() {
            [_] => Some(FaceFormat::V),
            [_, _] => Some(FaceFormat::VVt),
            [_, "", _] => Some(FaceFormat::VVn),
            [_, _, _] => Some(FaceFormat::VVtVn),
            _ => None,
        }
    }

    pub fn has_uv(self) -> bool {
        matches!(self, FaceFormat::VVt | FaceFormat::VVtVn)
    }

    pub fn has_normal(self) -> bool {
        matches!(self, FaceFormat::VVn | FaceFormat::VVtVn)
    }
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    v: usize,
    vt: Option<usize>,
    vn: Option<usize>,
}

/// Parsed OBJ data.
#[derive(Debug, Clone, Default)]
pub struct ObjMesh {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    /// Corner count of every `f` record, before triangulation.
    pub face_sizes: Vec<usize>,
    /// Face format shared by the whole file, `None` when there are no faces.
    pub format: Option<FaceFormat>,
    /// Interleaved `position(3) uv(2) normal(3)` records, three per triangle.
    pub packed: Vec<f32>,
}

impl ObjMesh {
    pub fn vertex_count(&self) -> usize {
        self.packed.len() / PACKED_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    pub fn to_vertices(&self) -> Vec<Vertex> {
        bytemuck::cast_slice::<f32, Vertex>(&self.packed).to_vec()
    }
}

/// Load and parse an OBJ file from disk.
pub fn load(path: impl AsRef<Path>) -> Result<ObjMesh, ObjError> {
    let path = path.as_ref();
    log::info!("Loading obj: {}", path.display());
    let source = std::fs::read_to_string(path).map_err(|source| ObjError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mesh = parse(&source)?;
    log::debug!(
        "{}: {} positions, {} faces, {} triangles",
        path.display(),
        mesh.positions.len(),
        mesh.face_sizes.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Parse OBJ source text.
pub fn parse(source: &str) -> Result<ObjMesh, ObjError> {
    let mut mesh = ObjMesh::default();
    let mut corners: Vec<Corner> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let mut tokens = raw.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let [x, y, z] = parse_floats(&mut tokens).ok_or(ObjError::Vertex { line })?;
                mesh.positions.push(Vec3::new(x, y, z));
            }
            "vt" => {
                // The optional w component is ignored.
                let [u, v] = parse_floats(&mut tokens).ok_or(ObjError::Uv { line })?;
                mesh.uvs.push(Vec2::new(u, v));
            }
            "vn" => {
                let [x, y, z] = parse_floats(&mut tokens).ok_or(ObjError::Normal { line })?;
                mesh.normals.push(Vec3::new(x, y, z));
            }
            "f" => {
                let start = corners.len();
                for token in tokens {
                    let found = FaceFormat::detect(token).ok_or_else(|| ObjError::FaceRecord {
                        line,
                        reason: format!("unrecognised corner '{token}'"),
                    })?;
                    let expected = *mesh.format.get_or_insert(found);
                    if expected != found {
                        return Err(ObjError::FaceFormatMismatch {
                            line,
                            expected,
                            found,
                        });
                    }
                    corners.push(parse_corner(token, found, line)?);
                }
                let count = corners.len() - start;
                if count < 3 {
                    return Err(ObjError::FaceRecord {
                        line,
                        reason: format!("face has {count} corners"),
                    });
                }
                mesh.face_sizes.push(count);
            }
            _ => {}
        }
    }

    mesh.packed = pack(&mesh, &corners)?;
    Ok(mesh)
}

fn parse_floats<'a, const N: usize>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for slot in &mut out {
        *slot = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

fn parse_corner(token: &str, format: FaceFormat, line: usize) -> Result<Corner, ObjError> {
    let mut parts = token.split('/');
    let v = corner_index(&mut parts, "position", line)?;
    let (vt, vn) = match format {
        FaceFormat::V => (None, None),
        FaceFormat::VVt => (Some(corner_index(&mut parts, "uv", line)?), None),
        FaceFormat::VVn => {
            if parts.next() != Some("") {
                return Err(ObjError::FaceRecord {
                    line,
                    reason: format!("'{token}' is not a v//vn corner"),
                });
            }
            (None, Some(corner_index(&mut parts, "normal", line)?))
        }
        FaceFormat::VVtVn => {
            let vt = corner_index(&mut parts, "uv", line)?;
            (Some(vt), Some(corner_index(&mut parts, "normal", line)?))
        }
    };
    Ok(Corner { v, vt, vn })
}

/// Next 1-based index of a corner, converted to 0-based
fn corner_index<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    what: &str,
    line: usize,
) -> Result<usize, ObjError> {
    let part = parts.next().unwrap_or_default();
    match part.parse::<i64>() {
        Ok(i) if i >= 1 => Ok((i - 1) as usize),
        _ => Err(ObjError::FaceRecord {
            line,
            reason: format!("invalid {what} index '{part}'"),
        }),
    }
}

fn pack(mesh: &ObjMesh, corners: &[Corner]) -> Result<Vec<f32>, ObjError> {
    let resolve = |corner: &Corner| -> Result<Vertex, String> {
        let position = *mesh
            .positions
            .get(corner.v)
            .ok_or_else(|| format!("position index {} out of range", corner.v + 1))?;
        let uv = match corner.vt {
            Some(i) => *mesh
                .uvs
                .get(i)
                .ok_or_else(|| format!("uv index {} out of range", i + 1))?,
            None => Vec2::ZERO,
        };
        let normal = match corner.vn {
            Some(i) => *mesh
                .normals
                .get(i)
                .ok_or_else(|| format!("normal index {} out of range", i + 1))?,
            None => Vec3::ZERO,
        };
        Ok(Vertex::new(position, uv, normal))
    };

    let triangles: usize = mesh.face_sizes.iter().map(|n| n - 2).sum();
    let mut packed = Vec::with_capacity(triangles * 3 * PACKED_STRIDE);
    let mut start = 0;

    for (face, &size) in mesh.face_sizes.iter().enumerate() {
        let face_corners = &corners[start..start + size];
        start += size;

        let vertices = face_corners
            .iter()
            .map(resolve)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| ObjError::FaceRecord {
                line: 0,
                reason: format!("face {}: {reason}", face + 1),
            })?;

        for i in 1..size - 1 {
            for vertex in [vertices[0], vertices[i], vertices[i + 1]] {
                packed.extend_from_slice(bytemuck::cast_slice(&[vertex]));
            }
        }
    }

    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
# one triangle
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_triangle_packs_eight_floats_per_corner() {
        let mesh = parse(TRIANGLE).unwrap();
        assert_eq!(mesh.format, Some(FaceFormat::VVtVn));
        assert_eq!(mesh.packed.len(), 3 * PACKED_STRIDE);
        assert_eq!(&mesh.packed[8..16], &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_quad_is_fan_triangulated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.face_sizes, vec![4]);
        assert_eq!(mesh.triangle_count(), 2);
        let verts = mesh.to_vertices();
        assert_eq!(verts[3].position, Vec3::ZERO);
        assert_eq!(verts[5].position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_normal_only_format() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.format, Some(FaceFormat::VVn));
        let verts = mesh.to_vertices();
        assert_eq!(verts[0].uv, Vec2::ZERO);
        assert_eq!(verts[2].normal, Vec3::Z);
    }

    #[test]
    fn test_normal_only_corner_requires_empty_uv() {
        let corner = parse_corner("2//5", FaceFormat::VVn, 3).unwrap();
        assert_eq!((corner.v, corner.vt, corner.vn), (1, None, Some(4)));

        match parse_corner("2/1/5", FaceFormat::VVn, 3) {
            Err(ObjError::FaceRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(parse("v 1 2\n").unwrap_err().code(), -2);
        assert_eq!(parse("vt x\n").unwrap_err().code(), -3);
        assert_eq!(parse("vn 0 0\n").unwrap_err().code(), -4);
        assert_eq!(parse("v 0 0 0\nf 1/2/3/4 1 1\n").unwrap_err().code(), -5);
        assert_eq!(load("/definitely/not/here.obj").unwrap_err().code(), -1);
    }

    #[test]
    fn test_out_of_range_index_is_face_error() {
        let err = parse("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, ObjError::FaceRecord { .. }));
    }
}
