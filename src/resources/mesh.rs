//! Mesh data structures and generation

use crate::backend::traits::{BackendResult, BufferHandle, GraphicsBackend, IndexFormat};
use crate::backend::types::{BufferDescriptor, BufferUsage, Vertex};
use crate::resources::obj::ObjMesh;
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    /// Adopt a de-indexed OBJ stream, one index per corner.
    pub fn from_obj(name: &str, obj: &ObjMesh) -> Self {
        let vertices = obj.to_vertices();
        let indices = (0..vertices.len() as u32).collect();
        Self {
            vertices,
            indices,
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Unit cube centered at origin (half extent 1), 36 indices.
    ///
    /// Used for cubemap capture and the skybox, so faces wind inward as
    /// well as outward depending on the cull mode of the pipeline drawing it.
    pub fn cube() -> Self {
        let mut mesh = Mesh::new("cube");

        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
        ];

        for (normal, right, up) in faces {
            let base = mesh.vertices.len() as u32;
            let corners = [
                (-1.0, -1.0, Vec2::new(0.0, 1.0)),
                (1.0, -1.0, Vec2::new(1.0, 1.0)),
                (1.0, 1.0, Vec2::new(1.0, 0.0)),
                (-1.0, 1.0, Vec2::new(0.0, 0.0)),
            ];
            for (x, y, uv) in corners {
                mesh.vertices
                    .push(Vertex::new(normal + right * x + up * y, uv, normal));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// UV sphere of radius 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("sphere");

        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let phi = v * PI;

            for segment in 0..=segments {
                let u = segment as f32 / segments as f32;
                let theta = u * 2.0 * PI;

                // y up, counter-clockwise seen from outside
                let normal = Vec3::new(
                    theta.cos() * phi.sin(),
                    phi.cos(),
                    -theta.sin() * phi.sin(),
                );
                mesh.vertices.push(Vertex::new(normal, Vec2::new(u, v), normal));
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Square ground plane facing +Y at height `y`, `half_extent` to each
    /// side. UVs repeat `uv_scale` times across the plane.
    pub fn plane(half_extent: f32, y: f32, uv_scale: f32) -> Self {
        let mut mesh = Mesh::new("plane");
        let e = half_extent;

        let corners = [
            (Vec3::new(-e, y, e), Vec2::new(0.0, 0.0)),
            (Vec3::new(e, y, e), Vec2::new(uv_scale, 0.0)),
            (Vec3::new(e, y, -e), Vec2::new(uv_scale, uv_scale)),
            (Vec3::new(-e, y, -e), Vec2::new(0.0, uv_scale)),
        ];
        for (position, uv) in corners {
            mesh.vertices.push(Vertex::new(position, uv, Vec3::Y));
        }
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);

        mesh
    }
}

/// Mesh resident in GPU buffers.
#[derive(Debug, Clone)]
pub struct GpuMesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub name: String,
}

impl GpuMesh {
    pub fn upload<B: GraphicsBackend + ?Sized>(backend: &mut B, mesh: &Mesh) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", mesh.name)),
                size: mesh.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX,
                mapped_at_creation: false,
            },
            mesh.vertex_bytes(),
        )?;

        let index_buffer = match backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", mesh.name)),
                size: mesh.index_bytes().len() as u64,
                usage: BufferUsage::INDEX,
                mapped_at_creation: false,
            },
            mesh.index_bytes(),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.destroy_buffer(vertex_buffer);
                return Err(e);
            }
        };

        log::debug!(
            "Uploaded mesh '{}': {} vertices, {} triangles",
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count() as u32,
            name: mesh.name.clone(),
        })
    }

    /// Bind both buffers and issue one indexed draw.
    pub fn draw<B: GraphicsBackend + ?Sized>(&self, backend: &mut B) {
        backend.set_vertex_buffer(0, self.vertex_buffer, 0);
        backend.set_index_buffer(self.index_buffer, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..self.index_count, 0, 0..1);
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::obj;

    #[test]
    fn test_cube_has_36_indices() {
        let cube = Mesh::cube();
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.vertex_count(), 24);
        assert!(cube.vertices.iter().all(|v| v.position.abs().max_element() == 1.0));
    }

    #[test]
    fn test_sphere_is_unit_radius() {
        let sphere = Mesh::sphere(64, 64);
        assert_eq!(sphere.vertex_count(), 65 * 65);
        assert_eq!(sphere.triangle_count(), 64 * 64 * 2);
        for v in &sphere.vertices {
            assert!((v.position.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sphere_winds_outward() {
        let sphere = Mesh::sphere(16, 16);
        // a triangle away from the poles
        let tri = &sphere.indices[(8 * 16 + 3) * 6..][..3];
        let [a, b, c] = [0, 1, 2].map(|i| sphere.vertices[tri[i] as usize].position);
        let face_normal = (b - a).cross(c - a);
        assert!(face_normal.dot(a) > 0.0);
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = Mesh::plane(10.0, -0.5, 10.0);
        let [a, b, c] = [0, 1, 2].map(|i| plane.vertices[plane.indices[i] as usize].position);
        assert!((b - a).cross(c - a).y > 0.0);
        assert!(plane.vertices.iter().all(|v| v.position.y == -0.5));
        assert_eq!(plane.vertices[2].uv, Vec2::splat(10.0));
    }

    #[test]
    fn test_from_obj_indexes_every_corner() {
        let parsed = obj::parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = Mesh::from_obj("tri", &parsed);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }
}
