//! Resource management
//!
//! Loading of meshes, textures and material texture sets.

mod material;
mod mesh;
pub mod obj;
pub mod texture;

pub use material::*;
pub use mesh::*;
pub use obj::{FaceFormat, ObjError, ObjMesh};
pub use texture::*;
