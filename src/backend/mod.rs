//! Backend abstraction layer
//!
//! [`GraphicsBackend`] is the explicit render context every component records
//! through. [`WgpuBackend`] drives a real GPU; [`DummyBackend`] records
//! commands for tests.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use dummy::{DummyBackend, RecordedCommand};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
