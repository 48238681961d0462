//! Render Graph System
//!
//! Frame stages are described as passes that declare the resources they read
//! and write. Compilation derives the execution order from those declarations
//! and rejects reads of per-frame resources that no earlier pass produced.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;

use thiserror::Error;

/// Render graph error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderGraphError {
    #[error("Pass '{pass}' references unknown resource '{resource}'")]
    UnknownResource { pass: String, resource: String },
    #[error("Pass '{pass}' reads '{resource}' before any pass writes it")]
    ReadBeforeWrite { pass: String, resource: String },
    #[error("Pass '{pass}' has no view bound for resource {resource}")]
    MissingBinding { pass: String, resource: u32 },
}
