//! Resources tracked by the render graph

/// Unique identifier for a render graph resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

/// Whether a resource holds valid contents before the frame starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceInit {
    /// Produced every frame; reading it before a pass writes it is an error
    PerFrame,
    /// Built ahead of time (IBL maps) and only read during the frame
    Persistent,
}

/// A texture owned outside the graph and bound to it by name
#[derive(Debug, Clone)]
pub struct ImportedResource {
    pub id: ResourceId,
    pub name: String,
    pub init: ResourceInit,
}

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// Read as a texture (sampled)
    TextureRead,
    /// Write as a render target
    RenderTarget,
    /// Depth/stencil attachment
    DepthStencilRead,
    DepthStencilWrite,
    /// Transfer source/destination
    CopySrc,
    CopyDst,
}

/// Resource access declaration for a pass
#[derive(Debug, Clone)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub usage: ResourceUsage,
}

impl ResourceAccess {
    pub fn is_read(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::TextureRead | ResourceUsage::DepthStencilRead | ResourceUsage::CopySrc
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::RenderTarget | ResourceUsage::DepthStencilWrite | ResourceUsage::CopyDst
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_direction() {
        let read = ResourceAccess {
            resource: ResourceId(0),
            usage: ResourceUsage::CopySrc,
        };
        let write = ResourceAccess {
            resource: ResourceId(0),
            usage: ResourceUsage::DepthStencilWrite,
        };
        assert!(read.is_read() && !read.is_write());
        assert!(write.is_write() && !write.is_read());
    }
}
