use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Global grid dimensions; one kernel invocation per pixel.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( {}, {} )", self.width, self.height)
    }
}

/// Local work-group shape for `julia.wgsl#julia`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Shape used when the caller doesn't ask for one. 64 invocations, within
    /// the default limits of every `wgpu` backend.
    pub const IMPLICIT: Self = WorkgroupSize { x: 8, y: 8 };

    /// `Some` only when both dimensions are positive.
    pub fn from_hint(x: u32, y: u32) -> Option<Self> {
        if x > 0 && y > 0 {
            Some(WorkgroupSize { x, y })
        } else {
            None
        }
    }

    pub fn invocations(&self) -> u32 {
        self.x.saturating_mul(self.y)
    }

    /**
    Number of work-groups to dispatch in each dimension so that every pixel of
    `size` gets an invocation.

    Unlike an OpenCL NDRange, a `wgpu` dispatch counts work-groups rather than
    invocations, and the grid doesn't have to be a multiple of the work-group
    shape. We round up, and the kernel discards invocations outside the grid.
    */
    pub fn dispatch_size(&self, size: Size) -> (u32, u32, u32) {
        (
            size.width.div_ceil(self.x),
            size.height.div_ceil(self.y),
            1,
        )
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( {}, {} )", self.x, self.y)
    }
}
