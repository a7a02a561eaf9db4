use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a render. None of these are recoverable; `main`
/// reports the error and exits.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad platform or device index, a failed device request, or a
    /// work-group shape or grid the device can't dispatch.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The device rejected the kernel.
    #[error("kernel compilation failed: {0}")]
    Compile(#[source] wgpu::Error),
    /// A device buffer couldn't be created.
    #[error("allocation failed: {0}")]
    Allocation(String),
    /// The output buffer couldn't be mapped for reading.
    #[error("failed to map output buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    /// The image file couldn't be created or written.
    #[error("couldn't write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
