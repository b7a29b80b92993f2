use core::alloc::LayoutError;
use std::io;

use thiserror::Error;

/// Result type returned by the fallible allocator operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while allocating or releasing secret memory.
#[derive(Debug, Error)]
pub enum Error {
    /// The OS refused to pin a page to RAM.
    ///
    /// The upstream allocation that triggered the pin has already succeeded
    /// and is not rolled back.
    #[error("pinning memory page {page:#x}")]
    Pin {
        /// Base address of the page.
        page: usize,
        #[source]
        source: io::Error,
    },

    /// The OS refused to unpin a page.
    ///
    /// The upstream deallocation is skipped when this happens, so the
    /// underlying block is leaked.
    #[error("unpinning memory page {page:#x}")]
    Unpin {
        /// Base address of the page.
        page: usize,
        #[source]
        source: io::Error,
    },

    /// A page being released has no tracking entry: either a double free
    /// or a pointer that was never handed out by a no-swap allocator.
    #[error("releasing memory page {page:#x} not tracked by the page tracker")]
    Untracked {
        /// Base address of the page.
        page: usize,
    },

    /// The upstream allocator could not satisfy the request.
    #[error("upstream allocator failed to allocate {size} bytes")]
    Upstream {
        /// Requested size in bytes.
        size: usize,
    },

    /// The requested element count does not fit in a `Layout`.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl Error {
    /// Returns the OS error code carried by a pin or unpin failure.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Pin { source, .. } | Self::Unpin { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
