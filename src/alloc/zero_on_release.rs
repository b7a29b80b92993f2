use core::{alloc::Layout, mem::MaybeUninit, ptr::NonNull};

use allocator_api2::alloc::{AllocError, Allocator, Global};
use zeroize::Zeroize;

use super::{report_alloc, report_dealloc, SecretAllocator};
use crate::Result;

/// Allocator adapter wiping the memory it hands out before releasing it to
/// the upstream allocator.
///
/// Allocation is a pure passthrough. On deallocation every byte of the block
/// is overwritten with zeros and only then forwarded upstream.
///
/// NOTE Values stored inline by a container (e.g. small-buffer optimizations)
/// never reach the allocator and are not wiped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ZeroOnReleaseAllocator<A = Global> {
    upstream: A,
}

impl<A> ZeroOnReleaseAllocator<A> {
    pub const fn new(upstream: A) -> Self {
        Self { upstream }
    }

    /// The wrapped allocator.
    #[inline]
    pub fn upstream(&self) -> &A {
        &self.upstream
    }
}

impl<A: SecretAllocator> SecretAllocator for ZeroOnReleaseAllocator<A> {
    #[inline]
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>> {
        self.upstream.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()> {
        Zeroize::zeroize({
            let bytes_slice = core::ptr::slice_from_raw_parts_mut(
                ptr.as_ptr().cast::<MaybeUninit<u8>>(),
                layout.size(),
            );
            &mut *bytes_slice
        });

        self.upstream.dealloc(ptr, layout)
    }
}

unsafe impl<A: SecretAllocator> Allocator for ZeroOnReleaseAllocator<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> core::result::Result<NonNull<[u8]>, AllocError> {
        report_alloc(SecretAllocator::alloc(self, layout), "zero-on-release")
    }

    /// # Panics
    /// Panics if the upstream allocator fails to release the block.
    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        report_dealloc(SecretAllocator::dealloc(self, ptr, layout), "zero-on-release")
    }
}
