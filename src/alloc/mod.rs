use core::{alloc::Layout, ptr::NonNull};

use allocator_api2::alloc::{Allocator, Global};
use tracing::error;

use crate::{Error, Result};

mod ffi;
pub mod no_swap;
pub mod secure;
pub mod tracker;
pub mod zero_on_release;

/// Trait representing an allocator that reports every failure.
///
/// Unlike [`Allocator`], both directions are fallible and return the
/// crate [`Error`], so that a policy layer can propagate a failure raised
/// by the layer it wraps (e.g. an OS unpin error surfacing from a
/// deallocation).
///
/// Every policy wrapper of this crate implements this trait as well as
/// [`Allocator`], which is what containers use.
pub trait SecretAllocator {
    /// Allocates a block of memory fitting `layout`.
    ///
    /// # Returns
    /// A pointer to the block if successful, or an [`Error`].
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>>;

    /// Releases the block of memory at `ptr`.
    ///
    /// # Safety
    /// `ptr` must denote a block currently allocated by this allocator
    /// (or one of its clones) and `layout` must be the layout it was
    /// allocated with.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()>;

    /// Allocates room for `count` values of `T`.
    #[inline]
    fn alloc_array<T>(&self, count: usize) -> Result<NonNull<T>> {
        let layout = Layout::array::<T>(count)?;
        self.alloc(layout).map(NonNull::cast)
    }

    /// Releases room for `count` values of `T` obtained from
    /// [`alloc_array`](Self::alloc_array).
    ///
    /// # Safety
    /// Same contract as [`dealloc`](Self::dealloc), with `count` being the
    /// value passed to [`alloc_array`](Self::alloc_array).
    #[inline]
    unsafe fn dealloc_array<T>(&self, ptr: NonNull<T>, count: usize) -> Result<()> {
        let layout = Layout::array::<T>(count)?;
        self.dealloc(ptr.cast(), layout)
    }
}

impl<A: SecretAllocator + ?Sized> SecretAllocator for &A {
    #[inline]
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>> {
        (**self).alloc(layout)
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()> {
        (**self).dealloc(ptr, layout)
    }
}

impl SecretAllocator for Global {
    #[inline]
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>> {
        upstream_alloc(self, layout)
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()> {
        self.deallocate(ptr, layout);
        Ok(())
    }
}

/// Adapts any [`Allocator`] to be used as the upstream of a policy wrapper.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Upstream<A>(pub A);

impl<A: Allocator> SecretAllocator for Upstream<A> {
    #[inline]
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>> {
        upstream_alloc(&self.0, layout)
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()> {
        self.0.deallocate(ptr, layout);
        Ok(())
    }
}

#[inline]
fn upstream_alloc<A: Allocator>(alloc: &A, layout: Layout) -> Result<NonNull<[u8]>> {
    alloc.allocate(layout).map_err(|_| Error::Upstream {
        size: layout.size(),
    })
}

/// Maps the outcome of a fallible allocation onto the [`Allocator`] contract.
#[inline]
fn report_alloc(
    result: Result<NonNull<[u8]>>,
    policy: &str,
) -> core::result::Result<NonNull<[u8]>, allocator_api2::alloc::AllocError> {
    result.map_err(|err| {
        error!(%err, policy, "secret allocation failed");
        allocator_api2::alloc::AllocError
    })
}

/// Maps the outcome of a fallible release onto the [`Allocator`] contract,
/// which cannot report failures.
///
/// # Panics
/// Panics if `result` holds an error.
#[inline]
fn report_dealloc(result: Result<()>, policy: &str) {
    if let Err(err) = result {
        error!(%err, policy, "secret deallocation failed");
        panic!("{policy} deallocation failed: {err}");
    }
}
