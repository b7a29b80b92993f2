use core::{alloc::Layout, fmt, marker::PhantomData, ptr::NonNull};
use std::sync::Arc;

use allocator_api2::alloc::{AllocError, Allocator, Global};

use super::{report_alloc, report_dealloc, tracker::PageTracker, SecretAllocator};
use crate::{
    marker::{Serialized, Unserialized},
    Result,
};

mod sealed {
    pub trait Sealed {}

    impl Sealed for crate::marker::Serialized {}
    impl Sealed for crate::marker::Unserialized {}
}

/// How a [`NoSwapAllocator`] accesses the shared [`PageTracker`].
///
/// Implemented by [`Serialized`] and [`Unserialized`] only.
pub trait Serialization: sealed::Sealed {
    /// Decides whether allocators using this policy are `Send` and `Sync`.
    #[doc(hidden)]
    type ThreadMarker;

    #[doc(hidden)]
    unsafe fn add_allocation(tracker: &PageTracker, ptr: *const u8, len: usize) -> Result<()>;

    #[doc(hidden)]
    unsafe fn remove_allocation(tracker: &PageTracker, ptr: *const u8, len: usize) -> Result<()>;
}

impl Serialization for Serialized {
    type ThreadMarker = ();

    #[inline]
    unsafe fn add_allocation(tracker: &PageTracker, ptr: *const u8, len: usize) -> Result<()> {
        tracker.add_allocation(ptr, len)
    }

    #[inline]
    unsafe fn remove_allocation(tracker: &PageTracker, ptr: *const u8, len: usize) -> Result<()> {
        tracker.remove_allocation(ptr, len)
    }
}

impl Serialization for Unserialized {
    // Raw pointers are neither `Send` nor `Sync`.
    type ThreadMarker = *const ();

    #[inline]
    unsafe fn add_allocation(tracker: &PageTracker, ptr: *const u8, len: usize) -> Result<()> {
        tracker.add_allocation_unserialized(ptr, len)
    }

    #[inline]
    unsafe fn remove_allocation(tracker: &PageTracker, ptr: *const u8, len: usize) -> Result<()> {
        tracker.remove_allocation_unserialized(ptr, len)
    }
}

/// Allocator adapter keeping the memory it hands out from being swapped to
/// disk until it is deallocated.
///
/// Every page touched by an allocation is registered with a [`PageTracker`],
/// which pins it to RAM on first use. On deallocation the pages are
/// unregistered (and unpinned once no other allocation uses them) before the
/// block is returned to the upstream allocator.
///
/// `S` selects whether the tracker is accessed under its lock
/// ([`Serialized`], the default) or without any locking ([`Unserialized`],
/// single-threaded programs only). Unserialized allocators are neither
/// `Send` nor `Sync`, so they cannot leave the thread that created them.
///
/// ```ignore
/// let alloc = NoSwapAllocator::new(Global);
/// let mut password = allocator_api2::vec::Vec::new_in(alloc);
/// password.extend_from_slice(b"hunter2");
/// // pages backing `password` stay in RAM until it is dropped
/// ```
///
/// NOTE Values stored inline (e.g. a zero-sized or not-yet-grown container)
/// never reach the allocator and are not protected.
pub struct NoSwapAllocator<A = Global, S: Serialization = Serialized> {
    upstream: A,
    tracker: Arc<PageTracker>,
    _serialization: PhantomData<(S, S::ThreadMarker)>,
}

/// [`NoSwapAllocator`] safe to share between threads.
pub type SerializedNoSwapAllocator<A = Global> = NoSwapAllocator<A, Serialized>;

/// [`NoSwapAllocator`] accessing the page tracker without locking.
pub type UnserializedNoSwapAllocator<A = Global> = NoSwapAllocator<A, Unserialized>;

impl<A> NoSwapAllocator<A, Serialized> {
    /// Wraps `upstream`, registering allocations with the process-wide tracker.
    pub fn new(upstream: A) -> Self {
        Self::with_tracker(upstream, PageTracker::global())
    }

    /// Wraps `upstream`, registering allocations with `tracker`.
    pub fn with_tracker(upstream: A, tracker: Arc<PageTracker>) -> Self {
        Self {
            upstream,
            tracker,
            _serialization: PhantomData,
        }
    }
}

impl<A> NoSwapAllocator<A, Unserialized> {
    /// Wraps `upstream`, registering allocations with the process-wide tracker
    /// without ever locking it.
    ///
    /// # Safety
    /// While this allocator or any of its clones is alive, the process-wide
    /// tracker must never be accessed from more than one thread at a time,
    /// including through serialized allocators.
    pub unsafe fn new_unserialized(upstream: A) -> Self {
        Self::with_tracker_unserialized(upstream, PageTracker::global())
    }

    /// Wraps `upstream`, registering allocations with `tracker` without ever
    /// locking it.
    ///
    /// # Safety
    /// While this allocator or any of its clones is alive, `tracker` must
    /// never be accessed from more than one thread at a time.
    pub unsafe fn with_tracker_unserialized(upstream: A, tracker: Arc<PageTracker>) -> Self {
        Self {
            upstream,
            tracker,
            _serialization: PhantomData,
        }
    }
}

impl<A, S: Serialization> NoSwapAllocator<A, S> {
    /// The wrapped allocator.
    #[inline]
    pub fn upstream(&self) -> &A {
        &self.upstream
    }

    /// The tracker allocations are registered with.
    #[inline]
    pub fn tracker(&self) -> &Arc<PageTracker> {
        &self.tracker
    }
}

impl<A: SecretAllocator, S: Serialization> SecretAllocator for NoSwapAllocator<A, S> {
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>> {
        let block = self.upstream.alloc(layout)?;
        let ptr = block.cast::<u8>();

        // SAFETY: the serialization contract was accepted on construction.
        unsafe { S::add_allocation(&self.tracker, ptr.as_ptr(), layout.size())? };

        // Only the registered bytes are handed out.
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    // NOTE Pages are unpinned before the block goes back upstream, and the
    // block is leaked if unpinning fails.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()> {
        S::remove_allocation(&self.tracker, ptr.as_ptr(), layout.size())?;
        self.upstream.dealloc(ptr, layout)
    }
}

unsafe impl<A: SecretAllocator, S: Serialization> Allocator for NoSwapAllocator<A, S> {
    #[inline]
    fn allocate(&self, layout: Layout) -> core::result::Result<NonNull<[u8]>, AllocError> {
        report_alloc(SecretAllocator::alloc(self, layout), "no-swap")
    }

    /// # Panics
    /// Panics if the memory was not tracked or could not be unpinned.
    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        report_dealloc(SecretAllocator::dealloc(self, ptr, layout), "no-swap")
    }
}

impl<A: Default> Default for NoSwapAllocator<A, Serialized> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: Clone, S: Serialization> Clone for NoSwapAllocator<A, S> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            tracker: Arc::clone(&self.tracker),
            _serialization: PhantomData,
        }
    }
}

impl<A: PartialEq, S: Serialization> PartialEq for NoSwapAllocator<A, S> {
    fn eq(&self, other: &Self) -> bool {
        self.upstream == other.upstream
    }
}

impl<A: Eq, S: Serialization> Eq for NoSwapAllocator<A, S> {}

impl<A: fmt::Debug, S: Serialization> fmt::Debug for NoSwapAllocator<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoSwapAllocator")
            .field("upstream", &self.upstream)
            .field("tracker", &self.tracker)
            .finish()
    }
}
