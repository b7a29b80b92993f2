//! Allocators combining the no-swap and zero-on-release policies.
//!
//! The zero-on-release layer wraps the no-swap layer, never the reverse:
//! on release the block is wiped while its pages are still pinned, and only
//! then unregistered from the page tracker. Secret bytes are therefore never
//! left in memory that is eligible for swap.

use std::sync::Arc;

use allocator_api2::alloc::Global;

use super::{
    no_swap::{NoSwapAllocator, SerializedNoSwapAllocator, UnserializedNoSwapAllocator},
    tracker::PageTracker,
    zero_on_release::ZeroOnReleaseAllocator,
};

/// Secure allocator safe to share between threads.
pub type SerializedSecureAllocator<A = Global> = ZeroOnReleaseAllocator<SerializedNoSwapAllocator<A>>;

/// Secure allocator accessing the page tracker without locking, for
/// single-threaded programs. Neither `Send` nor `Sync`.
pub type UnserializedSecureAllocator<A = Global> = ZeroOnReleaseAllocator<UnserializedNoSwapAllocator<A>>;

impl<A> SerializedSecureAllocator<A> {
    /// Wraps `upstream`, pinning pages through the process-wide tracker.
    pub fn serialized(upstream: A) -> Self {
        ZeroOnReleaseAllocator::new(NoSwapAllocator::new(upstream))
    }

    /// Wraps `upstream`, pinning pages through `tracker`.
    pub fn serialized_with_tracker(upstream: A, tracker: Arc<PageTracker>) -> Self {
        ZeroOnReleaseAllocator::new(NoSwapAllocator::with_tracker(upstream, tracker))
    }
}

impl<A> UnserializedSecureAllocator<A> {
    /// Wraps `upstream`, pinning pages through the process-wide tracker
    /// without locking it.
    ///
    /// # Safety
    /// See [`NoSwapAllocator::new_unserialized`].
    pub unsafe fn unserialized(upstream: A) -> Self {
        ZeroOnReleaseAllocator::new(NoSwapAllocator::new_unserialized(upstream))
    }

    /// Wraps `upstream`, pinning pages through `tracker` without locking it.
    ///
    /// # Safety
    /// See [`NoSwapAllocator::with_tracker_unserialized`].
    pub unsafe fn unserialized_with_tracker(upstream: A, tracker: Arc<PageTracker>) -> Self {
        ZeroOnReleaseAllocator::new(NoSwapAllocator::with_tracker_unserialized(upstream, tracker))
    }
}
