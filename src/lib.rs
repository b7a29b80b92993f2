//! Allocator adapters protecting sensitive in-memory data (passwords,
//! private keys) from being swapped to disk and from lingering in freed
//! memory.
//!
//! - [`NoSwapAllocator`] pins the pages of its allocations to RAM through a
//!   process-wide, reference-counted [`PageTracker`].
//! - [`ZeroOnReleaseAllocator`] wipes every block before releasing it.
//! - [`SerializedSecureAllocator`] and [`UnserializedSecureAllocator`] stack
//!   both, wiping memory before its pages can become swappable again.
//!
//! All of them wrap an upstream allocator ([`Global`](allocator_api2::alloc::Global)
//! by default) and implement [`allocator_api2::alloc::Allocator`], so they can
//! back the containers of [`containers`].

mod alloc;
pub mod containers;
mod error;
#[cfg(test)]
mod testing;

pub mod marker {
    /// Marker type selecting allocators that lock the shared page tracker
    /// around every update, making them safe to use from many threads.
    pub enum Serialized {}

    /// Marker type selecting allocators that update the shared page tracker
    /// without locking, for single-threaded programs only.
    pub enum Unserialized {}
}

pub use self::alloc::{
    no_swap::{NoSwapAllocator, Serialization, SerializedNoSwapAllocator, UnserializedNoSwapAllocator},
    secure::{SerializedSecureAllocator, UnserializedSecureAllocator},
    tracker::{OsPageLocker, PageLocker, PageTracker},
    zero_on_release::ZeroOnReleaseAllocator,
    SecretAllocator, Upstream,
};
pub use error::{Error, Result};
