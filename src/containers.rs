//! Containers backed by the secure allocators.
//!
//! ```ignore
//! use secret_alloc::containers::serialized_secure;
//!
//! let mut key = serialized_secure::Vec::new_in(Default::default());
//! key.extend_from_slice(&read_key());
//! // pinned to RAM while alive, wiped on drop
//! ```

/// Containers usable from any thread.
pub mod serialized_secure {
    use allocator_api2::alloc::Global;
    use hashbrown::hash_map::DefaultHashBuilder;

    use crate::SerializedSecureAllocator;

    /// `Vec` whose storage is pinned to RAM and wiped on release.
    pub type Vec<T, A = Global> = allocator_api2::vec::Vec<T, SerializedSecureAllocator<A>>;

    /// `Box` whose storage is pinned to RAM and wiped on release.
    pub type Box<T, A = Global> = allocator_api2::boxed::Box<T, SerializedSecureAllocator<A>>;

    /// Byte string whose storage is pinned to RAM and wiped on release.
    pub type String<A = Global> = Vec<u8, A>;

    /// `HashMap` whose table is pinned to RAM and wiped on release.
    pub type HashMap<K, V, A = Global, S = DefaultHashBuilder> =
        hashbrown::HashMap<K, V, S, SerializedSecureAllocator<A>>;

    /// `HashSet` whose table is pinned to RAM and wiped on release.
    pub type HashSet<T, A = Global, S = DefaultHashBuilder> =
        hashbrown::HashSet<T, S, SerializedSecureAllocator<A>>;
}

/// Containers for single-threaded programs.
///
/// Their allocator has to be built with the `unsafe`
/// [`UnserializedSecureAllocator::unserialized`](crate::UnserializedSecureAllocator::unserialized).
pub mod unserialized_secure {
    use allocator_api2::alloc::Global;
    use hashbrown::hash_map::DefaultHashBuilder;

    use crate::UnserializedSecureAllocator;

    /// `Vec` whose storage is pinned to RAM and wiped on release.
    pub type Vec<T, A = Global> = allocator_api2::vec::Vec<T, UnserializedSecureAllocator<A>>;

    /// `Box` whose storage is pinned to RAM and wiped on release.
    pub type Box<T, A = Global> = allocator_api2::boxed::Box<T, UnserializedSecureAllocator<A>>;

    /// Byte string whose storage is pinned to RAM and wiped on release.
    pub type String<A = Global> = Vec<u8, A>;

    /// `HashMap` whose table is pinned to RAM and wiped on release.
    pub type HashMap<K, V, A = Global, S = DefaultHashBuilder> =
        hashbrown::HashMap<K, V, S, UnserializedSecureAllocator<A>>;

    /// `HashSet` whose table is pinned to RAM and wiped on release.
    pub type HashSet<T, A = Global, S = DefaultHashBuilder> =
        hashbrown::HashSet<T, S, UnserializedSecureAllocator<A>>;
}
