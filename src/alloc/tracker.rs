use std::{
    collections::{hash_map::Entry, HashMap},
    fmt, io,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::ffi;
use crate::{Error, Result};

/// Platform layer used by [`PageTracker`] to pin pages to RAM.
///
/// [`OsPageLocker`] is the implementation backed by the operating system.
#[cfg_attr(test, mockall::automock)]
pub trait PageLocker: Send + Sync {
    /// Size in bytes of one page of virtual memory.
    fn page_size(&self) -> usize;

    /// Pins `len` bytes starting at `page` so they are never swapped out.
    fn lock(&self, page: *const u8, len: usize) -> io::Result<()>;

    /// Makes `len` bytes starting at `page` eligible for swap again.
    fn unlock(&self, page: *const u8, len: usize) -> io::Result<()>;
}

/// [`PageLocker`] implementation relying on `mlock`/`munlock` on Unix-based
/// systems and on `VirtualLock`/`VirtualUnlock` on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsPageLocker;

impl PageLocker for OsPageLocker {
    #[inline]
    fn page_size(&self) -> usize {
        ffi::page_size()
    }

    #[inline]
    fn lock(&self, page: *const u8, len: usize) -> io::Result<()> {
        ffi::pin(page, len)
    }

    #[inline]
    fn unlock(&self, page: *const u8, len: usize) -> io::Result<()> {
        ffi::unpin(page, len)
    }
}

/// Reference counts of the memory pages handed out by no-swap allocators.
///
/// A page is pinned to RAM when the first allocation touching it is
/// registered and unpinned when the last one is released, so that many small
/// allocations sharing a page cost a single pin/unpin pair.
///
/// One tracker is shared by every allocator of the process through
/// [`PageTracker::global`]. Independent trackers can be built over any
/// [`PageLocker`] with [`PageTracker::with_locker`].
pub struct PageTracker {
    pages: Mutex<HashMap<usize, usize>>,
    page_size: usize,
    locker: Box<dyn PageLocker>,
}

impl PageTracker {
    /// Returns the process-wide tracker, creating it on first use.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<PageTracker>> = OnceLock::new();

        GLOBAL
            .get_or_init(|| {
                let tracker = Self::with_locker(OsPageLocker);
                debug!(page_size = tracker.page_size, "created process-wide page tracker");
                tracker
            })
            .clone()
    }

    /// Creates a standalone tracker over `locker`.
    ///
    /// # Panics
    /// Panics if the page size reported by `locker` is zero.
    pub fn with_locker<L: PageLocker + 'static>(locker: L) -> Arc<Self> {
        let page_size = locker.page_size();
        assert!(page_size > 0, "page size must be non-zero");

        Arc::new(Self {
            pages: Mutex::new(HashMap::new()),
            page_size,
            locker: Box::new(locker),
        })
    }

    /// Size in bytes of the pages tracked.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently pinned by this tracker.
    pub fn tracked_pages(&self) -> usize {
        self.pages.lock().len()
    }

    /// Number of live allocations touching the page containing `addr`.
    pub fn ref_count(&self, addr: usize) -> Option<usize> {
        let page = addr - addr % self.page_size;
        self.pages.lock().get(&page).copied()
    }

    /// Records a new allocation of `len` bytes at `ptr`, pinning every page it
    /// touches that was not pinned yet.
    ///
    /// If pinning fails, the pages pinned earlier in the same call remain
    /// registered.
    pub fn add_allocation(&self, ptr: *const u8, len: usize) -> Result<()> {
        let mut pages = self.pages.lock();
        self.register(&mut pages, ptr, len)
    }

    /// Releases an allocation of `len` bytes at `ptr`, unpinning every page
    /// that no longer backs a live allocation.
    pub fn remove_allocation(&self, ptr: *const u8, len: usize) -> Result<()> {
        let mut pages = self.pages.lock();
        self.unregister(&mut pages, ptr, len)
    }

    /// Same as [`add_allocation`](Self::add_allocation), without taking the
    /// tracker lock.
    ///
    /// # Safety
    /// No other thread may access this tracker for the duration of the call.
    pub unsafe fn add_allocation_unserialized(&self, ptr: *const u8, len: usize) -> Result<()> {
        let pages = &mut *self.pages.data_ptr();
        self.register(pages, ptr, len)
    }

    /// Same as [`remove_allocation`](Self::remove_allocation), without taking
    /// the tracker lock.
    ///
    /// # Safety
    /// No other thread may access this tracker for the duration of the call.
    pub unsafe fn remove_allocation_unserialized(&self, ptr: *const u8, len: usize) -> Result<()> {
        let pages = &mut *self.pages.data_ptr();
        self.unregister(pages, ptr, len)
    }

    #[cfg(test)]
    pub(crate) fn is_lock_held(&self) -> bool {
        self.pages.is_locked()
    }

    fn register(&self, pages: &mut HashMap<usize, usize>, ptr: *const u8, len: usize) -> Result<()> {
        for page in self.pages_of(ptr, len) {
            match pages.entry(page as usize) {
                Entry::Occupied(mut entry) => *entry.get_mut() += 1,
                Entry::Vacant(entry) => {
                    self.locker
                        .lock(page, self.page_size)
                        .map_err(|source| Error::Pin {
                            page: page as usize,
                            source,
                        })?;

                    trace!(page = ?page, "pinned page");
                    entry.insert(1);
                }
            }
        }

        Ok(())
    }

    fn unregister(&self, pages: &mut HashMap<usize, usize>, ptr: *const u8, len: usize) -> Result<()> {
        for page in self.pages_of(ptr, len) {
            let mut entry = match pages.entry(page as usize) {
                Entry::Occupied(entry) => entry,
                Entry::Vacant(_) => return Err(Error::Untracked { page: page as usize }),
            };

            if *entry.get() > 1 {
                *entry.get_mut() -= 1;
                continue;
            }

            self.locker
                .unlock(page, self.page_size)
                .map_err(|source| Error::Unpin {
                    page: page as usize,
                    source,
                })?;

            trace!(page = ?page, "unpinned page");
            entry.remove();
        }

        Ok(())
    }

    /// Base addresses of the pages overlapping `[ptr, ptr + len)`.
    fn pages_of(&self, ptr: *const u8, len: usize) -> impl Iterator<Item = *const u8> {
        let page_size = self.page_size;
        let offset = self.page_offset(ptr);
        let first = ptr.wrapping_sub(offset);

        let count = match len {
            0 => 0,
            len => (offset + len - 1) / page_size + 1,
        };

        (0..count).map(move |i| first.wrapping_add(i * page_size))
    }

    /// Distance between `ptr` and the start of its page. Rounds down, never up.
    #[inline]
    fn page_offset(&self, ptr: *const u8) -> usize {
        ptr as usize % self.page_size
    }
}

impl fmt::Debug for PageTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PageTracker");
        debug.field("page_size", &self.page_size);
        match self.pages.try_lock() {
            Some(pages) => debug.field("tracked_pages", &pages.len()),
            None => debug.field("tracked_pages", &"<locked>"),
        };
        debug.finish_non_exhaustive()
    }
}
