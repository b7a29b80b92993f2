//! Test doubles standing in for the operating system and the upstream heap.

use core::{alloc::Layout, cell::RefCell, ptr::NonNull};
use std::{
    alloc, io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock, Weak,
    },
};

use parking_lot::Mutex;

use crate::{
    alloc::{tracker::PageLocker, SecretAllocator},
    Error, PageTracker, Result,
};

/// Page size reported by the test lockers.
pub const PAGE: usize = 4096;

const ARENA_PAGES: usize = 8;

/// Upstream allocator handing out blocks of a page-aligned buffer.
///
/// Blocks are carved at a caller-chosen offset (or right after the previous
/// block) and never reused, so their bytes can be inspected after release.
pub struct Arena {
    base: NonNull<u8>,
    state: RefCell<ArenaState>,
}

#[derive(Default)]
struct ArenaState {
    next: usize,
    fail_next: bool,
    allocations: usize,
    deallocations: Vec<(usize, usize)>,
}

impl Arena {
    pub fn new() -> Self {
        let base = unsafe { alloc::alloc_zeroed(Self::layout()) };
        Self {
            base: NonNull::new(base).expect("Failed to allocate arena"),
            state: RefCell::default(),
        }
    }

    fn layout() -> Layout {
        Layout::from_size_align(ARENA_PAGES * PAGE, PAGE).unwrap()
    }

    pub fn set_next_offset(&self, offset: usize) {
        self.state.borrow_mut().next = offset;
    }

    pub fn fail_next_allocation(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    /// Pointer to the byte at `offset`.
    pub fn at(&self, offset: usize) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Address of the `index`-th page.
    pub fn page(&self, index: usize) -> usize {
        self.base.as_ptr() as usize + index * PAGE
    }

    /// Bytes of the arena in `[offset, offset + len)`.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= ARENA_PAGES * PAGE);
        unsafe { core::slice::from_raw_parts(self.at(offset).as_ptr(), len) }
    }

    /// Offset of `ptr` within the arena.
    pub fn offset_of(&self, ptr: *const u8) -> usize {
        ptr as usize - self.base.as_ptr() as usize
    }

    pub fn allocations(&self) -> usize {
        self.state.borrow().allocations
    }

    /// `(offset, size)` of every released block, in release order.
    pub fn deallocations(&self) -> Vec<(usize, usize)> {
        self.state.borrow().deallocations.clone()
    }
}

impl SecretAllocator for Arena {
    fn alloc(&self, layout: Layout) -> Result<NonNull<[u8]>> {
        let mut state = self.state.borrow_mut();
        if core::mem::take(&mut state.fail_next) {
            return Err(Error::Upstream {
                size: layout.size(),
            });
        }

        let offset = (state.next + layout.align() - 1) / layout.align() * layout.align();
        if offset + layout.size() > ARENA_PAGES * PAGE {
            return Err(Error::Upstream {
                size: layout.size(),
            });
        }

        state.next = offset + layout.size();
        state.allocations += 1;
        Ok(NonNull::slice_from_raw_parts(self.at(offset), layout.size()))
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) -> Result<()> {
        let offset = self.offset_of(ptr.as_ptr());
        self.state
            .borrow_mut()
            .deallocations
            .push((offset, layout.size()));
        Ok(())
    }
}

impl PartialEq for Arena {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.base.as_ptr(), Self::layout()) };
    }
}

/// OS call observed by a [`RecordingLocker`], keyed by page address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Lock(usize),
    Unlock(usize),
}

/// [`PageLocker`] recording every call, with one-shot failure injection.
#[derive(Clone, Default)]
pub struct RecordingLocker {
    state: Arc<Mutex<RecordingState>>,
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<Call>,
    fail_lock: Option<io::Error>,
    fail_unlock: Option<io::Error>,
}

impl RecordingLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the calls recorded so far.
    pub fn take(&self) -> Vec<Call> {
        core::mem::take(&mut self.state.lock().calls)
    }

    pub fn fail_next_lock(&self, err: io::Error) {
        self.state.lock().fail_lock = Some(err);
    }

    pub fn fail_next_unlock(&self, err: io::Error) {
        self.state.lock().fail_unlock = Some(err);
    }
}

impl PageLocker for RecordingLocker {
    fn page_size(&self) -> usize {
        PAGE
    }

    fn lock(&self, page: *const u8, len: usize) -> io::Result<()> {
        assert_eq!(len, PAGE);
        let mut state = self.state.lock();
        match state.fail_lock.take() {
            Some(err) => Err(err),
            None => {
                state.calls.push(Call::Lock(page as usize));
                Ok(())
            }
        }
    }

    fn unlock(&self, page: *const u8, len: usize) -> io::Result<()> {
        assert_eq!(len, PAGE);
        let mut state = self.state.lock();
        match state.fail_unlock.take() {
            Some(err) => Err(err),
            None => {
                state.calls.push(Call::Unlock(page as usize));
                Ok(())
            }
        }
    }
}

/// [`PageLocker`] counting how often the tracker lock is held while the OS
/// is asked to pin or unpin a page.
#[derive(Clone, Default)]
pub struct WatchingLocker {
    tracker: Arc<OnceLock<Weak<PageTracker>>>,
    pub calls: Arc<AtomicUsize>,
    pub held_on_lock: Arc<AtomicUsize>,
    pub held_on_unlock: Arc<AtomicUsize>,
}

impl WatchingLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, tracker: &Arc<PageTracker>) {
        let _ = self.tracker.set(Arc::downgrade(tracker));
    }

    fn observe(&self, counter: &AtomicUsize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let held = self
            .tracker
            .get()
            .and_then(Weak::upgrade)
            .map_or(false, |tracker| tracker.is_lock_held());
        if held {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl PageLocker for WatchingLocker {
    fn page_size(&self) -> usize {
        PAGE
    }

    fn lock(&self, _page: *const u8, _len: usize) -> io::Result<()> {
        self.observe(&self.held_on_lock);
        Ok(())
    }

    fn unlock(&self, _page: *const u8, _len: usize) -> io::Result<()> {
        self.observe(&self.held_on_unlock);
        Ok(())
    }
}
