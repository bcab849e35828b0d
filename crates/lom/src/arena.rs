//! Arena Module - Allocation Services
//!
//! The object model sits between two memory regimes:
//!
//! - **Managed pools** ([`Pool`]): explicitly scoped scratch regions owned by
//!   one execution context, released in bulk. The host side of the binding
//!   allocates wrapper-local data here.
//! - **Unmanaged memory** ([`ArenaService`]): independently allocated blocks
//!   that outlive any single context. Promoted roots live here and are freed
//!   exactly once, when their refcount reaches zero.
//!
//! The unmanaged side is a trait so tests can substitute an
//! allocation-tracking double ([`CountingArena`]) and verify that every
//! promoted root is freed exactly once.

use crate::error::{LomError, Result};
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Allocation capability for unmanaged memory
///
/// Promoted roots are allocated through this trait, outside every managed
/// pool. Implementations must be thread-safe: allocation happens on the
/// promoting thread, deallocation on whichever thread drops the last
/// reference.
pub trait ArenaService: Send + Sync {
    /// Allocate a block for `layout`
    ///
    /// # Returns
    /// - `Ok(ptr)` - Uninitialized block of `layout.size()` bytes
    /// - `Err(LomError::OutOfMemory)` - Allocation failed; recoverable
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>>;

    /// Release a block previously returned by [`allocate`](Self::allocate)
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on the same service with the same
    /// `layout`, and must not be released twice.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Production arena backed by the global allocator
#[derive(Debug, Default)]
pub struct SystemArena;

impl SystemArena {
    pub fn new() -> Self {
        SystemArena
    }
}

impl ArenaService for SystemArena {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            return Err(LomError::InvalidArgument(
                "zero-sized unmanaged allocation".to_string(),
            ));
        }

        // SAFETY: layout has non-zero size, checked above.
        let raw = unsafe { alloc::alloc(layout) };

        NonNull::new(raw).ok_or(LomError::OutOfMemory {
            requested: layout.size(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

/// Allocation-tracking arena for tests
///
/// Wraps [`SystemArena`] and counts every allocate and deallocate, so tests
/// can assert that shared roots are freed exactly once and nothing leaks.
#[derive(Debug, Default)]
pub struct CountingArena {
    inner: SystemArena,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
}

impl CountingArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total allocations performed
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    /// Total deallocations performed
    pub fn deallocations(&self) -> usize {
        self.deallocations.load(Ordering::SeqCst)
    }

    /// Blocks currently outstanding
    pub fn live(&self) -> usize {
        self.allocations() - self.deallocations()
    }
}

impl ArenaService for CountingArena {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        let ptr = self.inner.allocate(layout)?;
        self.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.fetch_add(1, Ordering::SeqCst);
        unsafe { self.inner.deallocate(ptr, layout) };
    }
}

/// Managed scratch pool
///
/// A bump-allocated region with deterministic bulk release. Wrappers use a
/// pool for per-call scratch data; clearing or dropping the pool reclaims
/// everything allocated from it at once. Individual allocations are never
/// freed one by one.
///
/// Pools are single-context by design and are not `Sync`; sharing data
/// across contexts goes through promotion and the tuple codec instead.
///
/// # Examples
///
/// ```rust
/// use lom::arena::Pool;
///
/// let mut pool = Pool::new();
/// {
///     let greeting = pool.alloc_str("hello");
///     assert_eq!(greeting, "hello");
/// }
/// pool.clear();
/// ```
#[derive(Default)]
pub struct Pool {
    bump: bumpalo::Bump,
}

impl Pool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            bump: bumpalo::Bump::new(),
        }
    }

    /// Create a pool with pre-reserved capacity in bytes
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: bumpalo::Bump::with_capacity(bytes),
        }
    }

    /// Allocate a value in the pool
    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    /// Allocate a string slice in the pool
    pub fn alloc_str(&self, value: &str) -> &mut str {
        self.bump.alloc_str(value)
    }

    /// Allocate a byte slice in the pool
    pub fn alloc_bytes(&self, value: &[u8]) -> &mut [u8] {
        self.bump.alloc_slice_copy(value)
    }

    /// Bytes currently allocated from this pool
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Release every allocation at once, keeping the pool usable
    pub fn clear(&mut self) {
        self.bump.reset();
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}
