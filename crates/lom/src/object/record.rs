//! Object Records - Managed Stubs and Unmanaged Roots
//!
//! Record Layout:
//! ```text
//! ┌───────────────────────────────┐        ┌──────────────────────────────┐
//! │ ObjectRecord (managed side)   │        │ SharedRoot (unmanaged side)  │
//! │  kind: Kind                   │        │  kind: Kind                  │
//! │  link: Link                   │        │  refcount: AtomicUsize       │
//! │   ├─ Local(LocalRoot)         │        │  resource: dyn resource      │
//! │   │   refcount, resource      │        │  arena: backing allocator    │
//! │   └─ Forward(SharedPtr) ──────┼──────► └──────────────────────────────┘
//! └───────────────────────────────┘
//! ```
//!
//! Exactly one record in any alias chain is authoritative. Before promotion
//! that is the record itself (`Link::Local`); after promotion it is the
//! `SharedRoot` and every record pointing at it is a pure forwarding stub.
//! The enum makes the invariant structural: a stub has no resource field to
//! read, and a chain is never longer than one hop.
//!
//! Refcounts are meaningful only on roots and are mutated exclusively with
//! atomic operations. An unmanaged root is deallocated exactly once, by the
//! thread that drops the final reference; managed records are reclaimed by
//! their owning context and never freed here.

use crate::arena::ArenaService;
use crate::kind::{Kind, NativeResource};
use crate::refcount::{decrement_counter, DecrementOutcome};
use std::alloc::Layout;
use std::cell::UnsafeCell;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A handle to a wrapped native capability
///
/// Created with refcount 1. Dropping the record releases its reference: for
/// a promoted record that is an atomic decrement on the shared root, and the
/// last decrement closes the native resource and frees the root. For a
/// never-promoted record the owned payload is simply dropped with it.
pub struct ObjectRecord {
    kind: Kind,
    link: Link,
}

/// Ownership link of a record
///
/// `Local` carries live state; `Forward` is a stub. Promotion rewrites
/// `Local` into `Forward` exactly once.
pub(crate) enum Link {
    Local(LocalRoot),
    Forward(SharedPtr),
}

/// Authoritative record state before promotion
pub struct LocalRoot {
    pub(crate) refcount: AtomicUsize,
    /// `None` only transiently while promotion moves the payload out.
    pub(crate) resource: Option<Box<dyn NativeResource>>,
}

// SAFETY: shared references to a local root only touch the atomic counter;
// the resource payload is reachable solely through &mut during promotion.
unsafe impl Sync for LocalRoot {}

/// Unmanaged, atomically refcounted root
///
/// Allocated through an [`ArenaService`] outside every managed pool, so it
/// survives the context that created it. Never moved back to managed memory.
pub struct SharedRoot {
    kind: Kind,
    refcount: AtomicUsize,
    /// Touched only single-threaded: written at promotion before the root is
    /// shared, taken by the thread performing the final destroy.
    resource: UnsafeCell<Option<Box<dyn NativeResource>>>,
    /// The service that allocated this root; the final release deallocates
    /// through the same service.
    arena: Arc<dyn ArenaService>,
}

// SAFETY: refcount is atomic, kind and arena are immutable after
// construction, and the resource cell is only accessed by the promoting
// thread (before sharing) and the destroying thread (after the last
// decrement, which synchronizes via AcqRel).
unsafe impl Sync for SharedRoot {}
unsafe impl Send for SharedRoot {}

impl SharedRoot {
    /// Kind descriptor of the wrapped resource
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Current reference count
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    pub(crate) fn counter(&self) -> &AtomicUsize {
        &self.refcount
    }
}

/// Raw pointer to an unmanaged root
///
/// Copyable token handed out by promotion, embedded in tuple buffers and
/// registry entries. Holding a `SharedPtr` does not itself own a reference;
/// ownership is tracked by the refcount on the root.
#[derive(Clone, Copy)]
pub struct SharedPtr(NonNull<SharedRoot>);

// SAFETY: the pointee is Send + Sync and lives until its refcount reaches
// zero; the pointer itself is just an address.
unsafe impl Send for SharedPtr {}
unsafe impl Sync for SharedPtr {}

impl SharedPtr {
    /// Borrow the root
    #[inline]
    pub fn root(&self) -> &SharedRoot {
        // SAFETY: a SharedPtr is only reachable while at least one
        // outstanding reference keeps the root alive.
        unsafe { self.0.as_ref() }
    }

    /// Address of the root, used for identity comparisons and the tuple
    /// wire form
    #[inline]
    pub fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Rebuild a pointer from an address read out of a tuple buffer
    ///
    /// Returns `None` for a null address. The address is trusted beyond
    /// that: tuple transfer is intra-process only.
    pub(crate) fn from_addr(addr: usize) -> Option<SharedPtr> {
        NonNull::new(addr as *mut SharedRoot).map(SharedPtr)
    }

    /// Decrement the root's refcount and destroy it if this was the final
    /// reference. Returns the outcome of the decrement.
    pub(crate) fn release(self) -> DecrementOutcome {
        let outcome = decrement_counter(self.root().counter());
        if outcome == DecrementOutcome::Destroy {
            // SAFETY: the counter reached zero, so no other reference can
            // observe the root anymore.
            unsafe { destroy_shared(self) };
        }
        outcome
    }
}

impl fmt::Debug for SharedPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedPtr({:#x})", self.addr())
    }
}

/// Resolved view of a record's authoritative root
pub enum RootRef<'a> {
    /// Root still in managed memory, never promoted
    Local(&'a LocalRoot),
    /// Unmanaged root reached through a forwarding stub
    Shared(&'a SharedRoot),
}

impl RootRef<'_> {
    /// Current reference count on the root
    pub fn refcount(&self) -> usize {
        self.counter().load(Ordering::Acquire)
    }

    /// Whether the root lives in unmanaged memory
    pub fn is_unmanaged(&self) -> bool {
        matches!(self, RootRef::Shared(_))
    }

    pub(crate) fn counter(&self) -> &AtomicUsize {
        match self {
            RootRef::Local(root) => &root.refcount,
            RootRef::Shared(root) => root.counter(),
        }
    }
}

impl ObjectRecord {
    /// Wrap a native capability in a fresh managed record with refcount 1
    pub(crate) fn new(resource: Box<dyn NativeResource>) -> Self {
        let kind = resource.kind();
        Self {
            kind,
            link: Link::Local(LocalRoot {
                refcount: AtomicUsize::new(1),
                resource: Some(resource),
            }),
        }
    }

    /// Build a forwarding stub bound to an existing unmanaged root
    ///
    /// Does not touch the refcount: the caller must hand over an already
    /// owned reference (a transfer) or take one explicitly first.
    pub(crate) fn from_shared(root: SharedPtr) -> Self {
        Self {
            kind: root.root().kind(),
            link: Link::Forward(root),
        }
    }

    /// Kind descriptor of the wrapped resource
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Walk to the authoritative root
    ///
    /// Pure and side-effect-free. The walk is a single hop at most because
    /// promotion always links stubs directly to the root, never to another
    /// stub.
    pub fn resolve(&self) -> RootRef<'_> {
        match &self.link {
            Link::Local(root) => RootRef::Local(root),
            Link::Forward(ptr) => RootRef::Shared(ptr.root()),
        }
    }

    /// Whether this record has been promoted to an unmanaged root
    pub fn is_promoted(&self) -> bool {
        matches!(self.link, Link::Forward(_))
    }

    /// Address of the unmanaged root, if promoted
    ///
    /// Two stubs alias the same object exactly when their root addresses are
    /// equal.
    pub fn shared_addr(&self) -> Option<usize> {
        match &self.link {
            Link::Local(_) => None,
            Link::Forward(ptr) => Some(ptr.addr()),
        }
    }

    /// Whether two records resolve to the same unmanaged root
    pub fn same_root(&self, other: &ObjectRecord) -> bool {
        match (self.shared_addr(), other.shared_addr()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Current reference count on the resolved root
    pub fn refcount(&self) -> usize {
        self.resolve().refcount()
    }

    /// Release this record's reference explicitly
    ///
    /// Equivalent to dropping the record; provided for wrapper finalizers
    /// that want the release to be visible in the source.
    pub fn release(self) {
        drop(self);
    }

    pub(crate) fn shared_ptr(&self) -> Option<SharedPtr> {
        match &self.link {
            Link::Local(_) => None,
            Link::Forward(ptr) => Some(*ptr),
        }
    }

    pub(crate) fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

impl fmt::Debug for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRecord")
            .field("kind", &self.kind)
            .field("promoted", &self.is_promoted())
            .field("refcount", &self.refcount())
            .finish()
    }
}

impl Drop for ObjectRecord {
    fn drop(&mut self) {
        if let Link::Forward(ptr) = &self.link {
            (*ptr).release();
        }
        // Local roots own their payload; it drops with the record and the
        // native resource is closed by the wrapper that owns the record.
    }
}

/// Allocate an unmanaged root holding `resource`, with refcount 1
///
/// On allocation failure the resource is handed back so the caller can
/// restore it; nothing is lost on a recoverable out-of-memory condition.
pub(crate) fn allocate_shared(
    kind: Kind,
    resource: Box<dyn NativeResource>,
    arena: &Arc<dyn ArenaService>,
) -> std::result::Result<SharedPtr, (crate::error::LomError, Box<dyn NativeResource>)> {
    let layout = Layout::new::<SharedRoot>();
    let raw = match arena.allocate(layout) {
        Ok(block) => block.cast::<SharedRoot>(),
        Err(err) => return Err((err, resource)),
    };

    // SAFETY: raw is valid for writes of SharedRoot, freshly allocated with
    // the matching layout.
    unsafe {
        raw.as_ptr().write(SharedRoot {
            kind,
            refcount: AtomicUsize::new(1),
            resource: UnsafeCell::new(Some(resource)),
            arena: Arc::clone(arena),
        });
    }

    Ok(SharedPtr(raw))
}

/// Close the resource and free the root's backing memory
///
/// # Safety
/// Must be called exactly once, after the root's refcount has reached zero.
pub(crate) unsafe fn destroy_shared(ptr: SharedPtr) {
    let raw = ptr.0.as_ptr();

    // Keep the allocator alive past drop_in_place.
    let arena = unsafe { Arc::clone(&(*raw).arena) };

    if let Some(mut resource) = unsafe { (*(*raw).resource.get()).take() } {
        log::trace!("closing {} resource at {:#x}", resource.kind(), ptr.addr());
        resource.close();
    }

    unsafe {
        std::ptr::drop_in_place(raw);
        arena.deallocate(ptr.0.cast::<u8>(), Layout::new::<SharedRoot>());
    }
}

static_assertions::assert_impl_all!(ObjectRecord: Send, Sync);
static_assertions::assert_impl_all!(SharedPtr: Send, Sync);
