//! Promotion Engine - Managed Record to Unmanaged Root
//!
//! Promotion is the one-way conversion of a managed record into an
//! independently allocated, atomically refcounted clone. It runs the first
//! time an object must cross a context boundary:
//!
//! 1. Resolve the record. Already promoted records return their existing
//!    root unchanged; promotion is idempotent.
//! 2. Allocate a root through the arena service, outside every managed pool.
//! 3. Move the record's payload into the clone and set its refcount to 1.
//! 4. Rewrite the record's link to forward at the clone. The record is now a
//!    pure stub holding no state of its own.
//!
//! Promotion takes the record by `&mut`, so it can only happen under the
//! originating context's exclusive ownership of the handle, never
//! speculatively from another thread.
//!
//! Promotion does **not** increment the refcount. Making an object shareable
//! and taking a share of it are separate steps; callers that retain an
//! additional reference take it through the reference-count manager.

use crate::arena::ArenaService;
use crate::error::{LomError, Result};
use crate::object::record::{allocate_shared, Link, ObjectRecord, SharedPtr};
use std::sync::Arc;

/// Promote a record, returning its unmanaged root
///
/// # Returns
/// - `Ok(root)` - The unmanaged root, newly created or pre-existing
/// - `Err(LomError::OutOfMemory)` - Allocation failed; the record keeps its
///   payload and stays usable in managed memory
pub fn promote(
    record: &mut ObjectRecord,
    arena: &Arc<dyn ArenaService>,
) -> Result<SharedPtr> {
    let kind = record.kind();

    let resource = match record.link_mut() {
        // Idempotent: re-promoting a stub yields the same root.
        Link::Forward(ptr) => return Ok(*ptr),

        Link::Local(local) => local.resource.take().ok_or_else(|| {
            LomError::Internal("local root has no payload".to_string())
        })?,
    };

    match allocate_shared(kind, resource, arena) {
        Ok(root) => {
            *record.link_mut() = Link::Forward(root);
            log::trace!("promoted {} record to root {:#x}", kind, root.addr());
            Ok(root)
        }
        Err((err, resource)) => {
            // Recoverable out-of-memory: restore the payload.
            if let Link::Local(local) = record.link_mut() {
                local.resource = Some(resource);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{CountingArena, SystemArena};
    use crate::kind::{Kind, NativeResource};
    use crate::object::ObjectRecord;
    use std::alloc::Layout;
    use std::ptr::NonNull;

    struct Dummy;

    impl NativeResource for Dummy {
        fn kind(&self) -> Kind {
            Kind::Socket
        }

        fn close(&mut self) {}
    }

    /// Arena that always reports exhaustion
    struct EmptyArena;

    impl ArenaService for EmptyArena {
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
            Err(LomError::OutOfMemory {
                requested: layout.size(),
            })
        }

        unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
    }

    #[test]
    fn test_promote_rewrites_record_to_stub() {
        let arena: Arc<dyn ArenaService> = Arc::new(SystemArena::new());
        let mut record = ObjectRecord::new(Box::new(Dummy));

        let root = promote(&mut record, &arena).unwrap();
        assert!(record.is_promoted());
        assert_eq!(record.shared_addr(), Some(root.addr()));
        assert_eq!(root.root().refcount(), 1);
    }

    #[test]
    fn test_promote_is_idempotent() {
        let counting = Arc::new(CountingArena::new());
        let arena: Arc<dyn ArenaService> = counting.clone();
        let mut record = ObjectRecord::new(Box::new(Dummy));

        let first = promote(&mut record, &arena).unwrap();
        let second = promote(&mut record, &arena).unwrap();

        assert_eq!(first.addr(), second.addr());
        assert_eq!(counting.allocations(), 1);
    }

    #[test]
    fn test_promote_oom_leaves_record_usable() {
        let arena: Arc<dyn ArenaService> = Arc::new(EmptyArena);
        let mut record = ObjectRecord::new(Box::new(Dummy));

        let err = promote(&mut record, &arena).unwrap_err();
        assert!(matches!(err, LomError::OutOfMemory { .. }));
        assert!(err.is_recoverable());

        // The payload went back; the record still resolves locally.
        assert!(!record.is_promoted());
        assert_eq!(record.refcount(), 1);

        // And a later promotion through a working arena succeeds.
        let working: Arc<dyn ArenaService> = Arc::new(SystemArena::new());
        assert!(promote(&mut record, &working).is_ok());
    }
}
