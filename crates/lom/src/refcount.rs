//! Reference-Count Manager - Atomic Share Accounting
//!
//! All operations resolve a record to its authoritative root first, then
//! perform one lock-free atomic operation on the root's counter. No mutex
//! guards a record.
//!
//! Decrement-and-check is a single atomic operation returning
//! [`DecrementOutcome`], so the decision to destroy is made by exactly one
//! thread. [`collectable`] remains advisory: a caller that checks it and then
//! acts is exposed to a concurrent increment or decrement in between. That
//! window is an accepted, documented property of the model, not something
//! this module papers over with locking.

use crate::object::ObjectRecord;
use crate::util::atomic;
use std::sync::atomic::AtomicUsize;

/// Result of an atomic decrement on a root's counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Other references remain outstanding
    StillShared,
    /// This was the final reference; the root is eligible for destruction
    Destroy,
}

/// Take an additional logical reference on the resolved root
///
/// Callers that hand a record to another holder without going through the
/// tuple codec or the registry take the share themselves with this call. The
/// counter saturates instead of wrapping.
pub fn increment(record: &ObjectRecord) {
    atomic::saturating_add(record.resolve().counter(), 1);
}

/// Drop one logical reference on the resolved root
///
/// Returns whether the count reached zero. This only adjusts accounting; it
/// never frees the root. Destruction of unmanaged roots happens when the
/// record owning the final reference is released.
pub fn decrement(record: &ObjectRecord) -> DecrementOutcome {
    decrement_counter(record.resolve().counter())
}

/// Whether the caller holds the only outstanding reference
///
/// Used by wrapper finalizers to decide if the underlying native resource
/// should be torn down along with the record. Advisory only: the answer can
/// be stale by the time the caller acts on it.
pub fn collectable(record: &ObjectRecord) -> bool {
    record.resolve().refcount() == 1
}

/// Single atomic decrement-and-check on a root counter
pub(crate) fn decrement_counter(counter: &AtomicUsize) -> DecrementOutcome {
    match atomic::saturating_sub(counter, 1) {
        1 => DecrementOutcome::Destroy,
        0 => {
            // Saturated: a decrement without a matching reference. The
            // counter is left at zero rather than wrapped.
            log::error!("refcount decremented below zero");
            debug_assert!(false, "refcount underflow");
            DecrementOutcome::StillShared
        }
        _ => DecrementOutcome::StillShared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{Kind, NativeResource};
    use crate::object::ObjectRecord;

    struct Dummy;

    impl NativeResource for Dummy {
        fn kind(&self) -> Kind {
            Kind::Database
        }

        fn close(&mut self) {}
    }

    fn record() -> ObjectRecord {
        ObjectRecord::new(Box::new(Dummy))
    }

    #[test]
    fn test_refcount_balance() {
        let record = record();
        assert_eq!(record.refcount(), 1);
        assert!(collectable(&record));

        increment(&record);
        assert_eq!(record.refcount(), 2);
        assert!(!collectable(&record));

        assert_eq!(decrement(&record), DecrementOutcome::StillShared);
        assert_eq!(record.refcount(), 1);
        assert!(collectable(&record));

        assert_eq!(decrement(&record), DecrementOutcome::Destroy);
        assert_eq!(record.refcount(), 0);
    }

    #[test]
    fn test_decrement_counter_outcomes() {
        let counter = AtomicUsize::new(2);
        assert_eq!(decrement_counter(&counter), DecrementOutcome::StillShared);
        assert_eq!(decrement_counter(&counter), DecrementOutcome::Destroy);
    }

    #[test]
    fn test_concurrent_increments_balance() {
        use std::sync::Arc;
        use std::thread;

        let record = Arc::new(record());
        let mut handles = vec![];

        for _ in 0..4 {
            let record = Arc::clone(&record);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    increment(&record);
                    decrement(&record);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(record.refcount(), 1);
        assert!(collectable(&record));
    }
}
