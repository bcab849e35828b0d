//! Object Model Integration Tests - Lifetime, Aliasing, Promotion
//!
//! End-to-end checks of the record lifecycle against an allocation-tracking
//! arena:
//! - Root uniqueness across arbitrarily many stubs
//! - Promotion idempotence
//! - Refcount balance and the collectable predicate
//! - Exactly-once destruction of promoted roots

mod common;

use common::ModelFixture;
use lom::{expect_kind, refcount, DecrementOutcome, Kind, LomError};
use std::sync::atomic::Ordering;

#[test]
fn test_root_uniqueness_across_stubs() {
    let fixture = ModelFixture::with_defaults();
    let (mut original, _closes) = fixture.new_object(Kind::File);

    let root = fixture.runtime.promote(&mut original).unwrap();

    let stubs: Vec<_> = (0..8)
        .map(|_| fixture.runtime.create_reference(root))
        .collect();

    // Every stub resolves to the identical root.
    for stub in &stubs {
        assert!(stub.same_root(&original));
        assert_eq!(stub.shared_addr(), Some(root.addr()));
        assert!(stub.resolve().is_unmanaged());
    }

    // One reference per stub plus the original.
    assert_eq!(original.refcount(), 9);

    drop(stubs);
    assert_eq!(original.refcount(), 1);
    assert!(refcount::collectable(&original));
}

#[test]
fn test_promotion_is_idempotent() {
    let fixture = ModelFixture::with_defaults();
    let (mut original, _closes) = fixture.new_object(Kind::Socket);

    let first = fixture.runtime.promote(&mut original).unwrap();
    let second = fixture.runtime.promote(&mut original).unwrap();

    assert_eq!(first.addr(), second.addr());
    // The root was cloned into unmanaged memory exactly once.
    assert_eq!(fixture.arena.allocations(), 1);
    assert_eq!(fixture.runtime.stats().promotions, 1);
}

#[test]
fn test_refcount_balance_and_collectable() {
    let fixture = ModelFixture::with_defaults();
    let (record, _closes) = fixture.new_object(Kind::Database);

    // Created with one reference.
    assert_eq!(record.refcount(), 1);
    assert!(refcount::collectable(&record));

    refcount::increment(&record);
    assert_eq!(record.refcount(), 2);
    assert!(!refcount::collectable(&record));

    assert_eq!(refcount::decrement(&record), DecrementOutcome::StillShared);
    assert_eq!(record.refcount(), 1);
    assert!(refcount::collectable(&record));

    assert_eq!(refcount::decrement(&record), DecrementOutcome::Destroy);
    assert_eq!(record.refcount(), 0);
}

#[test]
fn test_exactly_once_destruction() {
    let fixture = ModelFixture::with_defaults();
    let (mut original, closes) = fixture.new_object(Kind::File);

    let root = fixture.runtime.promote(&mut original).unwrap();
    let alias_a = fixture.runtime.create_reference(root);
    let alias_b = fixture.runtime.create_reference(root);

    assert_eq!(fixture.arena.live(), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 0);

    drop(alias_a);
    drop(original);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.arena.deallocations(), 0);

    // The final release closes the resource and frees the root, once.
    drop(alias_b);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.arena.deallocations(), 1);
    assert_eq!(fixture.arena.live(), 0);
}

#[test]
fn test_unpromoted_record_never_touches_arena() {
    let fixture = ModelFixture::with_defaults();
    let (record, closes) = fixture.new_object(Kind::Pipe);

    drop(record);

    // Managed records are reclaimed by their owner, not by the arena
    // service; the wrapper owns closing unpromoted resources.
    assert_eq!(fixture.arena.allocations(), 0);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_explicit_release() {
    let fixture = ModelFixture::with_defaults();
    let (mut original, closes) = fixture.new_object(Kind::Queue);

    let root = fixture.runtime.promote(&mut original).unwrap();
    let alias = fixture.runtime.create_reference(root);

    original.release();
    assert_eq!(alias.refcount(), 1);

    alias.release();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.arena.live(), 0);
}

#[test]
fn test_expect_kind_mismatch() {
    let fixture = ModelFixture::with_defaults();
    let (record, _closes) = fixture.new_object(Kind::Socket);

    assert!(expect_kind(&record, Kind::Socket).is_ok());

    let err = expect_kind(&record, Kind::Database).unwrap_err();
    match err {
        LomError::KindMismatch { expected, actual } => {
            assert_eq!(expected, Kind::Database);
            assert_eq!(actual, Kind::Socket);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_collectable_is_advisory_under_aliases() {
    let fixture = ModelFixture::with_defaults();
    let (mut original, _closes) = fixture.new_object(Kind::PollSet);

    let root = fixture.runtime.promote(&mut original).unwrap();
    let alias = fixture.runtime.create_reference(root);

    // With another alias live the caller is not the sole owner.
    assert!(!refcount::collectable(&original));
    drop(alias);
    assert!(refcount::collectable(&original));
}
