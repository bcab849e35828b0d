//! Named Registry - Identifier-Keyed Object Handoff
//!
//! Alternate path to the same promotion mechanism the tuple codec uses, for
//! out-of-band transfer: one context registers a promoted object under a
//! fresh random identifier, an unrelated context retrieves it exactly once
//! by that identifier.
//!
//! Entries form a singly linked list, newest first. A successful deref
//! unlinks its entry, so the identifier cannot be dereferenced twice.
//! Entries that are registered but never dereferenced accumulate for the
//! life of the registry; there is no eviction. The registry makes that
//! growth visible (warning threshold, teardown logging) instead of hiding
//! it.

use crate::arena::ArenaService;
use crate::error::{LomError, Result};
use crate::kind::Kind;
use crate::object::{promote, ObjectRecord, SharedPtr};
use crate::refcount;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One registered object, an intrusively linked node
struct Entry {
    id: String,
    kind: Kind,
    root: SharedPtr,
    registered_at: DateTime<Utc>,
    next: Option<Box<Entry>>,
}

/// Identifier-keyed handoff registry
///
/// Process-wide mutable state, owned by the runtime and injected where it is
/// needed rather than living in a module-level singleton.
pub struct NamedRegistry {
    head: Mutex<Option<Box<Entry>>>,
    len: AtomicUsize,
    warn_threshold: usize,
}

impl NamedRegistry {
    /// Create an empty registry
    ///
    /// `warn_threshold` is the entry count at which growth is logged; see
    /// the module documentation for why the registry can only grow when
    /// identifiers are abandoned.
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            head: Mutex::new(None),
            len: AtomicUsize::new(0),
            warn_threshold,
        }
    }

    /// Register an object, returning its fresh identifier
    ///
    /// Promotes the record and takes one reference on its root; that
    /// reference is held by the registry entry until a deref transfers it
    /// out.
    pub fn register(
        &self,
        record: &mut ObjectRecord,
        arena: &Arc<dyn ArenaService>,
    ) -> Result<String> {
        let root = promote(record, arena)?;
        refcount::increment(record);

        let id = new_identifier();
        let mut entry = Box::new(Entry {
            id: id.clone(),
            kind: record.kind(),
            root,
            registered_at: Utc::now(),
            next: None,
        });

        let mut head = self.head.lock();
        entry.next = head.take();
        *head = Some(entry);
        drop(head);

        let len = self.len.fetch_add(1, Ordering::Relaxed) + 1;
        if len == self.warn_threshold {
            log::warn!(
                "registry reached {} entries; identifiers that are never \
                 dereferenced are not reclaimed",
                len
            );
        }

        log::debug!("registered {} object as {}", record.kind(), id);
        Ok(id)
    }

    /// Retrieve and consume a registered object
    ///
    /// Unlinks the entry, so a second deref of the same identifier fails.
    /// The reference held by the entry transfers to the returned stub; no
    /// additional increment happens.
    pub fn take(&self, identifier: &str) -> Result<ObjectRecord> {
        let mut head = self.head.lock();
        let mut cursor: &mut Option<Box<Entry>> = &mut *head;

        loop {
            let matched = match cursor {
                Some(entry) => entry.id == identifier,
                None => {
                    return Err(LomError::NotRegistered {
                        identifier: identifier.to_string(),
                    })
                }
            };

            if matched {
                let mut entry = match cursor.take() {
                    Some(entry) => entry,
                    None => {
                        return Err(LomError::Internal(
                            "registry cursor lost its entry".to_string(),
                        ))
                    }
                };
                *cursor = entry.next.take();
                self.len.fetch_sub(1, Ordering::Relaxed);

                log::debug!("dereferenced {} object {}", entry.kind, entry.id);
                return Ok(ObjectRecord::from_shared(entry.root));
            }

            cursor = match cursor {
                Some(entry) => &mut entry.next,
                None => {
                    return Err(LomError::NotRegistered {
                        identifier: identifier.to_string(),
                    })
                }
            };
        }
    }

    /// Number of entries currently registered
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log every entry still registered, with its age
    ///
    /// Called at teardown. Returns the number of leaked entries.
    pub fn log_leaked(&self) -> usize {
        let head = self.head.lock();
        let now = Utc::now();
        let mut leaked = 0;

        let mut cursor = head.as_deref();
        while let Some(entry) = cursor {
            let age = now.signed_duration_since(entry.registered_at);
            log::warn!(
                "registry entry {} ({}) never dereferenced, registered {}s ago",
                entry.id,
                entry.kind,
                age.num_seconds()
            );
            leaked += 1;
            cursor = entry.next.as_deref();
        }

        leaked
    }
}

impl Drop for NamedRegistry {
    fn drop(&mut self) {
        // Walk the chain iteratively; a long leaked chain would overflow the
        // stack if Box's recursive drop handled it.
        let mut cursor = self.head.lock().take();
        while let Some(mut entry) = cursor {
            cursor = entry.next.take();
            entry.root.release();
        }
    }
}

/// Generate a fresh random identifier in UUID v4 text form
fn new_identifier() -> String {
    let mut bytes = rand::random::<u128>().to_be_bytes();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}
