//! Object Kinds - Type Descriptors for Wrapped Resources
//!
//! Every object record carries a `Kind`, the closed set of native capability
//! types the binding layer wraps. The kind survives promotion and travels
//! inside tuple buffers, so a receiving context can validate what it
//! reconstructs.
//!
//! Dispatch on the wrapped capability itself goes through the
//! [`NativeResource`] trait rather than a raw function table.

use std::fmt;

/// Closed set of wrapped resource kinds
///
/// Discriminants are stable: they are encoded into tuple buffers as a
/// machine word and must round-trip across threads within one process.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    File = 0,
    Directory = 1,
    Pipe = 2,
    Socket = 3,
    PollSet = 4,
    Process = 5,
    Thread = 6,
    Queue = 7,
    Database = 8,
    Pool = 9,
}

impl Kind {
    /// All kinds, in discriminant order
    pub const ALL: [Kind; 10] = [
        Kind::File,
        Kind::Directory,
        Kind::Pipe,
        Kind::Socket,
        Kind::PollSet,
        Kind::Process,
        Kind::Thread,
        Kind::Queue,
        Kind::Database,
        Kind::Pool,
    ];

    /// Human-readable kind name
    pub fn name(self) -> &'static str {
        match self {
            Kind::File => "file",
            Kind::Directory => "directory",
            Kind::Pipe => "pipe",
            Kind::Socket => "socket",
            Kind::PollSet => "pollset",
            Kind::Process => "process",
            Kind::Thread => "thread",
            Kind::Queue => "queue",
            Kind::Database => "database",
            Kind::Pool => "pool",
        }
    }

    /// Encode as a machine word for the tuple wire form
    #[inline]
    pub(crate) fn to_word(self) -> usize {
        self as usize
    }

    /// Decode from a machine word read out of a tuple buffer
    ///
    /// Returns `None` for words outside the closed set, which decode treats
    /// as buffer corruption.
    pub(crate) fn from_word(word: usize) -> Option<Kind> {
        match word {
            0 => Some(Kind::File),
            1 => Some(Kind::Directory),
            2 => Some(Kind::Pipe),
            3 => Some(Kind::Socket),
            4 => Some(Kind::PollSet),
            5 => Some(Kind::Process),
            6 => Some(Kind::Thread),
            7 => Some(Kind::Queue),
            8 => Some(Kind::Database),
            9 => Some(Kind::Pool),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Behavior interface for wrapped native capabilities
///
/// The wrapper layer implements this once per capability (a file handle, a
/// database connection, a pollset). The object model only needs to know the
/// kind of a resource and how to tear it down; everything else stays in the
/// wrapper.
///
/// Implementations must be `Send`: a promoted resource may be destroyed by
/// whichever thread drops the last reference.
pub trait NativeResource: Send {
    /// Kind descriptor for this resource
    fn kind(&self) -> Kind;

    /// Release the underlying native handle
    ///
    /// Called at most once, immediately before the record backing this
    /// resource is deallocated. Must not panic.
    fn close(&mut self);
}

/// Validate that a record resolves to the expected kind
///
/// Misuse error for wrappers that received a handle of the wrong type.
pub fn expect_kind(
    record: &crate::object::ObjectRecord,
    expected: Kind,
) -> crate::error::Result<()> {
    let actual = record.kind();
    if actual == expected {
        Ok(())
    } else {
        Err(crate::error::LomError::KindMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_word_roundtrip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_word(kind.to_word()), Some(kind));
        }
    }

    #[test]
    fn test_kind_word_rejects_unknown() {
        assert_eq!(Kind::from_word(10), None);
        assert_eq!(Kind::from_word(usize::MAX), None);
    }

    #[test]
    fn test_kind_names_unique() {
        let mut names: Vec<&str> = Kind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Kind::ALL.len());
    }
}
