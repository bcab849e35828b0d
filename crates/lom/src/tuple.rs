//! Tuple Codec - Cross-Boundary Value Transfer
//!
//! Serializes an ordered, fixed-length sequence of tagged values into one
//! contiguous relocatable buffer, and reconstructs it on the other side of a
//! context boundary.
//!
//! Wire form (receiver-native byte order; transfer is intra-process only):
//! ```text
//! ┌──────────────┬─────┬─────────┬─────┬─────────┬────
//! │ count (word) │ tag │ payload │ tag │ payload │ ...
//! └──────────────┴─────┴─────────┴─────┴─────────┴────
//! ```
//!
//! Per element, one tag byte followed by:
//! - `nil` / `false` / `true`: no payload
//! - `number`: 8-byte floating point
//! - `string`: length word + raw bytes (binary-safe, embedded NULs allowed)
//! - `object`: kind word + promoted-root address word
//!
//! Packing is copy-on-serialize for scalars and reference-sharing for
//! objects: an embedded object is promoted and one reference is taken on its
//! root, conceptually transferred to whoever unpacks the buffer. Unpacking
//! rebuilds each object as a fresh forwarding stub bound to the same root
//! without a second increment.
//!
//! Encoding is two-pass: the exact size is computed first, the buffer is
//! allocated once, and the fill pass is infallible. That keeps the encode
//! deterministic and the buffer inspectable.

use crate::arena::ArenaService;
use crate::error::{LomError, Result};
use crate::kind::Kind;
use crate::object::{promote, ObjectRecord, SharedPtr};
use crate::refcount;
use std::sync::Arc;

pub(crate) const TAG_NIL: u8 = 0x00;
pub(crate) const TAG_FALSE: u8 = 0x01;
pub(crate) const TAG_TRUE: u8 = 0x02;
pub(crate) const TAG_NUMBER: u8 = 0x03;
pub(crate) const TAG_STRING: u8 = 0x04;
pub(crate) const TAG_OBJECT: u8 = 0x05;

const WORD: usize = std::mem::size_of::<usize>();
const NUMBER_SIZE: usize = std::mem::size_of::<f64>();

/// A value that may cross a context boundary
///
/// Object values compare equal when they resolve to the same root, not by
/// stub identity.
#[derive(Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    /// Binary-safe byte string; not NUL-terminated
    Str(Vec<u8>),
    Object(ObjectRecord),
}

impl Value {
    /// Human-readable type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same_root(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into_bytes())
    }
}

impl From<ObjectRecord> for Value {
    fn from(value: ObjectRecord) -> Self {
        Value::Object(value)
    }
}

/// One packed tuple: a flat, relocatable, `Send` byte buffer
///
/// Consumed exactly once by [`unpack`]. Dropping a buffer without unpacking
/// it leaks the references that were transferred into it at pack time; the
/// transfer protocol owns balancing them, not this type.
#[derive(Debug)]
pub struct TupleBuf {
    bytes: Vec<u8>,
}

impl TupleBuf {
    /// Wrap raw bytes received from a transport that moves byte buffers
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrow the encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unwrap into the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Element count claimed by the header, if the buffer has one
    pub fn element_count(&self) -> Option<usize> {
        read_word_at(&self.bytes, 0)
    }

    /// Encoded size in bytes
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Exact encoded size of a value sequence
///
/// This is the size the fill pass will produce; tests use it to check the
/// encode against the allocation.
pub fn encoded_size(values: &[Value]) -> usize {
    WORD + values.iter().map(encoded_size_of).sum::<usize>()
}

fn encoded_size_of(value: &Value) -> usize {
    1 + match value {
        Value::Nil | Value::Bool(_) => 0,
        Value::Number(_) => NUMBER_SIZE,
        Value::Str(bytes) => WORD + bytes.len(),
        Value::Object(_) => 2 * WORD,
    }
}

/// Pack a value sequence into one transferable buffer
///
/// Embedded objects are promoted (hence `&mut`) and one reference is taken
/// on each of their roots, owned by the buffer until it is unpacked. The
/// source values are not consumed: scalars are copied, objects stay aliased.
///
/// # Returns
/// - `Ok(buffer)` - Flat buffer ready for a queue or another context
/// - `Err(LomError::OutOfMemory)` - Promotion failed; no references were
///   taken and the values are unchanged
pub fn pack(values: &mut [Value], arena: &Arc<dyn ArenaService>) -> Result<TupleBuf> {
    // Make every embedded object shareable before anything is written, so
    // the fill pass below cannot fail and no increment happens on an
    // abandoned encode.
    for value in values.iter_mut() {
        if let Value::Object(record) = value {
            promote(record, arena)?;
        }
    }

    let total = encoded_size(values);
    let mut bytes = Vec::with_capacity(total);
    write_word(&mut bytes, values.len());

    for value in values.iter() {
        match value {
            Value::Nil => bytes.push(TAG_NIL),
            Value::Bool(false) => bytes.push(TAG_FALSE),
            Value::Bool(true) => bytes.push(TAG_TRUE),
            Value::Number(number) => {
                bytes.push(TAG_NUMBER);
                bytes.extend_from_slice(&number.to_ne_bytes());
            }
            Value::Str(data) => {
                bytes.push(TAG_STRING);
                write_word(&mut bytes, data.len());
                bytes.extend_from_slice(data);
            }
            Value::Object(record) => {
                let root = match record.shared_ptr() {
                    Some(root) => root,
                    None => {
                        return Err(LomError::Internal(
                            "object not promoted at fill time".to_string(),
                        ))
                    }
                };
                // Transfer one reference into the buffer; the receiving
                // side's stub inherits it.
                refcount::increment(record);
                bytes.push(TAG_OBJECT);
                write_word(&mut bytes, record.kind().to_word());
                write_word(&mut bytes, root.addr());
            }
        }
    }

    debug_assert_eq!(bytes.len(), total);
    Ok(TupleBuf { bytes })
}

/// Unpack a buffer back into values, consuming it
///
/// Object elements come back as fresh forwarding stubs bound to the same
/// roots, owning the references taken at pack time. A corrupt or truncated
/// buffer aborts the decode: the error reports how many elements were
/// recovered, and stubs already reconstructed release their references when
/// the partial result is dropped.
pub fn unpack(buf: TupleBuf) -> Result<Vec<Value>> {
    let bytes = buf.bytes;
    let mut cursor = Cursor::new(&bytes);

    let count = cursor
        .read_word()
        .ok_or(LomError::TruncatedTuple { decoded: 0 })?;

    // Every element needs at least its tag byte.
    if count > bytes.len() {
        return Err(LomError::TruncatedTuple { decoded: 0 });
    }

    let mut values = Vec::with_capacity(count);

    for _ in 0..count {
        let decoded = values.len();
        let tag = cursor
            .read_u8()
            .ok_or(LomError::TruncatedTuple { decoded })?;

        let value = match tag {
            TAG_NIL => Value::Nil,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_NUMBER => {
                let number = cursor
                    .read_f64()
                    .ok_or(LomError::TruncatedTuple { decoded })?;
                Value::Number(number)
            }
            TAG_STRING => {
                let len = cursor
                    .read_word()
                    .ok_or(LomError::TruncatedTuple { decoded })?;
                let data = cursor
                    .read_bytes(len)
                    .ok_or(LomError::TruncatedTuple { decoded })?;
                Value::Str(data.to_vec())
            }
            TAG_OBJECT => {
                let kind_word = cursor
                    .read_word()
                    .ok_or(LomError::TruncatedTuple { decoded })?;
                let addr = cursor
                    .read_word()
                    .ok_or(LomError::TruncatedTuple { decoded })?;

                let kind = Kind::from_word(kind_word)
                    .ok_or(LomError::CorruptTuple { tag, decoded })?;
                let root = SharedPtr::from_addr(addr)
                    .ok_or(LomError::CorruptTuple { tag, decoded })?;

                let actual = root.root().kind();
                if actual != kind {
                    return Err(LomError::KindMismatch {
                        expected: kind,
                        actual,
                    });
                }

                // The reference taken at pack time transfers to this stub.
                Value::Object(ObjectRecord::from_shared(root))
            }
            other => {
                log::error!(
                    "tuple decode aborted: unrecognized tag {:#04x} after {} element(s)",
                    other,
                    decoded
                );
                return Err(LomError::CorruptTuple {
                    tag: other,
                    decoded,
                });
            }
        };

        values.push(value);
    }

    Ok(values)
}

fn write_word(bytes: &mut Vec<u8>, word: usize) {
    bytes.extend_from_slice(&word.to_ne_bytes());
}

fn read_word_at(bytes: &[u8], offset: usize) -> Option<usize> {
    let end = offset.checked_add(WORD)?;
    let slice = bytes.get(offset..end)?;
    let mut raw = [0u8; WORD];
    raw.copy_from_slice(slice);
    Some(usize::from_ne_bytes(raw))
}

/// Sequential reader over an encoded buffer
struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.offset)?;
        self.offset += 1;
        Some(byte)
    }

    fn read_word(&mut self) -> Option<usize> {
        let word = read_word_at(self.bytes, self.offset)?;
        self.offset += WORD;
        Some(word)
    }

    fn read_f64(&mut self) -> Option<f64> {
        let end = self.offset.checked_add(NUMBER_SIZE)?;
        let slice = self.bytes.get(self.offset..end)?;
        let mut raw = [0u8; NUMBER_SIZE];
        raw.copy_from_slice(slice);
        self.offset = end;
        Some(f64::from_ne_bytes(raw))
    }

    fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        let slice = self.bytes.get(self.offset..end)?;
        self.offset = end;
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{CountingArena, SystemArena};
    use crate::kind::NativeResource;

    struct Dummy;

    impl NativeResource for Dummy {
        fn kind(&self) -> Kind {
            Kind::File
        }

        fn close(&mut self) {}
    }

    fn system_arena() -> Arc<dyn ArenaService> {
        Arc::new(SystemArena::new())
    }

    #[test]
    fn test_scalar_roundtrip_preserves_order_and_count() {
        let arena = system_arena();
        let mut values = vec![
            Value::Number(1.0),
            Value::from("two"),
            Value::Nil,
            Value::Bool(true),
        ];

        let buf = pack(&mut values, &arena).unwrap();
        assert_eq!(buf.element_count(), Some(4));

        let back = unpack(buf).unwrap();
        assert_eq!(back.len(), 4);
        assert_eq!(back, values);
        assert_eq!(back[1].type_name(), "string");
    }

    #[test]
    fn test_roundtrip_binary_safe_string() {
        let arena = system_arena();
        let mut values = vec![Value::Str(b"hello\x00world".to_vec())];

        let back = unpack(pack(&mut values, &arena).unwrap()).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_empty_tuple() {
        let arena = system_arena();
        let mut values = vec![];

        let buf = pack(&mut values, &arena).unwrap();
        assert_eq!(buf.element_count(), Some(0));
        assert_eq!(buf.size_bytes(), WORD);

        let back = unpack(buf).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_two_pass_size_matches_fill() {
        let arena = system_arena();
        let mut values = vec![
            Value::Nil,
            Value::Bool(false),
            Value::Number(3.14),
            Value::from("size check"),
        ];

        let expected = encoded_size(&values);
        let buf = pack(&mut values, &arena).unwrap();
        assert_eq!(buf.size_bytes(), expected);
    }

    #[test]
    fn test_object_reference_transfer() {
        let counting = Arc::new(CountingArena::new());
        let arena: Arc<dyn ArenaService> = counting.clone();

        let record = ObjectRecord::new(Box::new(Dummy));
        let mut values = vec![Value::Object(record)];

        let buf = pack(&mut values, &arena).unwrap();

        // One reference for the original stub, one transferred into the
        // buffer.
        if let Value::Object(record) = &values[0] {
            assert_eq!(record.refcount(), 2);
        } else {
            unreachable!();
        }

        let back = unpack(buf).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back, values);
        if let Value::Object(record) = &back[0] {
            // No second increment on unpack.
            assert_eq!(record.refcount(), 2);
        }

        drop(back);
        drop(values);
        assert_eq!(counting.live(), 0);
        assert_eq!(counting.deallocations(), 1);
    }

    #[test]
    fn test_unrecognized_tag_reports_recovered_count() {
        let mut bytes = Vec::new();
        write_word(&mut bytes, 2);
        bytes.push(TAG_TRUE);
        bytes.push(0xEE);

        let err = unpack(TupleBuf::from_bytes(bytes)).unwrap_err();
        match err {
            LomError::CorruptTuple { tag, decoded } => {
                assert_eq!(tag, 0xEE);
                assert_eq!(decoded, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_buffer_reports_recovered_count() {
        let mut bytes = Vec::new();
        write_word(&mut bytes, 3);
        bytes.push(TAG_NIL);
        bytes.push(TAG_NUMBER);
        bytes.extend_from_slice(&[0u8; 4]); // half a number payload

        let err = unpack(TupleBuf::from_bytes(bytes)).unwrap_err();
        assert!(err.is_decode_fatal());
        match err {
            LomError::TruncatedTuple { decoded } => assert_eq!(decoded, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_claiming_too_many_elements() {
        let mut bytes = Vec::new();
        write_word(&mut bytes, usize::MAX);

        let err = unpack(TupleBuf::from_bytes(bytes)).unwrap_err();
        assert!(matches!(err, LomError::TruncatedTuple { decoded: 0 }));
    }

    #[test]
    fn test_null_object_address_is_corrupt() {
        let mut bytes = Vec::new();
        write_word(&mut bytes, 1);
        bytes.push(TAG_OBJECT);
        write_word(&mut bytes, Kind::File.to_word());
        write_word(&mut bytes, 0);

        let err = unpack(TupleBuf::from_bytes(bytes)).unwrap_err();
        assert!(matches!(err, LomError::CorruptTuple { .. }));
    }

    quickcheck::quickcheck! {
        fn prop_scalar_roundtrip(numbers: Vec<f64>, words: Vec<String>, flags: Vec<bool>) -> bool {
            let arena: Arc<dyn ArenaService> = Arc::new(SystemArena::new());

            let mut values: Vec<Value> = Vec::new();
            for number in &numbers {
                if number.is_nan() {
                    continue;
                }
                values.push(Value::Number(*number));
            }
            for word in &words {
                values.push(Value::Str(word.clone().into_bytes()));
            }
            for flag in &flags {
                values.push(Value::Bool(*flag));
                values.push(Value::Nil);
            }

            let buf = match pack(&mut values, &arena) {
                Ok(buf) => buf,
                Err(_) => return false,
            };
            match unpack(buf) {
                Ok(back) => back == values,
                Err(_) => false,
            }
        }
    }
}
