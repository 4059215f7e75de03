//! Tagged record envelopes and fixed-width primary keys.
//!
//! An envelope is `tag ++ 0x00 ++ payload`, where `tag` is the UTF-8 short
//! type name and `payload` is the canonical CBOR of the value. The tag lets
//! records of several types share one keyspace: decoding checks it before
//! touching the payload.

use crate::decoder::from_cbor;
use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Byte between the type tag and the payload.
pub const TAG_SEPARATOR: u8 = 0x00;

/// Width of an encoded primary key.
pub const KEY_LEN: usize = 8;

/// A type that can be stored inside an envelope.
///
/// `to_value` and `from_value` move between the typed value and its
/// [`Value`] payload. The tag defaults to the short type name, so two types
/// with the same name in different modules share a tag.
pub trait Tagged: Sized + 'static {
    /// The tag written in front of every encoded value of this type.
    fn type_tag() -> &'static str {
        short_type_name::<Self>()
    }

    /// Converts to the payload value.
    fn to_value(&self) -> Value;

    /// Rebuilds the typed value from its payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not have the expected shape.
    fn from_value(value: &Value) -> CodecResult<Self>;
}

/// Returns `T`'s type name without its module path or generic arguments.
///
/// The result is computed once per type and then served from a cache.
pub fn short_type_name<T: 'static>() -> &'static str {
    static CACHE: OnceLock<RwLock<HashMap<TypeId, &'static str>>> = OnceLock::new();

    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let id = TypeId::of::<T>();
    if let Some(name) = cache.read().get(&id) {
        return *name;
    }

    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    // Bounded by the number of distinct tagged types in the program.
    let name: &'static str = Box::leak(short.to_owned().into_boxed_str());
    *cache.write().entry(id).or_insert(name)
}

/// Encodes a primary key as 8 big-endian bytes.
///
/// Byte order equals numeric order, so a forward scan visits ids in
/// ascending order.
#[must_use]
pub fn encode_key(id: u64) -> [u8; KEY_LEN] {
    id.to_be_bytes()
}

/// Decodes an 8-byte big-endian primary key.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] unless `bytes` is exactly 8 bytes.
pub fn decode_key(bytes: &[u8]) -> CodecResult<u64> {
    let array: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|_| CodecError::InvalidKey { len: bytes.len() })?;
    Ok(u64::from_be_bytes(array))
}

/// Encodes `value` into a tagged envelope.
///
/// # Errors
///
/// Returns an error if the payload cannot be encoded (for example a NaN
/// float field).
pub fn encode<T: Tagged>(value: &T) -> CodecResult<Vec<u8>> {
    let tag = T::type_tag().as_bytes();
    let payload = to_canonical_cbor(&value.to_value())?;

    let mut out = Vec::with_capacity(tag.len() + 1 + payload.len());
    out.extend_from_slice(tag);
    out.push(TAG_SEPARATOR);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes an envelope as `T`, returning `None` if it holds anything else.
///
/// This is the lenient form used by scans over a shared keyspace: a
/// foreign tag or an unreadable payload is simply skipped.
#[must_use]
pub fn decode<T: Tagged>(bytes: &[u8]) -> Option<T> {
    try_decode(bytes).ok()
}

/// Decodes an envelope as `T`.
///
/// # Errors
///
/// Returns [`CodecError::TypeMismatch`] if the envelope is not tagged
/// with `T`'s tag, or a decoding error if the payload is malformed.
pub fn try_decode<T: Tagged>(bytes: &[u8]) -> CodecResult<T> {
    let payload = strip_tag(bytes, T::type_tag()).ok_or_else(|| {
        CodecError::type_mismatch(T::type_tag(), peek_tag(bytes).unwrap_or("<untagged>"))
    })?;
    T::from_value(&from_cbor(payload)?)
}

/// Deep-copies `value` by passing it through its own envelope.
///
/// # Errors
///
/// Returns an error if the value cannot be encoded.
pub fn clone_value<T: Tagged>(value: &T) -> CodecResult<T> {
    try_decode(&encode(value)?)
}

/// Returns the tag recorded at the front of an envelope.
#[must_use]
pub fn peek_tag(bytes: &[u8]) -> Option<&str> {
    let end = bytes.iter().position(|b| *b == TAG_SEPARATOR)?;
    std::str::from_utf8(&bytes[..end]).ok()
}

fn strip_tag<'a>(bytes: &'a [u8], tag: &str) -> Option<&'a [u8]> {
    let rest = bytes.strip_prefix(tag.as_bytes())?;
    rest.strip_prefix(&[TAG_SEPARATOR])
}

fn shape_error(expected: &str, found: &Value) -> CodecError {
    CodecError::decoding_failed(format!("expected {expected}, found {found:?}"))
}

impl Tagged for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_text()
            .map(str::to_owned)
            .ok_or_else(|| shape_error("text", value))
    }
}

impl Tagged for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value.as_integer().ok_or_else(|| shape_error("integer", value))
    }
}

/// Stored as the bit-identical `i64`, so every `u64` survives a round trip.
impl Tagged for u64 {
    #[allow(clippy::cast_possible_wrap)]
    fn to_value(&self) -> Value {
        Value::Integer(*self as i64)
    }

    #[allow(clippy::cast_sign_loss)]
    fn from_value(value: &Value) -> CodecResult<Self> {
        value
            .as_integer()
            .map(|n| n as u64)
            .ok_or_else(|| shape_error("integer", value))
    }
}

impl Tagged for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value.as_float().ok_or_else(|| shape_error("float", value))
    }
}

impl Tagged for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        value.as_bool().ok_or_else(|| shape_error("bool", value))
    }
}
