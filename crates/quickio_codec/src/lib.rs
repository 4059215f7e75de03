//! # QuickIO Codec
//!
//! Binary encoding for QuickIO records and keys.
//!
//! Two layers live here:
//!
//! - a canonical CBOR model ([`Value`], [`to_canonical_cbor`],
//!   [`from_cbor`]) producing identical bytes for identical values
//! - the tagged envelope ([`encode`], [`decode`], [`try_decode`]) that
//!   prefixes each payload with its type name so that a scan over mixed
//!   records never decodes one type's bytes into another's shape
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise)
//! - Integers use shortest encoding
//! - Floats are always 64-bit, and NaN is rejected
//! - Strings must be UTF-8
//! - No indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use quickio_codec::{decode, encode, decode_key, encode_key};
//!
//! let bytes = encode(&"Dune".to_string()).unwrap();
//! assert_eq!(decode::<String>(&bytes).as_deref(), Some("Dune"));
//! assert_eq!(decode::<i64>(&bytes), None);
//!
//! assert_eq!(decode_key(&encode_key(42)).unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod envelope;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use envelope::{
    clone_value, decode, decode_key, encode, encode_key, peek_tag, short_type_name, try_decode,
    Tagged, KEY_LEN, TAG_SEPARATOR,
};
pub use error::{CodecError, CodecResult};
pub use value::Value;
