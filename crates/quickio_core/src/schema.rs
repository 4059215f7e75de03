//! Field descriptors and the [`Entity`] trait.
//!
//! Each record type carries a [`Schema`] built once on first use. It lists
//! the system fields followed by the declared fields, with their kind and
//! index flag, and is what the index maintainer, the update merge and the
//! sort/aggregate paths consult instead of inspecting values at runtime.
//! Types normally get all of this from the [`entity!`](crate::entity)
//! macro.

use crate::error::{CoreError, CoreResult};
use quickio_codec::{CodecError, CodecResult, Tagged, Value};
use std::cmp::Ordering;

/// Name of the primary identifier field.
pub const OBJECT_ID: &str = "object_id";

/// Name of the creation timestamp field.
pub const CREATED_AT: &str = "created_at";

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `i8`
    Int8,
    /// `i16`
    Int16,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `u8`
    UInt8,
    /// `u16`
    UInt16,
    /// `u32`
    UInt32,
    /// `u64`
    UInt64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `bool`
    Bool,
    /// `String`
    Text,
    /// `Vec<T>`
    Array,
    /// Nested map.
    Map,
    /// Anything else.
    Other,
}

impl FieldKind {
    /// Returns true for integer and floating-point kinds.
    ///
    /// Only numeric fields can be sorted on or aggregated.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
                | Self::Float32
                | Self::Float64
        )
    }

    /// Reads `value` as a number of this kind.
    ///
    /// Integers stay exact. A `UInt64` field is stored bit-cast into an
    /// `i64` and is read back as unsigned here. Returns `None` for null
    /// and non-numeric values.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn number(self, value: &Value) -> Option<Number> {
        match (self, value) {
            (Self::UInt64, Value::Integer(n)) => Some(Number::UInt(*n as u64)),
            (_, Value::Integer(n)) => Some(Number::Int(*n)),
            (_, Value::Float(x)) => Some(Number::Float(*x)),
            _ => None,
        }
    }
}

/// A numeric field value, ordered exactly within its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed integer kinds.
    Int(i64),
    /// `u64` fields, including the system fields.
    UInt(u64),
    /// Floating-point kinds.
    Float(f64),
}

impl Number {
    /// Total order over numbers. Integers compare without going through
    /// `f64`; floats use [`f64::total_cmp`].
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(&b),
            (Self::UInt(a), Self::UInt(b)) => a.cmp(&b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(&b),
            (Self::Int(a), Self::UInt(b)) => i128::from(a).cmp(&i128::from(b)),
            (Self::UInt(a), Self::Int(b)) => i128::from(a).cmp(&i128::from(b)),
            (a, b) => a.to_f64().total_cmp(&b.to_f64()),
        }
    }

    /// The nearest `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::UInt(n) => n as f64,
            Self::Float(x) => x,
        }
    }

    /// Sums `numbers`, adding integers exactly and rounding once at the end.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sum(numbers: &[Self]) -> f64 {
        let mut integers: i128 = 0;
        let mut floats = 0.0;
        for number in numbers {
            match *number {
                Self::Int(n) => integers += i128::from(n),
                Self::UInt(n) => integers += i128::from(n),
                Self::Float(x) => floats += x,
            }
        }
        integers as f64 + floats
    }
}

/// One field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: &'static str,
    /// Declared kind.
    pub kind: FieldKind,
    /// True for `Option<_>` fields.
    pub nullable: bool,
    /// True if the field is maintained in the unique index.
    pub indexed: bool,
}

impl FieldDef {
    /// Returns true for `object_id` and `created_at`.
    #[must_use]
    pub fn is_system(&self) -> bool {
        is_system_field(self.name)
    }
}

/// Returns true if `name` is one of the system fields.
#[must_use]
pub fn is_system_field(name: &str) -> bool {
    name == OBJECT_ID || name == CREATED_AT
}

/// Field table of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    type_name: &'static str,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Builds a schema from the declared fields.
    ///
    /// `object_id` and `created_at` are prepended; they are never indexed.
    #[must_use]
    pub fn new(type_name: &'static str, declared: Vec<FieldDef>) -> Self {
        let system = [OBJECT_ID, CREATED_AT].map(|name| FieldDef {
            name,
            kind: FieldKind::UInt64,
            nullable: false,
            indexed: false,
        });
        let mut fields = Vec::with_capacity(declared.len() + system.len());
        fields.extend(system);
        fields.extend(declared);
        Self { type_name, fields }
    }

    /// The record type's short name, also its envelope tag.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// All fields, system fields first.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that `update` may overwrite.
    pub fn user_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_system())
    }

    /// Fields maintained in the unique index.
    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.indexed)
    }

    /// Returns true if at least one field is indexed.
    #[must_use]
    pub fn has_indexes(&self) -> bool {
        self.fields.iter().any(|f| f.indexed)
    }

    /// Resolves a field name, failing if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldNotFound`].
    pub fn require(&self, name: &str) -> CoreResult<&FieldDef> {
        self.field(name)
            .ok_or_else(|| CoreError::field_not_found(self.type_name, name))
    }

    /// Resolves a field usable for sorting and aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FieldNotFound`] or [`CoreError::FieldNotNumeric`].
    pub fn numeric(&self, name: &str) -> CoreResult<&FieldDef> {
        let def = self.require(name)?;
        if def.kind.is_numeric() {
            Ok(def)
        } else {
            Err(CoreError::not_numeric(self.type_name, name))
        }
    }

    /// Resolves a field usable for index lookups.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NonIndexedField`] if the field is unknown or
    /// not indexed.
    pub fn indexed(&self, name: &str) -> CoreResult<&FieldDef> {
        self.field(name)
            .filter(|f| f.indexed)
            .ok_or_else(|| CoreError::non_indexed(self.type_name, name))
    }
}

/// A Rust type usable as a record field.
pub trait FieldValue: Sized {
    /// Declared kind of the field.
    const KIND: FieldKind;

    /// True if the field may hold null.
    const NULLABLE: bool = false;

    /// Converts the field to a [`Value`].
    fn to_value(&self) -> Value;

    /// Converts back, or `None` if `value` has the wrong shape.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! small_int_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn from_value(value: &Value) -> Option<Self> {
                    value.as_integer().and_then(|n| <$ty>::try_from(n).ok())
                }
            }
        )*
    };
}

small_int_field!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
);

/// Stored bit-for-bit as an `i64`.
impl FieldValue for u64 {
    const KIND: FieldKind = FieldKind::UInt64;

    #[allow(clippy::cast_possible_wrap)]
    fn to_value(&self) -> Value {
        Value::Integer(*self as i64)
    }

    #[allow(clippy::cast_sign_loss)]
    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer().map(|n| n as u64)
    }
}

impl FieldValue for f32 {
    const KIND: FieldKind = FieldKind::Float32;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float().map(|x| x as f32)
    }
}

impl FieldValue for f64 {
    const KIND: FieldKind = FieldKind::Float64;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_owned)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    const KIND: FieldKind = FieldKind::Array;

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_array()?.iter().map(T::from_value).collect()
    }
}

/// A record type stored in a collection.
///
/// Use the [`entity!`](crate::entity) macro rather than implementing this
/// by hand.
pub trait Entity: Tagged + Send + Sync {
    /// The type's field table.
    fn schema() -> &'static Schema;

    /// Primary identifier, zero until first saved.
    fn object_id(&self) -> u64;

    /// Creation time in Unix milliseconds, zero until first saved.
    fn created_at(&self) -> u64;

    /// Sets both system fields.
    fn assign_identity(&mut self, object_id: u64, created_at: u64);

    /// Reads a field by name, system fields included.
    fn field(&self, name: &str) -> Option<Value>;

    /// Overwrites a declared field by name.
    ///
    /// # Errors
    ///
    /// Fails for unknown or system fields, or if `value` does not fit the
    /// field's type.
    fn set_field(&mut self, name: &str, value: &Value) -> CoreResult<()>;
}

/// Reads one field out of a record payload.
///
/// A missing key yields the type's default; a key holding the wrong shape
/// is an error.
#[doc(hidden)]
pub fn decode_field<T: FieldValue + Default>(
    record: &Value,
    type_name: &str,
    name: &str,
) -> CodecResult<T> {
    match record.get(name) {
        None => Ok(T::default()),
        Some(value) => T::from_value(value).ok_or_else(|| {
            CodecError::decoding_failed(format!(
                "field '{name}' of {type_name} cannot hold {value:?}"
            ))
        }),
    }
}
