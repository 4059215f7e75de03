//! The `entity!` declaration macro.

/// Declares a record type.
///
/// The generated struct gains two public system fields, `object_id` and
/// `created_at`, both `u64` and filled in on first save. Declared fields
/// may be marked `#[indexed]` to keep them in the unique index. No other
/// field attributes are accepted.
///
/// Every field type must implement [`FieldValue`](crate::FieldValue) and
/// `Default`; fields absent from a stored record decode to their default.
///
/// ```rust
/// use quickio_core::{entity, Entity, Value};
///
/// entity! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Book {
///         #[indexed]
///         pub isbn: String,
///         pub title: String,
///         pub pages: Option<u32>,
///     }
/// }
///
/// let book = Book { title: "Dune".into(), ..Book::default() };
/// assert_eq!(book.field("title"), Some(Value::from("Dune")));
/// assert!(Book::schema().field("isbn").unwrap().indexed);
/// ```
#[macro_export]
macro_rules! entity {
    (@indexed indexed) => { true };
    (@indexed) => { false };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$marker:ident])? $fvis:vis $fname:ident : $fty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            /// Primary identifier, assigned on first save.
            pub object_id: u64,
            /// Creation time in Unix milliseconds, assigned on first save.
            pub created_at: u64,
            $( $fvis $fname: $fty, )*
        }

        impl $crate::Tagged for $name {
            fn type_tag() -> &'static str {
                stringify!($name)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::map(vec![
                    (
                        $crate::Value::from($crate::OBJECT_ID),
                        $crate::FieldValue::to_value(&self.object_id),
                    ),
                    (
                        $crate::Value::from($crate::CREATED_AT),
                        $crate::FieldValue::to_value(&self.created_at),
                    ),
                    $(
                        (
                            $crate::Value::from(stringify!($fname)),
                            $crate::FieldValue::to_value(&self.$fname),
                        ),
                    )*
                ])
            }

            fn from_value(value: &$crate::Value) -> $crate::CodecResult<Self> {
                Ok(Self {
                    object_id: $crate::decode_field(value, stringify!($name), $crate::OBJECT_ID)?,
                    created_at: $crate::decode_field(value, stringify!($name), $crate::CREATED_AT)?,
                    $(
                        $fname: $crate::decode_field(value, stringify!($name), stringify!($fname))?,
                    )*
                })
            }
        }

        impl $crate::Entity for $name {
            fn schema() -> &'static $crate::Schema {
                static SCHEMA: ::std::sync::OnceLock<$crate::Schema> = ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    $crate::Schema::new(
                        stringify!($name),
                        vec![
                            $(
                                $crate::FieldDef {
                                    name: stringify!($fname),
                                    kind: <$fty as $crate::FieldValue>::KIND,
                                    nullable: <$fty as $crate::FieldValue>::NULLABLE,
                                    indexed: $crate::entity!(@indexed $($marker)?),
                                },
                            )*
                        ],
                    )
                })
            }

            fn object_id(&self) -> u64 {
                self.object_id
            }

            fn created_at(&self) -> u64 {
                self.created_at
            }

            fn assign_identity(&mut self, object_id: u64, created_at: u64) {
                self.object_id = object_id;
                self.created_at = created_at;
            }

            fn field(&self, name: &str) -> Option<$crate::Value> {
                match name {
                    $crate::OBJECT_ID => Some($crate::FieldValue::to_value(&self.object_id)),
                    $crate::CREATED_AT => Some($crate::FieldValue::to_value(&self.created_at)),
                    $(
                        stringify!($fname) => Some($crate::FieldValue::to_value(&self.$fname)),
                    )*
                    _ => None,
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: &$crate::Value,
            ) -> $crate::CoreResult<()> {
                match name {
                    $crate::OBJECT_ID | $crate::CREATED_AT => Err($crate::CoreError::schema(
                        format!("system field '{name}' of {} is read-only", stringify!($name)),
                    )),
                    $(
                        stringify!($fname) => {
                            self.$fname = $crate::FieldValue::from_value(value).ok_or_else(|| {
                                $crate::CoreError::field_type(stringify!($name), name, value)
                            })?;
                            Ok(())
                        }
                    )*
                    _ => Err($crate::CoreError::field_not_found(stringify!($name), name)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{CoreError, Entity, FieldKind, Tagged, Value};

    entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Gadget {
            #[indexed]
            serial: String,
            weight: f64,
            rating: Option<i32>,
            tags: Vec<String>,
        }
    }

    entity! {
        #[derive(Debug, Default)]
        struct Empty {}
    }

    #[test]
    fn schema_reflects_declaration() {
        let schema = Gadget::schema();
        assert_eq!(schema.type_name(), "Gadget");

        let serial = schema.field("serial").unwrap();
        assert!(serial.indexed);
        assert_eq!(serial.kind, FieldKind::Text);

        let rating = schema.field("rating").unwrap();
        assert!(rating.nullable);
        assert!(!rating.indexed);
        assert_eq!(rating.kind, FieldKind::Int32);

        assert_eq!(schema.field("tags").unwrap().kind, FieldKind::Array);
        assert_eq!(schema.indexed_fields().count(), 1);
    }

    #[test]
    fn field_access_by_name() {
        let mut gadget = Gadget {
            serial: "G-1".into(),
            weight: 1.25,
            ..Gadget::default()
        };
        assert_eq!(gadget.field("serial"), Some(Value::from("G-1")));
        assert_eq!(gadget.field("rating"), Some(Value::Null));
        assert_eq!(gadget.field("object_id"), Some(Value::Integer(0)));
        assert_eq!(gadget.field("nope"), None);

        gadget.set_field("rating", &Value::Integer(4)).unwrap();
        assert_eq!(gadget.rating, Some(4));

        gadget.set_field("weight", &Value::Float(2.0)).unwrap();
        assert_eq!(gadget.weight, 2.0);
    }

    #[test]
    fn set_field_rejections() {
        let mut gadget = Gadget::default();
        assert!(matches!(
            gadget.set_field("object_id", &Value::Integer(1)),
            Err(CoreError::Schema { .. })
        ));
        assert!(matches!(
            gadget.set_field("weight", &Value::from("heavy")),
            Err(CoreError::Schema { .. })
        ));
        assert!(matches!(
            gadget.set_field("color", &Value::from("red")),
            Err(CoreError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn payload_roundtrip() {
        let mut gadget = Gadget {
            serial: "G-2".into(),
            weight: -0.5,
            rating: Some(3),
            tags: vec!["new".into()],
            ..Gadget::default()
        };
        gadget.assign_identity(123_456_789_012_345_678, 1_700_000_000_000);

        let value = gadget.to_value();
        assert_eq!(Gadget::from_value(&value).unwrap(), gadget);
        assert_eq!(Gadget::type_tag(), "Gadget");
    }

    #[test]
    fn missing_fields_decode_to_default() {
        let value = Value::map(vec![(Value::from("serial"), Value::from("G-3"))]);
        let gadget = Gadget::from_value(&value).unwrap();
        assert_eq!(gadget.serial, "G-3");
        assert_eq!(gadget.rating, None);
        assert_eq!(gadget.object_id, 0);
    }

    #[test]
    fn type_without_user_fields() {
        assert_eq!(Empty::schema().fields().len(), 2);
        assert!(!Empty::schema().has_indexes());
        let mut empty = Empty::default();
        assert!(empty.set_field("x", &Value::Null).is_err());
    }
}
