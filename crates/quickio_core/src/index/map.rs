//! Index triples and per-record index maps.

use quickio_codec::{CodecError, CodecResult, Tagged, Value};
use std::collections::BTreeMap;

/// Builds the index triple `[Type,field,value]`.
pub(crate) fn triple_key(type_name: &str, field: &str, value: &Value) -> String {
    format!("[{type_name},{field},{value}]")
}

/// The triple each indexed field of one record currently holds.
///
/// Stored in the index store under the record's 8-byte id, so a later save
/// can find and retract triples whose value changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct IndexMap {
    bindings: BTreeMap<String, String>,
}

impl IndexMap {
    pub(crate) fn get(&self, field: &str) -> Option<&str> {
        self.bindings.get(field).map(String::as_str)
    }

    pub(crate) fn insert(&mut self, field: &str, triple: String) {
        self.bindings.insert(field.to_owned(), triple);
    }

    pub(crate) fn remove(&mut self, field: &str) -> Option<String> {
        self.bindings.remove(field)
    }

    pub(crate) fn triples(&self) -> impl Iterator<Item = &str> {
        self.bindings.values().map(String::as_str)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Tagged for IndexMap {
    fn type_tag() -> &'static str {
        "IndexMap"
    }

    fn to_value(&self) -> Value {
        Value::map(
            self.bindings
                .iter()
                .map(|(field, triple)| (Value::from(field.as_str()), Value::from(triple.as_str())))
                .collect(),
        )
    }

    fn from_value(value: &Value) -> CodecResult<Self> {
        let pairs = value
            .as_map()
            .ok_or_else(|| CodecError::decoding_failed("index map is not a map"))?;
        let mut bindings = BTreeMap::new();
        for (field, triple) in pairs {
            match (field.as_text(), triple.as_text()) {
                (Some(field), Some(triple)) => {
                    bindings.insert(field.to_owned(), triple.to_owned());
                }
                _ => return Err(CodecError::decoding_failed("index map entry is not text")),
            }
        }
        Ok(Self { bindings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickio_codec::{decode, encode};

    #[test]
    fn triple_format() {
        assert_eq!(
            triple_key("Book", "isbn", &Value::from("978-0")),
            "[Book,isbn,978-0]"
        );
        assert_eq!(
            triple_key("Student", "number", &Value::Integer(7)),
            "[Student,number,7]"
        );
    }

    #[test]
    fn map_survives_envelope() {
        let mut map = IndexMap::default();
        map.insert("isbn", "[Book,isbn,1]".into());
        map.insert("code", "[Book,code,x]".into());

        let back: IndexMap = decode(&encode(&map).unwrap()).unwrap();
        assert_eq!(back, map);
        assert_eq!(back.get("isbn"), Some("[Book,isbn,1]"));
    }

    #[test]
    fn remove_binding() {
        let mut map = IndexMap::default();
        map.insert("isbn", "t".into());
        assert_eq!(map.remove("isbn").as_deref(), Some("t"));
        assert!(map.is_empty());
        assert_eq!(map.triples().count(), 0);
    }
}
