//! Normalizes arbitrary values into JSON for the call logs
//!
//! [`to_lake_value`] never fails. Containers are walked element by element and
//! every element is serialized on its own, so a leaf that cannot be encoded is
//! replaced by its string form while its siblings are kept:
//!
//! - non-finite floats become `"NaN"`, `"inf"` or `"-inf"`
//! - a `Serialize` impl that reports an error becomes the error message
//! - map keys that are not strings become their string (or compact JSON) form
//!
//! ```rust
//! use api_crawler_lake::to_lake_value;
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let mut by_id = BTreeMap::new();
//! by_id.insert(7, f64::NAN);
//!
//! assert_eq!(to_lake_value(&by_id), json!({"7": "NaN"}));
//! ```

use serde::ser::{self, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt::Display;
use thiserror::Error;

/// Serialize `value` into a JSON value, replacing unencodable leaves in place
pub fn to_lake_value<T>(value: &T) -> Value
where
    T: Serialize + ?Sized,
{
    match value.serialize(LakeSerializer) {
        Ok(value) => value,
        Err(err) => Value::String(err.to_string()),
    }
}

/// Records a value through its `Display` impl
///
/// For values with no `Serialize` impl, or whose structure is not worth
/// keeping in the log.
#[derive(Debug, Clone, Copy)]
pub struct Opaque<T>(pub T);

impl<T: Display> Serialize for Opaque<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// `#[serde(serialize_with = "display")]` helper for `Display`-only fields
pub fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// Failure reported by a value's own `Serialize` impl
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LeafError(String);

impl ser::Error for LeafError {
    fn custom<T: Display>(msg: T) -> Self {
        LeafError(msg.to_string())
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

/// String form of a map key
fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn tagged(variant: &str, value: Value) -> Value {
    let mut object = Map::new();
    object.insert(variant.to_string(), value);
    Value::Object(object)
}

#[derive(Debug, Clone, Copy)]
struct LakeSerializer;

impl Serializer for LakeSerializer {
    type Ok = Value;
    type Error = LeafError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, LeafError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, LeafError> {
        Ok(i64::try_from(v)
            .map(Value::from)
            .or_else(|_| u64::try_from(v).map(Value::from))
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, LeafError> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, LeafError> {
        Ok(u64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, LeafError> {
        Ok(float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, LeafError> {
        Ok(float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, LeafError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, LeafError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, LeafError> {
        Ok(Value::Array(v.iter().copied().map(Value::from).collect()))
    }

    fn serialize_none(self) -> Result<Value, LeafError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, LeafError> {
        Ok(to_lake_value(value))
    }

    fn serialize_unit(self) -> Result<Value, LeafError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, LeafError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, LeafError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, LeafError> {
        Ok(to_lake_value(value))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, LeafError> {
        Ok(tagged(variant, to_lake_value(value)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, LeafError> {
        Ok(SeqBuilder::new(None, len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, LeafError> {
        Ok(SeqBuilder::new(None, Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, LeafError> {
        Ok(SeqBuilder::new(None, Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, LeafError> {
        Ok(SeqBuilder::new(Some(variant), Some(len)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, LeafError> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder, LeafError> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder, LeafError> {
        Ok(MapBuilder::new(Some(variant)))
    }

    fn collect_str<T: Display + ?Sized>(self, value: &T) -> Result<Value, LeafError> {
        Ok(Value::String(value.to_string()))
    }
}

/// Builds arrays for sequences, tuples and tuple variants
struct SeqBuilder {
    variant: Option<&'static str>,
    items: Vec<Value>,
}

impl SeqBuilder {
    fn new(variant: Option<&'static str>, len: Option<usize>) -> Self {
        Self {
            variant,
            items: Vec::with_capacity(len.unwrap_or(0)),
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), LeafError> {
        self.items.push(to_lake_value(value));
        Ok(())
    }

    fn finish(self) -> Result<Value, LeafError> {
        let array = Value::Array(self.items);
        Ok(match self.variant {
            Some(variant) => tagged(variant, array),
            None => array,
        })
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), LeafError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), LeafError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), LeafError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), LeafError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

/// Builds objects for maps, structs and struct variants
struct MapBuilder {
    variant: Option<&'static str>,
    entries: Map<String, Value>,
    next_key: Option<String>,
}

impl MapBuilder {
    fn new(variant: Option<&'static str>) -> Self {
        Self {
            variant,
            entries: Map::new(),
            next_key: None,
        }
    }

    fn finish(self) -> Result<Value, LeafError> {
        let object = Value::Object(self.entries);
        Ok(match self.variant {
            Some(variant) => tagged(variant, object),
            None => object,
        })
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), LeafError> {
        self.next_key = Some(key_string(to_lake_value(key)));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), LeafError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| LeafError("map value serialized before its key".to_string()))?;
        self.entries.insert(key, to_lake_value(value));
        Ok(())
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), LeafError> {
        self.entries.insert(key.to_string(), to_lake_value(value));
        Ok(())
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = Value;
    type Error = LeafError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), LeafError> {
        self.entries.insert(key.to_string(), to_lake_value(value));
        Ok(())
    }

    fn end(self) -> Result<Value, LeafError> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Serialize;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    /// A value whose own `Serialize` impl always fails
    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("socket handles cannot be serialized"))
        }
    }

    #[derive(Serialize)]
    struct Mixed {
        ok: i32,
        broken: Unencodable,
    }

    #[derive(Serialize)]
    struct Listing {
        title: String,
        salary: f64,
        #[serde(serialize_with = "display")]
        posted: std::net::Ipv4Addr,
    }

    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Rect { w: u32, h: u32 },
        Pair(i32, i32),
    }

    #[test]
    fn test_json_native_values_are_unchanged() {
        let value = json!({
            "name": "repo",
            "stars": 42,
            "ratio": 0.5,
            "archived": false,
            "topics": ["rust", "cli"],
            "owner": {"login": "octocat", "id": null}
        });

        assert_eq!(to_lake_value(&value), value);
    }

    #[test]
    fn test_non_finite_floats_become_strings() {
        assert_eq!(to_lake_value(&f64::NAN), json!("NaN"));
        assert_eq!(to_lake_value(&f64::INFINITY), json!("inf"));
        assert_eq!(to_lake_value(&vec![1.0, f64::NEG_INFINITY]), json!([1.0, "-inf"]));
    }

    #[test]
    fn test_failing_leaf_is_replaced_in_place() {
        let value = to_lake_value(&Mixed {
            ok: 1,
            broken: Unencodable,
        });
        assert_eq!(
            value,
            json!({"ok": 1, "broken": "socket handles cannot be serialized"})
        );
    }

    #[test]
    fn test_failing_leaf_inside_tuple() {
        let value = to_lake_value(&(1, Unencodable, "x"));
        assert_eq!(value, json!([1, "socket handles cannot be serialized", "x"]));
    }

    #[test]
    fn test_failing_top_level_value_becomes_message() {
        assert_eq!(
            to_lake_value(&Unencodable),
            json!("socket handles cannot be serialized")
        );
    }

    #[test]
    fn test_non_string_keys_are_coerced() {
        let mut by_number = HashMap::new();
        by_number.insert(3u8, "three");
        assert_eq!(to_lake_value(&by_number), json!({"3": "three"}));

        let mut by_bool = BTreeMap::new();
        by_bool.insert(true, 1);
        assert_eq!(to_lake_value(&by_bool), json!({"true": 1}));

        let mut by_tuple = BTreeMap::new();
        by_tuple.insert((1, 2), "pair");
        assert_eq!(to_lake_value(&by_tuple), json!({"[1,2]": "pair"}));
    }

    #[test]
    fn test_display_helpers() {
        let listing = Listing {
            title: "Engineer".to_string(),
            salary: f64::NAN,
            posted: std::net::Ipv4Addr::LOCALHOST,
        };

        assert_eq!(
            to_lake_value(&listing),
            json!({"title": "Engineer", "salary": "NaN", "posted": "127.0.0.1"})
        );
        assert_eq!(
            to_lake_value(&Opaque(std::path::Path::new("/tmp/x").display())),
            json!("/tmp/x")
        );
    }

    #[test]
    fn test_enum_shapes_match_serde_json() {
        for shape in [
            Shape::Point,
            Shape::Circle(1.5),
            Shape::Rect { w: 2, h: 3 },
            Shape::Pair(-1, 1),
        ] {
            assert_eq!(to_lake_value(&shape), serde_json::to_value(&shape).unwrap());
        }
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(to_lake_value(&u128::from(u64::MAX)), json!(u64::MAX));
        assert_eq!(
            to_lake_value(&u128::MAX),
            json!("340282366920938463463374607431768211455")
        );
        assert_eq!(to_lake_value(&-5i128), json!(-5));
    }

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            (-1.0e9f64..1.0e9).prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_json_native_identity(value in json_value()) {
            prop_assert_eq!(to_lake_value(&value), value);
        }
    }
}
