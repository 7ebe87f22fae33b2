//! Conversion between raw payloads and JSON documents.
//!
//! Events are kept as untyped JSON objects because the handler contract is open-ended.
//! Responses can be any `Serialize` type, so serialization failures are possible and
//! must be surfaced rather than dropped.

use crate::error::{RuntimeError, RuntimeResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;

/// An opaque JSON object with string keys, used for events and responses.
pub type Document = Map<String, Value>;

/// Parses a JSON object out of raw bytes or text.
/// Empty or whitespace-only input parses to an empty document.
pub fn parse(input: impl AsRef<[u8]>) -> RuntimeResult<Document> {
    let input = input.as_ref();

    if input.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }

    match serde_json::from_slice::<Value>(input) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(RuntimeError::MalformedDocument(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(RuntimeError::MalformedDocument(e.to_string())),
    }
}

/// Serializes a response into the bytes of a JSON object.
///
/// serde_json writes NaN and infinities as `null`, so floats are checked in a separate pass
/// first. Anything other than an object at the top level is rejected as well.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> RuntimeResult<Vec<u8>> {
    value
        .serialize(finite::FiniteCheck)
        .map_err(|e| RuntimeError::UnserializableResponse(e.to_string()))?;

    let bytes = serde_json::to_vec(value).map_err(|e| RuntimeError::UnserializableResponse(e.to_string()))?;

    // the compact writer starts objects with `{` and nothing else does
    if bytes.first() != Some(&b'{') {
        let kind = serde_json::from_slice::<Value>(&bytes)
            .map(|v| json_kind(&v))
            .unwrap_or("unknown JSON");
        return Err(RuntimeError::UnserializableResponse(format!(
            "expected a JSON object, found {kind}"
        )));
    }

    Ok(bytes)
}

/// Wraps an error description into `{"error": "..."}`.
pub fn error_document(error: &dyn Display) -> Document {
    let mut document = Document::new();
    document.insert("error".to_owned(), Value::String(error.to_string()));
    document
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A serializer that writes nothing and fails on floats JSON cannot represent.
mod finite {
    use serde::ser::{self, Serialize, Serializer};
    use std::fmt::Display;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("{0}")]
    pub(super) struct NonFinite(String);

    impl ser::Error for NonFinite {
        fn custom<T: Display>(msg: T) -> Self {
            Self(msg.to_string())
        }
    }

    #[derive(Clone, Copy)]
    pub(super) struct FiniteCheck;

    type CheckResult = Result<(), NonFinite>;

    macro_rules! accept {
        ($($method:ident: $ty:ty),* $(,)?) => {
            $(fn $method(self, _v: $ty) -> CheckResult {
                Ok(())
            })*
        };
    }

    fn check_float(v: f64) -> CheckResult {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite(format!("{v} has no JSON representation")))
        }
    }

    impl Serializer for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;
        type SerializeSeq = Self;
        type SerializeTuple = Self;
        type SerializeTupleStruct = Self;
        type SerializeTupleVariant = Self;
        type SerializeMap = Self;
        type SerializeStruct = Self;
        type SerializeStructVariant = Self;

        accept! {
            serialize_bool: bool,
            serialize_i8: i8,
            serialize_i16: i16,
            serialize_i32: i32,
            serialize_i64: i64,
            serialize_i128: i128,
            serialize_u8: u8,
            serialize_u16: u16,
            serialize_u32: u32,
            serialize_u64: u64,
            serialize_u128: u128,
            serialize_char: char,
            serialize_str: &str,
            serialize_bytes: &[u8],
            serialize_unit_struct: &'static str,
        }

        fn serialize_f32(self, v: f32) -> CheckResult {
            check_float(f64::from(v))
        }

        fn serialize_f64(self, v: f64) -> CheckResult {
            check_float(v)
        }

        fn serialize_none(self) -> CheckResult {
            Ok(())
        }

        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> CheckResult {
            value.serialize(self)
        }

        fn serialize_unit(self) -> CheckResult {
            Ok(())
        }

        fn serialize_unit_variant(self, _name: &'static str, _index: u32, _variant: &'static str) -> CheckResult {
            Ok(())
        }

        fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> CheckResult {
            value.serialize(self)
        }

        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            value: &T,
        ) -> CheckResult {
            value.serialize(self)
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }
    }

    impl ser::SerializeSeq for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }

    impl ser::SerializeTuple for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }

    impl ser::SerializeTupleStruct for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }

    impl ser::SerializeTupleVariant for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }

    impl ser::SerializeMap for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> CheckResult {
            key.serialize(FiniteCheck)
        }

        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }

    impl ser::SerializeStruct for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }

    impl ser::SerializeStructVariant for FiniteCheck {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> CheckResult {
            value.serialize(FiniteCheck)
        }

        fn end(self) -> CheckResult {
            Ok(())
        }
    }
}
