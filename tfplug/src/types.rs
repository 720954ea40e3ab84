//! Core type system for tfplug
//!
//! This module provides the value types exchanged with Terraform: [`Dynamic`]
//! values, the [`State`]/[`Config`] objects built from them, and
//! [`Diagnostics`].

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name rmp-serde reserves for msgpack extension values
const MSGPACK_EXT_STRUCT_NAME: &str = "_ExtStruct";

/// Extension type Terraform uses to mark a value as not yet known
const UNKNOWN_EXT_TYPE: i8 = 0;

/// Dynamic represents Terraform values that can be of any type
/// This is the core type for all configuration and state data
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    /// String value
    String(String),
    /// List of values (ordered, allows duplicates)
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }
}

/// Payload of the unknown-value extension: a single zero byte
struct UnknownPayload;

impl Serialize for UnknownPayload {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&[0])
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_newtype_struct(
                MSGPACK_EXT_STRUCT_NAME,
                &(UNKNOWN_EXT_TYPE, UnknownPayload),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, IgnoredAny, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid Dynamic value")
            }

            fn visit_unit<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_none<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E>(self, value: bool) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::String(value))
            }

            // msgpack extension values arrive as a newtype struct; Terraform
            // only sends extension type 0, which marks an unknown value.
            fn visit_newtype_struct<D>(self, deserializer: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                IgnoredAny::deserialize(deserializer)?;
                Ok(Dynamic::Unknown)
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut hashmap = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    hashmap.insert(key, value);
                }
                Ok(Dynamic::Map(hashmap))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// An object value: resource state, data source state or configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub values: HashMap<String, Dynamic>,
}

/// Config represents configuration values
pub type Config = State;

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a known, non-null string attribute
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_string())
    }

    pub fn get(&self, key: &str) -> &Dynamic {
        self.values.get(key).unwrap_or(&Dynamic::Null)
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(key.into(), Dynamic::String(value.into()));
    }

    pub fn set(&mut self, key: impl Into<String>, value: Dynamic) {
        self.values.insert(key.into(), value);
    }

    /// Decodes a msgpack object; `None` means the object itself is null
    pub fn from_msgpack(data: &[u8]) -> Result<Option<Self>> {
        if data.is_empty() {
            return Ok(None);
        }

        let value: Dynamic = rmp_serde::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("msgpack decoding failed: {}", e)))?;
        Self::from_dynamic(value)
    }

    pub fn from_json(data: &[u8]) -> Result<Option<Self>> {
        if data.is_empty() {
            return Ok(None);
        }

        let value: Dynamic = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Self::from_dynamic(value)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(&self.values)
            .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))
    }

    fn from_dynamic(value: Dynamic) -> Result<Option<Self>> {
        match value {
            Dynamic::Null => Ok(None),
            Dynamic::Map(values) => Ok(Some(Self { values })),
            other => Err(TfplugError::DecodingError(format!(
                "expected an object, got {}",
                other.type_name()
            ))),
        }
    }
}

/// msgpack encoding of a null object
pub fn null_msgpack() -> Result<Vec<u8>> {
    rmp_serde::to_vec(&Dynamic::Null)
        .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub summary: String,
    pub detail: Option<String>,
    /// Top-level attribute the diagnostic refers to
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        self.errors.push(Diagnostic {
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: None,
        });
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        self.warnings.push(Diagnostic {
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: None,
        });
    }

    pub fn add_attribute_error(
        &mut self,
        attribute: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.errors.push(Diagnostic {
            summary: summary.into(),
            detail: Some(detail.into()),
            attribute: Some(attribute.into()),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_decodes_as_unknown() {
        // fixext1, type 0, payload 0: how Terraform encodes an unknown value
        let mut data = vec![0x81, 0xa2, b'i', b'd'];
        data.extend_from_slice(&[0xd4, 0x00, 0x00]);

        let state = State::from_msgpack(&data).unwrap().unwrap();
        assert!(state.get("id").is_unknown());
    }

    #[test]
    fn unknown_encodes_as_extension_zero() {
        let mut state = State::new();
        state.set("id", Dynamic::Unknown);

        let encoded = state.to_msgpack().unwrap();
        assert_eq!(&encoded[encoded.len() - 3..], &[0xd4, 0x00, 0x00]);
    }

    #[test]
    fn nil_decodes_as_null_object() {
        assert!(State::from_msgpack(&[0xc0]).unwrap().is_none());
        assert!(State::from_msgpack(&[]).unwrap().is_none());
        assert_eq!(null_msgpack().unwrap(), vec![0xc0]);
    }

    #[test]
    fn scalar_is_not_an_object() {
        let data = rmp_serde::to_vec(&Dynamic::String("x".to_string())).unwrap();
        let err = State::from_msgpack(&data).unwrap_err();
        assert!(err.to_string().contains("expected an object"));
    }

    #[test]
    fn json_state_decodes() {
        let state = State::from_json(br#"{"project":"demo","location":null}"#)
            .unwrap()
            .unwrap();
        assert_eq!(state.get_string("project"), Some("demo"));
        assert!(state.get("location").is_null());
        assert!(state.get("missing").is_null());
    }

    #[test]
    fn diagnostics_track_errors_and_warnings() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.add_warning("heads up", None::<String>);
        assert!(!diags.has_errors());

        let mut other = Diagnostics::new();
        other.add_attribute_error("project", "Missing required field: project", "required");
        diags.extend(other);

        assert!(diags.has_errors());
        assert_eq!(diags.errors[0].attribute.as_deref(), Some("project"));
        assert_eq!(diags.warnings.len(), 1);
    }
}
