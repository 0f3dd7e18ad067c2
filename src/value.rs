//! Attribute values and their wire encoding.
//!
//! An [`AttributeValue`] is what the diff compiler works on. It is built from
//! the JSON attribute model (plan and state) or from the wire values of a
//! configuration object returned by the server.
//!
//! In the JSON model a missing key on a computed attribute means the value is
//! not known yet, while an explicit `null` means the attribute is absent.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType};

/// The wire identifier of a configuration property (kebab-case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeName(String);

impl AttributeName {
    /// Wrap a wire name as-is.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the wire name from a snake_case local name.
    pub fn from_local_name(local_name: &str) -> Self {
        Self(local_name.replace('_', "-"))
    }

    /// The wire name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The kind of a present attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// A string.
    String,
    /// A boolean.
    Bool,
    /// A 64-bit integer.
    Int,
    /// An unordered set of strings.
    StringSet,
}

impl From<AttributeType> for AttributeKind {
    fn from(attr_type: AttributeType) -> Self {
        match attr_type {
            AttributeType::String => Self::String,
            AttributeType::Bool => Self::Bool,
            AttributeType::Int64 => Self::Int,
            AttributeType::StringSet => Self::StringSet,
        }
    }
}

/// A value that is known and present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Known {
    /// A string.
    String(String),
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int(i64),
    /// Set members. Order and duplicates carry no meaning.
    StringSet(Vec<String>),
}

impl Known {
    /// The kind of this value.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::String(_) => AttributeKind::String,
            Self::Bool(_) => AttributeKind::Bool,
            Self::Int(_) => AttributeKind::Int,
            Self::StringSet(_) => AttributeKind::StringSet,
        }
    }

    /// The string content, for string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Encode as wire values. Set members come out sorted and deduplicated.
    pub fn wire_values(&self) -> Vec<String> {
        match self {
            Self::String(s) => vec![s.clone()],
            Self::Bool(b) => vec![b.to_string()],
            Self::Int(i) => vec![i.to_string()],
            Self::StringSet(members) => members
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

/// A plan or state value for a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Explicitly absent.
    Null,
    /// To be determined by the server; never diffed.
    Unknown,
    /// A known value.
    Present(Known),
}

impl AttributeValue {
    /// A present string.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Present(Known::String(value.into()))
    }

    /// A present boolean.
    pub fn bool(value: bool) -> Self {
        Self::Present(Known::Bool(value))
    }

    /// A present integer.
    pub fn int(value: i64) -> Self {
        Self::Present(Known::Int(value))
    }

    /// A present string set.
    pub fn string_set<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Present(Known::StringSet(
            members.into_iter().map(Into::into).collect(),
        ))
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The present value, if any.
    pub fn known(&self) -> Option<&Known> {
        match self {
            Self::Present(known) => Some(known),
            _ => None,
        }
    }

    /// Encode as wire values. `None` for unknown, empty for null.
    pub fn to_wire(&self) -> Option<Vec<String>> {
        match self {
            Self::Unknown => None,
            Self::Null => Some(Vec::new()),
            Self::Present(known) => Some(known.wire_values()),
        }
    }

    /// Build from the JSON attribute model.
    ///
    /// A missing key is unknown for computed attributes and null otherwise.
    pub fn from_json(
        name: &str,
        attribute: &Attribute,
        value: Option<&Value>,
    ) -> Result<Self, ProviderError> {
        let value = match value {
            None if attribute.flags.computed => return Ok(Self::Unknown),
            None | Some(Value::Null) => return Ok(Self::Null),
            Some(value) => value,
        };

        let known = match (attribute.attr_type, value) {
            (AttributeType::String, Value::String(s)) => Known::String(s.clone()),
            (AttributeType::Bool, Value::Bool(b)) => Known::Bool(*b),
            (AttributeType::Int64, Value::Number(n)) => match n.as_i64() {
                Some(i) => Known::Int(i),
                None => return Err(json_type_error(name, "int64", value)),
            },
            (AttributeType::StringSet, Value::Array(items)) => {
                let members = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        other => Err(json_type_error(name, "set of strings", other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Known::StringSet(members)
            }
            (attr_type, value) => {
                return Err(json_type_error(name, type_label(attr_type), value));
            }
        };
        Ok(Self::Present(known))
    }

    /// Encode for the JSON attribute model. `None` for unknown.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Unknown => None,
            Self::Null => Some(Value::Null),
            Self::Present(Known::String(s)) => Some(Value::String(s.clone())),
            Self::Present(Known::Bool(b)) => Some(Value::Bool(*b)),
            Self::Present(Known::Int(i)) => Some(Value::from(*i)),
            Self::Present(known @ Known::StringSet(_)) => Some(Value::Array(
                known.wire_values().into_iter().map(Value::String).collect(),
            )),
        }
    }

    /// Decode the wire values the server returned for an attribute.
    ///
    /// Missing scalars decode to null, or to `""` when the attribute treats
    /// an empty string as null. Missing sets decode to the empty set.
    pub fn from_wire(
        name: &str,
        attribute: &Attribute,
        values: Option<&[String]>,
    ) -> Result<Self, ProviderError> {
        let values = values.unwrap_or_default();

        if attribute.attr_type == AttributeType::StringSet {
            return Ok(Self::Present(Known::StringSet(
                values
                    .iter()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .cloned()
                    .collect(),
            )));
        }

        let raw = match values {
            [] if attribute.empty_is_null && attribute.attr_type == AttributeType::String => {
                return Ok(Self::string(""));
            }
            [] => return Ok(Self::Null),
            [single] => single.as_str(),
            _ => {
                return Err(ProviderError::Validation(format!(
                    "Attribute '{}' expects a single value, server returned {}",
                    name,
                    values.len()
                )));
            }
        };

        match attribute.attr_type {
            AttributeType::String => Ok(Self::string(raw)),
            AttributeType::Bool => parse_wire_bool(name, raw).map(Self::bool),
            AttributeType::Int64 => raw.parse::<i64>().map(Self::int).map_err(|_| {
                ProviderError::Validation(format!(
                    "Attribute '{}' expects an integer, server returned '{}'",
                    name, raw
                ))
            }),
            AttributeType::StringSet => unreachable!("sets are decoded above"),
        }
    }
}

/// Parse a boolean as the server encodes it.
pub fn parse_wire_bool(name: &str, raw: &str) -> Result<bool, ProviderError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ProviderError::Validation(format!(
            "Attribute '{}' expects a boolean, server returned '{}'",
            name, other
        ))),
    }
}

fn type_label(attr_type: AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::StringSet => "set of strings",
    }
}

fn json_type_error(name: &str, expected: &str, got: &Value) -> ProviderError {
    ProviderError::Validation(format!(
        "Invalid type for attribute '{}': expected {}, got {}",
        name, expected, got
    ))
}
