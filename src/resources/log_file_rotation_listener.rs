//! Log file rotation listeners.
//!
//! A listener is one of three variants, told apart by the schema URN the
//! server tags the object with. Each variant carries its own properties, so
//! the object decodes into [`RotationListenerKind`] with one decode path per
//! variant.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::client::{schema_urn, ConfigObject};
use crate::error::ProviderError;
use crate::resource::{base_schema, ConfigResource, ID_ATTRIBUTE};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::validate;
use crate::value::parse_wire_bool;

const OBJECT_TYPE: &str = "log-file-rotation-listener";

/// Local name of the discriminant attribute.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Attributes that belong to exactly one variant.
const VARIANT_ATTRIBUTES: &[&str] = &[
    "output_directory",
    "copy_to_directory",
    "compress_on_copy",
    "extension_class",
    "extension_argument",
];

/// The listener variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationListenerType {
    /// Writes a summary of each rotated log file.
    Summarize,
    /// Copies each rotated log file to another directory.
    Copy,
    /// Runs a custom extension class.
    ThirdParty,
}

impl RotationListenerType {
    /// All variants.
    pub const ALL: [RotationListenerType; 3] = [Self::Summarize, Self::Copy, Self::ThirdParty];

    /// Discriminant as used in the `type` attribute and schema URN.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Copy => "copy",
            Self::ThirdParty => "third-party",
        }
    }

    /// Variant attributes this type accepts.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Summarize => &["output_directory"],
            Self::Copy => &["copy_to_directory", "compress_on_copy"],
            Self::ThirdParty => &["extension_class", "extension_argument"],
        }
    }

    /// Variant attributes this type requires.
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Summarize => &[],
            Self::Copy => &["copy_to_directory"],
            Self::ThirdParty => &["extension_class"],
        }
    }
}

impl fmt::Display for RotationListenerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationListenerType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                ProviderError::Validation(format!(
                    "Unknown log file rotation listener type '{}'",
                    s
                ))
            })
    }
}

/// Variant-specific properties of a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RotationListenerKind {
    /// `summarize`
    Summarize {
        /// Where summaries are written; server default when absent.
        output_directory: Option<String>,
    },
    /// `copy`
    Copy {
        /// Destination of the copies.
        copy_to_directory: String,
        /// Whether copies are compressed.
        compress_on_copy: Option<bool>,
    },
    /// `third-party`
    ThirdParty {
        /// Fully qualified extension class.
        extension_class: String,
        /// `name=value` arguments for the extension, sorted.
        extension_argument: Vec<String>,
    },
}

impl RotationListenerKind {
    /// The variant discriminant.
    pub fn listener_type(&self) -> RotationListenerType {
        match self {
            Self::Summarize { .. } => RotationListenerType::Summarize,
            Self::Copy { .. } => RotationListenerType::Copy,
            Self::ThirdParty { .. } => RotationListenerType::ThirdParty,
        }
    }
}

/// A decoded log file rotation listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFileRotationListener {
    /// Object name.
    pub name: String,
    /// Description; empty when unset.
    pub description: String,
    /// Whether the listener is enabled.
    pub enabled: bool,
    /// Variant-specific properties.
    #[serde(flatten)]
    pub kind: RotationListenerKind,
}

impl LogFileRotationListener {
    /// Decode a server object, dispatching on its schema URN.
    pub fn from_object(object: &ConfigObject) -> Result<Self, ProviderError> {
        let discriminant = object.type_discriminant(OBJECT_TYPE).ok_or_else(|| {
            ProviderError::Validation(format!(
                "Object '{}' carries no {} schema",
                object.id, OBJECT_TYPE
            ))
        })?;

        let kind = match discriminant.parse::<RotationListenerType>()? {
            RotationListenerType::Summarize => RotationListenerKind::Summarize {
                output_directory: object.single_value("output-directory")?.map(str::to_string),
            },
            RotationListenerType::Copy => RotationListenerKind::Copy {
                copy_to_directory: required_value(object, "copy-to-directory")?.to_string(),
                compress_on_copy: object
                    .single_value("compress-on-copy")?
                    .map(|raw| parse_wire_bool("compress-on-copy", raw))
                    .transpose()?,
            },
            RotationListenerType::ThirdParty => {
                let mut extension_argument = object.values("extension-argument").to_vec();
                extension_argument.sort();
                extension_argument.dedup();
                RotationListenerKind::ThirdParty {
                    extension_class: required_value(object, "extension-class")?.to_string(),
                    extension_argument,
                }
            }
        };

        Ok(Self {
            name: object.id.clone(),
            description: object
                .single_value("description")?
                .unwrap_or_default()
                .to_string(),
            enabled: parse_wire_bool("enabled", required_value(object, "enabled")?)?,
            kind,
        })
    }

    /// Encode as an attribute model for `schema`.
    ///
    /// Attributes of other variants come out as `null`.
    pub fn to_model(&self, schema: &Schema) -> Result<Value, ProviderError> {
        let Value::Object(mut model) = serde_json::to_value(self)? else {
            return Err(ProviderError::Sdk(
                "Listener did not encode as an object".to_string(),
            ));
        };
        model.insert(ID_ATTRIBUTE.to_string(), Value::String(self.name.clone()));
        for local in schema.attributes.keys() {
            model.entry(local.clone()).or_insert(Value::Null);
        }
        Ok(Value::Object(model))
    }
}

fn required_value<'a>(object: &'a ConfigObject, name: &str) -> Result<&'a str, ProviderError> {
    object.single_value(name)?.ok_or_else(|| {
        ProviderError::Validation(format!(
            "Object '{}' is missing required property '{}'",
            object.id, name
        ))
    })
}

fn listener_type(model: &Value) -> Result<RotationListenerType, ProviderError> {
    model
        .get(TYPE_ATTRIBUTE)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation("Missing listener type".to_string()))?
        .parse()
}

/// `dsconfig_log_file_rotation_listener`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFileRotationListenerResource;

impl ConfigResource for LogFileRotationListenerResource {
    fn type_name(&self) -> &'static str {
        "dsconfig_log_file_rotation_listener"
    }

    fn collection(&self) -> &'static str {
        "log-file-rotation-listeners"
    }

    fn schema(&self) -> Schema {
        base_schema()
            .with_description("Manages a log file rotation listener")
            .with_attribute(
                TYPE_ATTRIBUTE,
                Attribute::required_string()
                    .local_only()
                    .with_force_new()
                    .with_description("One of summarize, copy or third-party"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().empty_is_null(),
            )
            .with_attribute("enabled", Attribute::required_bool())
            .with_attribute(
                "output_directory",
                Attribute::optional_string()
                    .with_description("summarize: directory the summaries are written to"),
            )
            .with_attribute(
                "copy_to_directory",
                Attribute::optional_string()
                    .with_description("copy: directory rotated files are copied to"),
            )
            .with_attribute(
                "compress_on_copy",
                Attribute::optional_computed_bool()
                    .with_description("copy: whether copied files are compressed"),
            )
            .with_attribute(
                "extension_class",
                Attribute::optional_string()
                    .with_description("third-party: class implementing the listener"),
            )
            .with_attribute(
                "extension_argument",
                Attribute::optional_string_set()
                    .with_description("third-party: arguments passed to the extension"),
            )
    }

    fn object_schemas(&self, model: &Value) -> Result<Vec<String>, ProviderError> {
        let listener_type = listener_type(model)?;
        Ok(vec![schema_urn(OBJECT_TYPE, Some(listener_type.as_str()))])
    }

    fn validate_model(&self, model: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&self.schema(), model);
        let Some(raw) = model.get(TYPE_ATTRIBUTE).and_then(Value::as_str) else {
            return diagnostics;
        };
        let listener_type = match raw.parse::<RotationListenerType>() {
            Ok(t) => t,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("Invalid listener type")
                        .with_detail(e.message())
                        .with_attribute(TYPE_ATTRIBUTE),
                );
                return diagnostics;
            }
        };

        let is_set = |name: &str| model.get(name).is_some_and(|v| !v.is_null());
        for &name in VARIANT_ATTRIBUTES {
            if is_set(name) && !listener_type.attributes().contains(&name) {
                diagnostics.push(
                    Diagnostic::error("Attribute not supported by listener type")
                        .with_detail(format!(
                            "'{}' cannot be set on a {} listener",
                            name, listener_type
                        ))
                        .with_attribute(name),
                );
            }
        }
        for &name in listener_type.required_attributes() {
            if !is_set(name) {
                diagnostics.push(
                    Diagnostic::error("Missing required attribute")
                        .with_detail(format!(
                            "'{}' is required for a {} listener",
                            name, listener_type
                        ))
                        .with_attribute(name),
                );
            }
        }
        diagnostics
    }

    fn read_model(&self, object: &ConfigObject) -> Result<Value, ProviderError> {
        LogFileRotationListener::from_object(object)?.to_model(&self.schema())
    }
}
