//! FIFO entry caches.

use serde_json::Value;

use crate::client::{schema_urn, ConfigObject};
use crate::error::ProviderError;
use crate::resource::{base_schema, read_flat_model, ConfigResource};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::validate;

const OBJECT_TYPE: &str = "entry-cache";
const VARIANT: &str = "fifo";

/// `dsconfig_entry_cache`: an entry cache that evicts in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoEntryCache;

impl ConfigResource for FifoEntryCache {
    fn type_name(&self) -> &'static str {
        "dsconfig_entry_cache"
    }

    fn collection(&self) -> &'static str {
        "entry-caches"
    }

    fn schema(&self) -> Schema {
        base_schema()
            .with_description("Manages a FIFO entry cache")
            .with_attribute(
                "description",
                Attribute::optional_string().empty_is_null(),
            )
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Whether the cache is enabled"),
            )
            .with_attribute(
                "cache_level",
                Attribute::required_int64()
                    .with_description("Order in which caches are consulted; lower goes first"),
            )
            .with_attribute("max_entries", Attribute::optional_computed_int64())
            .with_attribute(
                "max_memory_percent",
                Attribute::optional_computed_int64()
                    .with_description("Share of the JVM heap the cache may use"),
            )
            .with_attribute(
                "include_filter",
                Attribute::optional_computed_string_set()
                    .with_description("Only entries matching one of these filters are cached"),
            )
            .with_attribute(
                "exclude_filter",
                Attribute::optional_computed_string_set()
                    .with_description("Entries matching one of these filters are never cached"),
            )
            .with_attribute(
                "only_cache_frequently_accessed",
                Attribute::optional_computed_bool(),
            )
            .with_attribute("java_class", Attribute::computed_string())
    }

    fn object_schemas(&self, _model: &Value) -> Result<Vec<String>, ProviderError> {
        Ok(vec![schema_urn(OBJECT_TYPE, Some(VARIANT))])
    }

    fn read_model(&self, object: &ConfigObject) -> Result<Value, ProviderError> {
        match object.type_discriminant(OBJECT_TYPE) {
            Some(VARIANT) => read_flat_model(&self.schema(), object),
            Some(other) => Err(ProviderError::Validation(format!(
                "Entry cache '{}' is a {} cache, not a FIFO cache",
                object.id, other
            ))),
            None => Err(ProviderError::Validation(format!(
                "Object '{}' carries no {} schema",
                object.id, OBJECT_TYPE
            ))),
        }
    }

    fn validate_model(&self, model: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&self.schema(), model);

        if let Some(level) = model.get("cache_level").and_then(Value::as_i64) {
            if level < 1 {
                diagnostics.push(
                    Diagnostic::error("Invalid cache_level")
                        .with_detail(format!("Must be at least 1, got {}", level))
                        .with_attribute("cache_level"),
                );
            }
        }
        if let Some(percent) = model.get("max_memory_percent").and_then(Value::as_i64) {
            if !(1..=100).contains(&percent) {
                diagnostics.push(
                    Diagnostic::error("Invalid max_memory_percent")
                        .with_detail(format!("Must be between 1 and 100, got {}", percent))
                        .with_attribute("max_memory_percent"),
                );
            }
        }
        diagnostics
    }
}
