//! The configuration API seen from the provider.
//!
//! The REST client that talks to the server lives outside this crate; the
//! provider only depends on the [`ConfigApiClient`] trait. See
//! [`crate::testing::MockConfigApi`] for an in-memory implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::operations::{OperationList, WireAttributes};

/// Prefix shared by the schema URNs that tag configuration objects.
pub const SCHEMA_URN_PREFIX: &str = "urn:dsconfig:schemas:configuration:2.0:";

/// Build the schema URN for an object type and optional variant.
///
/// ```
/// use dsconfig_provider::client::schema_urn;
///
/// assert_eq!(
///     schema_urn("log-file-rotation-listener", Some("copy")),
///     "urn:dsconfig:schemas:configuration:2.0:log-file-rotation-listener:copy"
/// );
/// ```
pub fn schema_urn(object_type: &str, variant: Option<&str>) -> String {
    match variant {
        Some(variant) => format!("{}{}:{}", SCHEMA_URN_PREFIX, object_type, variant),
        None => format!("{}{}", SCHEMA_URN_PREFIX, object_type),
    }
}

/// Location of a configuration object: its collection and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    /// Collection, e.g. `change-subscriptions`.
    pub collection: String,
    /// Object name within the collection.
    pub id: String,
}

impl ObjectPath {
    /// Create a new object path.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A configuration object as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObject {
    /// Schema URNs; for type-discriminated objects the last segment names the variant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
    /// Object name.
    pub id: String,
    /// Configuration properties keyed by wire name.
    #[serde(flatten)]
    pub attributes: WireAttributes,
}

impl ConfigObject {
    /// Create an object with no properties.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            schemas: Vec::new(),
            id: id.into(),
            attributes: WireAttributes::new(),
        }
    }

    /// Add a schema URN.
    pub fn with_schema(mut self, urn: impl Into<String>) -> Self {
        self.schemas.push(urn.into());
        self
    }

    /// Set a property.
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Values of a property; empty if the property is absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// The single value of a property.
    pub fn single_value(&self, name: &str) -> Result<Option<&str>, ProviderError> {
        match self.values(name) {
            [] => Ok(None),
            [value] => Ok(Some(value.as_str())),
            values => Err(ProviderError::Validation(format!(
                "Property '{}' of '{}' expects a single value, server returned {}",
                name,
                self.id,
                values.len()
            ))),
        }
    }

    /// The variant named by this object's schema URN for `object_type`.
    pub fn type_discriminant(&self, object_type: &str) -> Option<&str> {
        let prefix = format!("{}{}:", SCHEMA_URN_PREFIX, object_type);
        self.schemas
            .iter()
            .find_map(|urn| urn.strip_prefix(prefix.as_str()))
    }
}

/// Body of an update request.
#[derive(Debug, Serialize)]
pub struct UpdateRequest<'a> {
    /// Operations applied in order.
    pub operations: &'a OperationList,
}

/// Access to the server's configuration API.
///
/// Implementations map non-success HTTP responses through
/// [`ProviderError::from_status`].
#[async_trait::async_trait]
pub trait ConfigApiClient: Send + Sync + 'static {
    /// Create an object in `collection`.
    async fn add(
        &self,
        collection: &str,
        object: ConfigObject,
    ) -> Result<ConfigObject, ProviderError>;

    /// Fetch an object.
    async fn get(&self, path: &ObjectPath) -> Result<ConfigObject, ProviderError>;

    /// Apply an operation list to an object in a single request.
    async fn execute_operations(
        &self,
        path: &ObjectPath,
        operations: &OperationList,
    ) -> Result<ConfigObject, ProviderError>;

    /// Delete an object.
    async fn delete(&self, path: &ObjectPath) -> Result<(), ProviderError>;

    /// List the objects in a collection.
    async fn list(&self, collection: &str) -> Result<Vec<ConfigObject>, ProviderError>;
}
