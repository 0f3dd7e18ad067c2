//! The provider surface.
//!
//! [`ProviderService`] is what a host drives: schema, configuration and
//! the resource lifecycle, all in terms of JSON attribute models.
//! [`DirectoryProvider`] implements it for the directory server's
//! configuration API by dispatching each call to the registered
//! [`ConfigResource`] and the generic handlers in [`crate::resource`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::ConfigApiClient;
use crate::config::{ProviderConfig, ProviderContext};
use crate::error::ProviderError;
use crate::resource::{self, ConfigResource};
use crate::resources;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Operations a provider exposes to its host.
///
/// # Example
///
/// ```ignore
/// use dsconfig_provider::{ProviderService, ProviderError, PlanResult, ProviderSchema};
/// use dsconfig_provider::schema::Diagnostic;
///
/// struct MyProvider;
///
/// #[async_trait::async_trait]
/// impl ProviderService for MyProvider {
///     fn schema(&self) -> ProviderSchema {
///         ProviderSchema::new()
///     }
///
///     async fn configure(
///         &self,
///         config: serde_json::Value,
///     ) -> Result<Vec<Diagnostic>, ProviderError> {
///         Ok(vec![])
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. Derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.schema().resources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource. `Value::Null` means it is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing configuration into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    /// Read every existing resource of a type.
    async fn list_resources(&self, resource_type: &str) -> Result<Vec<Value>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Listing not supported for resource type: {}",
            resource_type
        )))
    }
}

/// Builds a configuration API client from the provider configuration.
pub type ClientFactory<C> =
    Box<dyn Fn(&ProviderConfig) -> Result<C, ProviderError> + Send + Sync + 'static>;

/// Provider for the directory server's configuration objects.
pub struct DirectoryProvider<C: ConfigApiClient> {
    resources: IndexMap<&'static str, Arc<dyn ConfigResource>>,
    client_factory: ClientFactory<C>,
    context: RwLock<Option<Arc<ProviderContext<C>>>>,
}

impl<C: ConfigApiClient> DirectoryProvider<C> {
    /// Create a provider with every built-in resource type registered.
    ///
    /// `client_factory` runs once per successful [`ProviderService::configure`].
    pub fn new<F>(client_factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<C, ProviderError> + Send + Sync + 'static,
    {
        let provider = Self {
            resources: IndexMap::new(),
            client_factory: Box::new(client_factory),
            context: RwLock::new(None),
        };
        resources::all()
            .into_iter()
            .fold(provider, |provider, resource| provider.register(resource))
    }

    /// Register an additional resource type.
    pub fn with_resource(self, resource: impl ConfigResource) -> Self {
        self.register(Arc::new(resource))
    }

    fn register(mut self, resource: Arc<dyn ConfigResource>) -> Self {
        self.resources.insert(resource.type_name(), resource);
        self
    }

    /// Look up a registered resource type.
    pub fn resource(&self, resource_type: &str) -> Result<Arc<dyn ConfigResource>, ProviderError> {
        self.resources
            .get(resource_type)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    /// The context set up by the last successful configure.
    pub async fn context(&self) -> Result<Arc<ProviderContext<C>>, ProviderError> {
        self.context.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("Provider has not been configured".to_string())
        })
    }

    /// Whether [`ProviderService::configure`] has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.context.read().await.is_some()
    }
}

#[async_trait::async_trait]
impl<C: ConfigApiClient> ProviderService for DirectoryProvider<C> {
    fn schema(&self) -> ProviderSchema {
        self.resources.iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, (name, resource)| schema.with_resource(*name, resource.schema()),
        )
    }

    #[instrument(skip(self, config), name = "provider.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = ProviderConfig::from_value(&config).err().unwrap_or_default();
        debug!(diagnostics = diagnostics.len(), "ValidateProviderConfig completed");
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_value(&config) {
            Ok(config) => config,
            Err(diagnostics) => {
                warn!(diagnostics = diagnostics.len(), "Configure completed with errors");
                return Ok(diagnostics);
            }
        };

        let client = (self.client_factory)(&config)
            .inspect_err(|e| error!(error = %e, "Failed to build configuration API client"))?;

        let mut diagnostics = Vec::new();
        if config.insecure_trust_all_tls {
            diagnostics.push(
                Diagnostic::warning("TLS certificate verification is disabled")
                    .with_detail("Any certificate presented by the server will be trusted")
                    .with_attribute("insecure_trust_all_tls"),
            );
        }

        info!(url = %config.config_api_url(), "Provider configured");
        *self.context.write().await = Some(Arc::new(ProviderContext::new(config, client)));
        Ok(diagnostics)
    }

    #[instrument(skip(self), name = "provider.stop")]
    async fn stop(&self) -> Result<(), ProviderError> {
        self.context.write().await.take();
        info!("Provider stopped");
        Ok(())
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.resource(resource_type)?.validate_model(&config);
        debug!(diagnostics = diagnostics.len(), "ValidateResourceConfig completed");
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let _ = config;
        let resource = self.resource(resource_type)?;
        let result = resource::plan(resource.as_ref(), prior_state.as_ref(), &proposed_state)?;
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource::create(&ctx, resource.as_ref(), &planned_state).await
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        Ok(resource::read(&ctx, resource.as_ref(), &current_state)
            .await?
            .unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource::update(&ctx, resource.as_ref(), &prior_state, &planned_state).await
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource::delete(&ctx, resource.as_ref(), &current_state).await
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        let state = resource::import(&ctx, resource.as_ref(), id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self), name = "provider.list_resources")]
    async fn list_resources(&self, resource_type: &str) -> Result<Vec<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource::list(&ctx, resource.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ConfigObject, ObjectPath};
    use crate::operations::OperationKind;
    use crate::testing::MockConfigApi;
    use serde_json::json;

    fn provider_config() -> Value {
        json!({
            "https_host": "https://localhost:1443",
            "username": "cn=Directory Manager",
            "password": "secret",
        })
    }

    async fn configured(mock: &MockConfigApi) -> DirectoryProvider<MockConfigApi> {
        let client = mock.clone();
        let provider = DirectoryProvider::new(move |_| Ok(client.clone()));
        let diagnostics = provider.configure(provider_config()).await.unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        provider
    }

    #[test]
    fn test_schema_lists_builtin_resources() {
        let provider = DirectoryProvider::new(|_| Ok(MockConfigApi::new()));
        let schema = provider.schema();
        assert!(schema.provider.attributes.contains_key("https_host"));
        assert_eq!(
            provider.metadata().resources,
            vec![
                "dsconfig_change_subscription",
                "dsconfig_entry_cache",
                "dsconfig_log_file_rotation_listener",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = configured(&MockConfigApi::new()).await;
        let err = provider
            .create("dsconfig_widget", json!({"name": "w"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_calls_before_configure_fail() {
        let provider = DirectoryProvider::new(|_| Ok(MockConfigApi::new()));
        assert!(!provider.is_configured().await);
        let err = provider
            .read("dsconfig_change_subscription", json!({"name": "Audit"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_configure_reports_diagnostics() {
        let provider = DirectoryProvider::new(|_| Ok(MockConfigApi::new()));
        let diagnostics = provider
            .configure(json!({
                "https_host": "http://localhost:1443",
                "username": "admin",
                "password": "secret",
            }))
            .await
            .unwrap();
        assert!(diagnostics.iter().any(Diagnostic::is_error));
        assert!(!provider.is_configured().await);

        let diagnostics = provider
            .configure(json!({
                "https_host": "https://localhost:1443",
                "username": "admin",
                "password": "secret",
                "insecure_trust_all_tls": true,
            }))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert!(provider.is_configured().await);
    }

    #[tokio::test]
    async fn test_client_factory_error_propagates() {
        let provider: DirectoryProvider<MockConfigApi> = DirectoryProvider::new(|_| {
            Err(ProviderError::Unavailable("connection refused".to_string()))
        });
        let err = provider.configure(provider_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(!provider.is_configured().await);
    }

    #[tokio::test]
    async fn test_stop_clears_context() {
        let provider = configured(&MockConfigApi::new()).await;
        provider.stop().await.unwrap();
        assert!(provider.context().await.is_err());
    }

    #[tokio::test]
    async fn test_update_sends_single_request() {
        let mock = MockConfigApi::new();
        let provider = configured(&mock).await;

        let state = provider
            .create(
                "dsconfig_entry_cache",
                json!({
                    "name": "FIFO", "enabled": true, "cache_level": 10,
                    "include_filter": ["(ou=people)", "(ou=groups)"],
                }),
            )
            .await
            .unwrap();

        let planned = provider
            .plan(
                "dsconfig_entry_cache",
                Some(state.clone()),
                json!({
                    "name": "FIFO", "enabled": false, "cache_level": 10,
                    "include_filter": ["(ou=people)", "(ou=services)"],
                }),
                Value::Null,
            )
            .await
            .unwrap();
        assert!(!planned.requires_replace);

        let updated = provider
            .update("dsconfig_entry_cache", state, planned.planned_state)
            .await
            .unwrap();
        assert_eq!(updated["enabled"], false);
        assert_eq!(updated["include_filter"], json!(["(ou=people)", "(ou=services)"]));

        let executed = mock.executed_operations().await;
        assert_eq!(executed.len(), 1);
        let kinds: Vec<_> = executed[0].iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::Set, OperationKind::Add, OperationKind::Remove]
        );
    }

    #[tokio::test]
    async fn test_read_missing_object_returns_null() {
        let mock = MockConfigApi::new();
        let provider = configured(&mock).await;
        let state = provider
            .read("dsconfig_change_subscription", json!({"name": "Gone"}))
            .await
            .unwrap();
        assert!(state.is_null());
    }

    #[tokio::test]
    async fn test_import_and_list() {
        let mock = MockConfigApi::new();
        mock.insert_object(
            "change-subscriptions",
            ConfigObject::new("Audit").with_attribute("request-criteria", ["Writes"]),
        )
        .await;
        let provider = configured(&mock).await;

        let imported = provider
            .import_resource("dsconfig_change_subscription", "Audit")
            .await
            .unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["request_criteria"], "Writes");

        let listed = provider
            .list_resources("dsconfig_change_subscription")
            .await
            .unwrap();
        assert_eq!(listed, vec![imported[0].state.clone()]);

        assert!(mock
            .object(&ObjectPath::new("change-subscriptions", "Audit"))
            .await
            .is_some());
    }
}
