//! Testing utilities for the provider.
//!
//! [`MockConfigApi`] is an in-memory configuration API that applies
//! operation lists the way the server does and records every request.
//! [`ProviderTester`] drives a [`ProviderService`] through its lifecycle.
//!
//! # Example
//!
//! ```ignore
//! use dsconfig_provider::testing::{MockConfigApi, ProviderTester};
//! use dsconfig_provider::DirectoryProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_subscription() {
//!     let mock = MockConfigApi::new();
//!     let client = mock.clone();
//!     let tester = ProviderTester::new(DirectoryProvider::new(move |_| Ok(client.clone())));
//!
//!     tester.configure(json!({
//!         "https_host": "https://localhost:1443",
//!         "username": "admin",
//!         "password": "secret",
//!     })).await.unwrap();
//!
//!     let state = tester.create("dsconfig_change_subscription", json!({
//!         "name": "Audit"
//!     })).await.unwrap();
//!
//!     assert_eq!(state["id"], "Audit");
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::client::{ConfigApiClient, ConfigObject, ObjectPath, UpdateRequest};
use crate::error::ProviderError;
use crate::operations::{OperationKind, OperationList, WireAttributes};
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

/// A request received by [`MockConfigApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    /// An add request.
    Add {
        /// Target collection.
        collection: String,
        /// Object as sent.
        object: ConfigObject,
    },
    /// A get request.
    Get(ObjectPath),
    /// An update request.
    ExecuteOperations {
        /// Target object.
        path: ObjectPath,
        /// Operations as sent.
        operations: OperationList,
        /// JSON body the request carries.
        body: Value,
    },
    /// A delete request.
    Delete(ObjectPath),
    /// A list request.
    List(String),
}

#[derive(Debug, Default)]
struct MockState {
    collections: IndexMap<String, IndexMap<String, ConfigObject>>,
    defaults: IndexMap<String, WireAttributes>,
    requests: Vec<RecordedRequest>,
    failures: VecDeque<ProviderError>,
}

/// In-memory configuration API.
///
/// Clones share state, so a test can keep one handle while the provider
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MockConfigApi {
    state: Arc<Mutex<MockState>>,
}

impl MockConfigApi {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties the server fills in on add when the request leaves them out.
    pub async fn set_server_defaults(&self, collection: &str, defaults: WireAttributes) {
        self.state
            .lock()
            .await
            .defaults
            .insert(collection.to_string(), defaults);
    }

    /// Store an object directly, bypassing request recording.
    pub async fn insert_object(&self, collection: &str, object: ConfigObject) {
        self.state
            .lock()
            .await
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(object.id.clone(), object);
    }

    /// Remove an object directly, as if deleted outside the provider.
    pub async fn remove_object(&self, path: &ObjectPath) -> Option<ConfigObject> {
        self.state
            .lock()
            .await
            .collections
            .get_mut(&path.collection)
            .and_then(|objects| objects.shift_remove(&path.id))
    }

    /// The stored object at `path`.
    pub async fn object(&self, path: &ObjectPath) -> Option<ConfigObject> {
        self.state
            .lock()
            .await
            .collections
            .get(&path.collection)
            .and_then(|objects| objects.get(&path.id))
            .cloned()
    }

    /// Make the next request fail with `error`.
    pub async fn fail_next(&self, error: ProviderError) {
        self.state.lock().await.failures.push_back(error);
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    /// The operation lists of every update request, in order.
    pub async fn executed_operations(&self) -> Vec<OperationList> {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .filter_map(|request| match request {
                RecordedRequest::ExecuteOperations { operations, .. } => Some(operations.clone()),
                _ => None,
            })
            .collect()
    }

    /// The JSON bodies of every update request, in order.
    pub async fn update_bodies(&self) -> Vec<Value> {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .filter_map(|request| match request {
                RecordedRequest::ExecuteOperations { body, .. } => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded requests.
    pub async fn clear_requests(&self) {
        self.state.lock().await.requests.clear();
    }
}

impl MockState {
    fn begin(&mut self, request: RecordedRequest) -> Result<(), ProviderError> {
        self.requests.push(request);
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find_mut(&mut self, path: &ObjectPath) -> Result<&mut ConfigObject, ProviderError> {
        self.collections
            .get_mut(&path.collection)
            .and_then(|objects| objects.get_mut(&path.id))
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))
    }
}

#[async_trait::async_trait]
impl ConfigApiClient for MockConfigApi {
    async fn add(
        &self,
        collection: &str,
        object: ConfigObject,
    ) -> Result<ConfigObject, ProviderError> {
        let mut state = self.state.lock().await;
        state.begin(RecordedRequest::Add {
            collection: collection.to_string(),
            object: object.clone(),
        })?;

        let mut stored = object;
        if let Some(defaults) = state.defaults.get(collection) {
            for (name, values) in defaults {
                stored
                    .attributes
                    .entry(name.clone())
                    .or_insert_with(|| values.clone());
            }
        }

        let objects = state.collections.entry(collection.to_string()).or_default();
        if objects.contains_key(&stored.id) {
            return Err(ProviderError::AlreadyExists(format!(
                "{}/{}",
                collection, stored.id
            )));
        }
        objects.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, path: &ObjectPath) -> Result<ConfigObject, ProviderError> {
        let mut state = self.state.lock().await;
        state.begin(RecordedRequest::Get(path.clone()))?;
        state.find_mut(path).map(|object| object.clone())
    }

    async fn execute_operations(
        &self,
        path: &ObjectPath,
        operations: &OperationList,
    ) -> Result<ConfigObject, ProviderError> {
        let body = serde_json::to_value(UpdateRequest { operations })?;
        let mut state = self.state.lock().await;
        state.begin(RecordedRequest::ExecuteOperations {
            path: path.clone(),
            operations: operations.clone(),
            body,
        })?;

        let object = state.find_mut(path)?;
        if let Some(op) = operations
            .iter()
            .find(|op| op.kind != OperationKind::Set && op.values.is_empty())
        {
            return Err(ProviderError::InvalidRequest(format!(
                "Operation on '{}' carries no values",
                op.attribute
            )));
        }
        operations.apply_to(&mut object.attributes);
        Ok(object.clone())
    }

    async fn delete(&self, path: &ObjectPath) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.begin(RecordedRequest::Delete(path.clone()))?;
        state
            .collections
            .get_mut(&path.collection)
            .and_then(|objects| objects.shift_remove(&path.id))
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(path.to_string()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<ConfigObject>, ProviderError> {
        let mut state = self.state.lock().await;
        state.begin(RecordedRequest::List(collection.to_string()))?;
        Ok(state
            .collections
            .get(collection)
            .map(|objects| objects.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// A test harness for provider implementations.
///
/// # Example
///
/// ```ignore
/// use dsconfig_provider::testing::ProviderTester;
///
/// let tester = ProviderTester::new(provider);
/// tester.configure(config).await.unwrap();
/// let state = tester.create("dsconfig_entry_cache", json!({"name": "FIFO"})).await.unwrap();
/// ```
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → create → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Run a full update lifecycle: plan → update → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;
        Ok(updated_state)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan does not have a change for a specific attribute.
///
/// # Panics
///
/// Panics if the plan has a change for the given path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        !has_change,
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error on the given attribute.
///
/// # Panics
///
/// Panics if no error diagnostic names the attribute.
pub fn assert_error_on_attribute(diagnostics: &[Diagnostic], attribute: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.attribute.as_deref() == Some(attribute));

    assert!(
        found,
        "Expected an error on '{}', but got errors on {:?}",
        attribute,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.attribute)
            .collect::<Vec<_>>()
    );
}

/// Assert that an operation list holds exactly the given operations, as
/// `(kind, attribute, values)` triples, in order.
///
/// # Panics
///
/// Panics if the operations differ.
pub fn assert_operations(operations: &OperationList, expected: &[(OperationKind, &str, &[&str])]) {
    let actual: Vec<(OperationKind, &str, Vec<&str>)> = operations
        .iter()
        .map(|op| {
            (
                op.kind,
                op.attribute.as_str(),
                op.values.iter().map(String::as_str).collect(),
            )
        })
        .collect();
    let expected: Vec<(OperationKind, &str, Vec<&str>)> = expected
        .iter()
        .map(|(kind, attribute, values)| (*kind, *attribute, values.to_vec()))
        .collect();

    assert_eq!(actual, expected, "Unexpected operations");
}
