//! Generic CRUD handlers for configuration objects.
//!
//! A resource type only describes itself through [`ConfigResource`]; the
//! handlers here do the rest:
//!
//! - create: send an add request built from the plan, read the response back
//! - read: fetch the object, or report it gone
//! - update: compile plan against state into operations and send them in one
//!   request
//! - delete and import
//!
//! Every handler takes the [`ProviderContext`] explicitly.

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::{ConfigApiClient, ConfigObject, ObjectPath};
use crate::config::ProviderContext;
use crate::error::ProviderError;
use crate::operations::{
    add_bool_operation_if_necessary, add_int_operation_if_necessary,
    add_string_operation_if_necessary, add_string_set_operations_if_necessary, OperationList,
};
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation::validate;
use crate::value::AttributeValue;

/// Local name of the computed identifier attribute.
pub const ID_ATTRIBUTE: &str = "id";

/// Local name of the attribute holding the object name.
pub const NAME_ATTRIBUTE: &str = "name";

/// Schema every named configuration object starts from: a computed `id`
/// and a `name` that forces replacement when changed.
pub fn base_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            ID_ATTRIBUTE,
            Attribute::computed_string()
                .local_only()
                .with_description("Identifier of the object, equal to its name"),
        )
        .with_attribute(
            NAME_ATTRIBUTE,
            Attribute::required_string()
                .local_only()
                .with_force_new()
                .with_description("Name of the object"),
        )
}

/// A configuration object type managed by the provider.
pub trait ConfigResource: Send + Sync + 'static {
    /// Resource type name, e.g. `dsconfig_entry_cache`.
    fn type_name(&self) -> &'static str;

    /// Collection on the server holding objects of this type.
    fn collection(&self) -> &'static str;

    /// Attribute schema, in the order operations are sent.
    fn schema(&self) -> Schema;

    /// Schema URNs sent with an add request for `model`.
    fn object_schemas(&self, model: &Value) -> Result<Vec<String>, ProviderError> {
        let _ = model;
        Ok(Vec::new())
    }

    /// Validate a configuration model.
    fn validate_model(&self, model: &Value) -> Vec<Diagnostic> {
        validate(&self.schema(), model)
    }

    /// Map a server object to the attribute model.
    fn read_model(&self, object: &ConfigObject) -> Result<Value, ProviderError> {
        read_flat_model(&self.schema(), object)
    }
}

/// Map a server object to the attribute model using only the schema.
pub fn read_flat_model(schema: &Schema, object: &ConfigObject) -> Result<Value, ProviderError> {
    let mut model = Map::new();
    for (local, attribute) in &schema.attributes {
        let value = match local.as_str() {
            ID_ATTRIBUTE | NAME_ATTRIBUTE => Value::String(object.id.clone()),
            _ if attribute.local_only => continue,
            _ => {
                let wire_name = attribute.wire_name_for(local);
                let values = object.values(wire_name.as_str());
                AttributeValue::from_wire(local, attribute, Some(values))?
                    .to_json()
                    .unwrap_or(Value::Null)
            }
        };
        model.insert(local.clone(), value);
    }
    Ok(Value::Object(model))
}

/// The object name held by a model.
pub fn object_name(model: &Value) -> Result<&str, ProviderError> {
    model
        .get(NAME_ATTRIBUTE)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ProviderError::Validation("Missing object name".to_string()))
}

/// Build the add request for a planned model.
pub fn build_add_request(
    resource: &dyn ConfigResource,
    plan: &Value,
) -> Result<ConfigObject, ProviderError> {
    let schema = resource.schema();
    let mut object = ConfigObject::new(object_name(plan)?);
    object.schemas = resource.object_schemas(plan)?;

    for (local, attribute) in schema
        .wire_attributes()
        .filter(|(_, attribute)| attribute.flags.is_configurable())
    {
        let value = AttributeValue::from_json(local, attribute, plan.get(local))?;
        let Some(values) = value.to_wire() else {
            continue;
        };
        if values.is_empty() || (attribute.empty_is_null && values == [""]) {
            continue;
        }
        object
            .attributes
            .insert(attribute.wire_name_for(local).as_str().to_string(), values);
    }
    Ok(object)
}

/// Compile the operations that bring the object from `state` to `plan`.
///
/// Attributes are visited in schema declaration order.
pub fn compile_operations(
    schema: &Schema,
    plan: &Value,
    state: &Value,
) -> Result<OperationList, ProviderError> {
    let mut operations = OperationList::new();
    for (local, attribute) in schema
        .wire_attributes()
        .filter(|(_, attribute)| attribute.flags.is_configurable())
    {
        let desired = AttributeValue::from_json(local, attribute, plan.get(local))?;
        let current = AttributeValue::from_json(local, attribute, state.get(local))?;
        diff_attribute(&mut operations, local, attribute, &desired, &current);
    }
    Ok(operations)
}

fn diff_attribute(
    operations: &mut OperationList,
    local: &str,
    attribute: &Attribute,
    desired: &AttributeValue,
    current: &AttributeValue,
) {
    let name = attribute.wire_name_for(local);
    match attribute.attr_type {
        AttributeType::String => add_string_operation_if_necessary(
            operations,
            desired,
            current,
            &name,
            attribute.string_equality(),
        ),
        AttributeType::Bool => add_bool_operation_if_necessary(operations, desired, current, &name),
        AttributeType::Int64 => add_int_operation_if_necessary(operations, desired, current, &name),
        AttributeType::StringSet => {
            add_string_set_operations_if_necessary(operations, desired, current, &name)
        }
    }
}

fn attribute_changed(
    local: &str,
    attribute: &Attribute,
    after: &Value,
    before: &Value,
) -> Result<bool, ProviderError> {
    if attribute.local_only {
        return Ok(after != before);
    }
    if !attribute.flags.is_configurable() {
        return Ok(false);
    }
    let desired = AttributeValue::from_json(local, attribute, Some(after))?;
    let current = AttributeValue::from_json(local, attribute, Some(before))?;
    let mut operations = OperationList::new();
    diff_attribute(&mut operations, local, attribute, &desired, &current);
    Ok(!operations.is_empty())
}

/// Turn validation diagnostics into an error if any of them is an error.
pub fn check_model(resource: &dyn ConfigResource, model: &Value) -> Result<(), ProviderError> {
    let errors: Vec<String> = resource
        .validate_model(model)
        .into_iter()
        .filter(Diagnostic::is_error)
        .map(|d| match d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary,
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(errors.join("; ")))
    }
}

/// Plan the change from `prior_state` to `proposed_state`.
///
/// A change is reported for exactly the attributes an update would send
/// operations for, plus local attributes whose value differs. Computed
/// attributes left out of the proposal keep their prior value, unless the
/// change replaces the object; they are then left unknown for the create.
pub fn plan(
    resource: &dyn ConfigResource,
    prior_state: Option<&Value>,
    proposed_state: &Value,
) -> Result<PlanResult, ProviderError> {
    let schema = resource.schema();

    let Some(prior) = prior_state.filter(|state| !state.is_null()) else {
        check_model(resource, proposed_state)?;
        let changes = schema
            .attributes
            .keys()
            .filter_map(|local| {
                proposed_state
                    .get(local)
                    .filter(|v| !v.is_null())
                    .map(|v| AttributeChange::added(local.clone(), v.clone()))
            })
            .collect();
        return Ok(PlanResult::with_changes(
            proposed_state.clone(),
            changes,
            false,
        ));
    };

    if proposed_state.is_null() {
        let changes = schema
            .attributes
            .keys()
            .filter_map(|local| {
                prior
                    .get(local)
                    .filter(|v| !v.is_null())
                    .map(|v| AttributeChange::removed(local.clone(), v.clone()))
            })
            .collect();
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    check_model(resource, proposed_state)?;
    let Value::Object(proposed) = proposed_state else {
        return Err(ProviderError::Validation(
            "Proposed state must be an object".to_string(),
        ));
    };

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for (local, attribute) in &schema.attributes {
        let after = match proposed.get(local) {
            Some(value) => value.clone(),
            None if attribute.flags.computed => continue,
            None => Value::Null,
        };
        let before = prior.get(local).cloned().unwrap_or(Value::Null);
        if attribute_changed(local, attribute, &after, &before)? {
            requires_replace |= attribute.force_new;
            changes.push(AttributeChange::modified(local.clone(), before, after));
        }
    }

    let planned = if requires_replace {
        proposed_state.clone()
    } else {
        with_prior_computed(&schema, proposed_state, prior)
    };
    Ok(PlanResult::with_changes(planned, changes, requires_replace))
}

/// `model` with computed attributes it leaves out taken from `prior`.
fn with_prior_computed(schema: &Schema, model: &Value, prior: &Value) -> Value {
    let mut merged = model.clone();
    if let Value::Object(map) = &mut merged {
        for (local, attribute) in &schema.attributes {
            if attribute.flags.computed && !map.contains_key(local) {
                let value = prior.get(local).cloned().unwrap_or(Value::Null);
                map.insert(local.clone(), value);
            }
        }
    }
    merged
}

/// Create the object described by `plan` and return its state.
#[instrument(skip_all, fields(resource_type = resource.type_name()))]
pub async fn create<C: ConfigApiClient>(
    ctx: &ProviderContext<C>,
    resource: &dyn ConfigResource,
    plan: &Value,
) -> Result<Value, ProviderError> {
    check_model(resource, plan)?;
    let request = build_add_request(resource, plan)?;
    debug!(id = %request.id, attributes = request.attributes.len(), "Sending add request");

    let response = ctx.client.add(resource.collection(), request).await?;
    info!(id = %response.id, "Created configuration object");
    resource.read_model(&response)
}

/// Read the current state. `None` means the object no longer exists.
#[instrument(skip_all, fields(resource_type = resource.type_name()))]
pub async fn read<C: ConfigApiClient>(
    ctx: &ProviderContext<C>,
    resource: &dyn ConfigResource,
    state: &Value,
) -> Result<Option<Value>, ProviderError> {
    let path = ObjectPath::new(resource.collection(), object_name(state)?);
    match ctx.client.get(&path).await {
        Ok(object) => resource.read_model(&object).map(Some),
        Err(e) if e.is_not_found() => {
            warn!(%path, "Configuration object not found, removing from state");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Apply the difference between `prior_state` and `plan` to the object.
///
/// Sends a single request holding every operation, or none at all when
/// nothing differs.
#[instrument(skip_all, fields(resource_type = resource.type_name()))]
pub async fn update<C: ConfigApiClient>(
    ctx: &ProviderContext<C>,
    resource: &dyn ConfigResource,
    prior_state: &Value,
    plan: &Value,
) -> Result<Value, ProviderError> {
    check_model(resource, plan)?;
    let name = object_name(prior_state)?;
    if object_name(plan)? != name {
        return Err(ProviderError::FailedPrecondition(format!(
            "Object '{}' cannot be renamed in place",
            name
        )));
    }

    let operations = compile_operations(&resource.schema(), plan, prior_state)?;
    if operations.is_empty() {
        debug!(id = %name, "No changes to apply");
        return Ok(with_prior_computed(&resource.schema(), plan, prior_state));
    }

    let path = ObjectPath::new(resource.collection(), name);
    debug!(%path, operations = ?operations, "Sending update request");
    let response = ctx.client.execute_operations(&path, &operations).await?;
    info!(%path, count = operations.len(), "Updated configuration object");
    resource.read_model(&response)
}

/// Delete the object. An object that is already gone counts as deleted.
#[instrument(skip_all, fields(resource_type = resource.type_name()))]
pub async fn delete<C: ConfigApiClient>(
    ctx: &ProviderContext<C>,
    resource: &dyn ConfigResource,
    state: &Value,
) -> Result<(), ProviderError> {
    let path = ObjectPath::new(resource.collection(), object_name(state)?);
    match ctx.client.delete(&path).await {
        Ok(()) => {
            info!(%path, "Deleted configuration object");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            warn!(%path, "Configuration object already deleted");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Import an existing object by name.
#[instrument(skip_all, fields(resource_type = resource.type_name(), id = %id))]
pub async fn import<C: ConfigApiClient>(
    ctx: &ProviderContext<C>,
    resource: &dyn ConfigResource,
    id: &str,
) -> Result<Value, ProviderError> {
    let path = ObjectPath::new(resource.collection(), id);
    let object = ctx.client.get(&path).await?;
    info!(%path, "Imported configuration object");
    resource.read_model(&object)
}

/// Read every object of this type.
#[instrument(skip_all, fields(resource_type = resource.type_name()))]
pub async fn list<C: ConfigApiClient>(
    ctx: &ProviderContext<C>,
    resource: &dyn ConfigResource,
) -> Result<Vec<Value>, ProviderError> {
    let objects = ctx.client.list(resource.collection()).await?;
    debug!(count = objects.len(), "Listed configuration objects");
    objects.iter().map(|object| resource.read_model(object)).collect()
}
