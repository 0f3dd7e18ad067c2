//! Change subscriptions.
//!
//! A change subscription names a set of criteria; operations matching them
//! are flagged for change-notification listeners.

use crate::resource::{base_schema, ConfigResource};
use crate::schema::{Attribute, Schema};

/// `dsconfig_change_subscription`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeSubscription;

impl ConfigResource for ChangeSubscription {
    fn type_name(&self) -> &'static str {
        "dsconfig_change_subscription"
    }

    fn collection(&self) -> &'static str {
        "change-subscriptions"
    }

    fn schema(&self) -> Schema {
        base_schema()
            .with_description("Manages a change subscription")
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .empty_is_null()
                    .with_description("A description for this change subscription"),
            )
            .with_attribute(
                "connection_criteria",
                Attribute::optional_string()
                    .empty_is_null()
                    .with_description("Connection criteria an operation's client must match"),
            )
            .with_attribute(
                "request_criteria",
                Attribute::optional_string()
                    .empty_is_null()
                    .with_description("Request criteria the operation must match"),
            )
            .with_attribute(
                "result_criteria",
                Attribute::optional_string()
                    .empty_is_null()
                    .with_description("Result criteria the operation must match"),
            )
            .with_attribute(
                "expiration_time",
                Attribute::optional_string()
                    .with_description("Time after which the subscription no longer applies"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConfigObject;
    use crate::resource::{build_add_request, compile_operations};
    use serde_json::json;

    #[test]
    fn test_read_populates_empty_criteria() {
        let object = ConfigObject::new("Audit").with_attribute("request-criteria", ["Writes"]);
        let model = ChangeSubscription.read_model(&object).unwrap();
        assert_eq!(
            model,
            json!({
                "id": "Audit",
                "name": "Audit",
                "description": "",
                "connection_criteria": "",
                "request_criteria": "Writes",
                "result_criteria": "",
                "expiration_time": null,
            })
        );
    }

    #[test]
    fn test_read_state_against_sparse_plan_is_stable() {
        let object = ConfigObject::new("Audit").with_attribute("request-criteria", ["Writes"]);
        let state = ChangeSubscription.read_model(&object).unwrap();
        let plan = json!({"name": "Audit", "request_criteria": "Writes"});

        let ops = compile_operations(&ChangeSubscription.schema(), &plan, &state).unwrap();
        assert!(ops.is_empty(), "{:?}", ops);
    }

    #[test]
    fn test_add_request_uses_wire_names() {
        let plan = json!({
            "name": "Audit",
            "connection_criteria": "Internal",
            "expiration_time": "20301231235959Z",
        });
        let object = build_add_request(&ChangeSubscription, &plan).unwrap();
        assert_eq!(object.values("connection-criteria"), ["Internal"]);
        assert_eq!(object.values("expiration-time"), ["20301231235959Z"]);
        assert!(object.schemas.is_empty());
    }
}
