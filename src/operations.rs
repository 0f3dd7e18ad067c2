//! Compiles plan/state attribute differences into configuration API operations.
//!
//! The configuration API updates an object with a PATCH body holding an
//! ordered list of operations. Scalars are replaced whole; string sets are
//! changed incrementally with `add` and `remove` so that members added to the
//! same attribute outside of this provider are left alone.
//!
//! ```
//! use dsconfig_provider::operations::{diff_string_set, OperationKind};
//! use dsconfig_provider::value::{AttributeName, AttributeValue};
//!
//! let ops = diff_string_set(
//!     &AttributeValue::string_set(["a", "b"]),
//!     &AttributeValue::string_set(["b", "c"]),
//!     &AttributeName::new("include-filter"),
//! );
//! assert_eq!(ops.len(), 2);
//! assert_eq!(ops[0].kind, OperationKind::Add);
//! assert_eq!(ops[0].values, vec!["a"]);
//! assert_eq!(ops[1].kind, OperationKind::Remove);
//! assert_eq!(ops[1].values, vec!["c"]);
//! ```
//!
//! The compiler never fails on well-typed input. Diffing values of different
//! kinds against each other is a bug in the calling code and panics.

use std::collections::BTreeSet;
use std::ops::Index;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{AttributeKind, AttributeName, AttributeValue, Known};

/// Attribute values of a configuration object as sent over the wire, keyed by
/// wire name.
pub type WireAttributes = IndexMap<String, Vec<String>>;

/// The kind of change an operation makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Add the values to a multi-valued attribute.
    #[serde(rename = "add")]
    Add,
    /// Replace the whole value. Empty values clear the attribute.
    #[serde(rename = "replace")]
    Set,
    /// Remove the values from a multi-valued attribute.
    #[serde(rename = "remove")]
    Remove,
}

/// A single change to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// What the operation does.
    #[serde(rename = "op")]
    pub kind: OperationKind,
    /// The attribute it applies to.
    #[serde(rename = "path")]
    pub attribute: AttributeName,
    /// Wire-encoded values.
    #[serde(rename = "value", default)]
    pub values: Vec<String>,
}

impl Operation {
    /// Create an operation.
    pub fn new(kind: OperationKind, attribute: AttributeName, values: Vec<String>) -> Self {
        Self {
            kind,
            attribute,
            values,
        }
    }

    /// Replace the attribute's value.
    pub fn set(attribute: AttributeName, values: Vec<String>) -> Self {
        Self::new(OperationKind::Set, attribute, values)
    }

    /// Add members to the attribute.
    pub fn add(attribute: AttributeName, values: Vec<String>) -> Self {
        Self::new(OperationKind::Add, attribute, values)
    }

    /// Remove members from the attribute.
    pub fn remove(attribute: AttributeName, values: Vec<String>) -> Self {
        Self::new(OperationKind::Remove, attribute, values)
    }

    /// Apply this operation to a set of wire attributes, the way the server does.
    pub fn apply_to(&self, attributes: &mut WireAttributes) {
        let key = self.attribute.as_str();
        match self.kind {
            OperationKind::Set => {
                if self.values.is_empty() {
                    attributes.shift_remove(key);
                } else {
                    attributes.insert(key.to_string(), self.values.clone());
                }
            }
            OperationKind::Add => {
                let entry = attributes.entry(key.to_string()).or_default();
                for value in &self.values {
                    if !entry.contains(value) {
                        entry.push(value.clone());
                    }
                }
            }
            OperationKind::Remove => {
                if let Some(entry) = attributes.get_mut(key) {
                    entry.retain(|value| !self.values.contains(value));
                    if entry.is_empty() {
                        attributes.shift_remove(key);
                    }
                }
            }
        }
    }
}

/// An ordered list of operations, applied by the server in sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationList(Vec<Operation>);

impl OperationList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation.
    pub fn push(&mut self, operation: Operation) {
        self.0.push(operation);
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list holds no operations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the operations in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.0.iter()
    }

    /// The operations as a slice.
    pub fn as_slice(&self) -> &[Operation] {
        &self.0
    }

    /// Apply every operation in order.
    pub fn apply_to(&self, attributes: &mut WireAttributes) {
        for operation in &self.0 {
            operation.apply_to(attributes);
        }
    }
}

impl Index<usize> for OperationList {
    type Output = Operation;

    fn index(&self, index: usize) -> &Operation {
        &self.0[index]
    }
}

impl Extend<Operation> for OperationList {
    fn extend<T: IntoIterator<Item = Operation>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Operation> for OperationList {
    fn from_iter<T: IntoIterator<Item = Operation>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for OperationList {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a OperationList {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How two strings are compared when diffing a string attribute.
#[derive(Debug, Clone, Copy, Default)]
pub enum StringEquality {
    /// Byte-for-byte equality; null only equals null.
    #[default]
    Exact,
    /// An empty string is the same as the attribute being absent.
    EmptyIsNull,
    /// Caller-defined equivalence; `None` stands for null.
    Custom(fn(Option<&str>, Option<&str>) -> bool),
}

impl StringEquality {
    /// Whether `desired` and `current` are equivalent.
    pub fn matches(&self, desired: Option<&str>, current: Option<&str>) -> bool {
        match self {
            Self::Exact => desired == current,
            Self::EmptyIsNull => {
                desired.filter(|s| !s.is_empty()) == current.filter(|s| !s.is_empty())
            }
            Self::Custom(equivalent) => equivalent(desired, current),
        }
    }

    /// Whether `value` is equivalent to the attribute being absent.
    pub fn is_null(&self, value: &str) -> bool {
        match self {
            Self::Exact => false,
            Self::EmptyIsNull => value.is_empty(),
            Self::Custom(equivalent) => equivalent(Some(value), None),
        }
    }
}

/// Compute the operation that turns `current` into `desired` for a scalar.
///
/// Returns `None` when `desired` is unknown or when both sides are
/// equivalent. A null `desired` against a present `current` yields a set
/// with no values, which clears the attribute.
///
/// # Panics
///
/// Panics if either value is a string set or if the two present values are
/// of different kinds.
pub fn diff_scalar(
    desired: &AttributeValue,
    current: &AttributeValue,
    name: &AttributeName,
    equality: StringEquality,
) -> Option<Operation> {
    let desired = match desired {
        AttributeValue::Unknown => return None,
        AttributeValue::Null => None,
        AttributeValue::Present(known) => Some(known),
    };
    // State never holds unknowns; treat one like an absent value.
    let current = current.known();
    check_scalar_kinds(desired, current, name);

    let unchanged = match (desired, current) {
        (None, None) => true,
        (Some(Known::String(_)), _) | (_, Some(Known::String(_))) => equality.matches(
            desired.and_then(Known::as_str),
            current.and_then(Known::as_str),
        ),
        (desired, current) => desired == current,
    };
    if unchanged {
        return None;
    }

    let values = match desired {
        None => Vec::new(),
        Some(Known::String(s)) if equality.is_null(s) => Vec::new(),
        Some(known) => known.wire_values(),
    };
    Some(Operation::set(name.clone(), values))
}

/// Compute the operations that turn `current` into `desired` for a string set.
///
/// Emits at most one `add` followed by at most one `remove`, each carrying
/// its values sorted lexically. Null on either side is the empty set.
///
/// # Panics
///
/// Panics if either value is present but not a string set.
pub fn diff_string_set(
    desired: &AttributeValue,
    current: &AttributeValue,
    name: &AttributeName,
) -> OperationList {
    let mut operations = OperationList::new();
    if desired.is_unknown() {
        return operations;
    }

    let desired = set_members(desired, name);
    let current = set_members(current, name);

    let to_add: Vec<String> = desired
        .difference(&current)
        .map(|s| s.to_string())
        .collect();
    let to_remove: Vec<String> = current
        .difference(&desired)
        .map(|s| s.to_string())
        .collect();

    if !to_add.is_empty() {
        operations.push(Operation::add(name.clone(), to_add));
    }
    if !to_remove.is_empty() {
        operations.push(Operation::remove(name.clone(), to_remove));
    }
    operations
}

/// Push a set operation for a string attribute if the values differ.
pub fn add_string_operation_if_necessary(
    operations: &mut OperationList,
    desired: &AttributeValue,
    current: &AttributeValue,
    name: &AttributeName,
    equality: StringEquality,
) {
    check_kind(desired, AttributeKind::String, name);
    operations.extend(diff_scalar(desired, current, name, equality));
}

/// Push a set operation for a boolean attribute if the values differ.
pub fn add_bool_operation_if_necessary(
    operations: &mut OperationList,
    desired: &AttributeValue,
    current: &AttributeValue,
    name: &AttributeName,
) {
    check_kind(desired, AttributeKind::Bool, name);
    operations.extend(diff_scalar(desired, current, name, StringEquality::Exact));
}

/// Push a set operation for an integer attribute if the values differ.
pub fn add_int_operation_if_necessary(
    operations: &mut OperationList,
    desired: &AttributeValue,
    current: &AttributeValue,
    name: &AttributeName,
) {
    check_kind(desired, AttributeKind::Int, name);
    operations.extend(diff_scalar(desired, current, name, StringEquality::Exact));
}

/// Push add/remove operations for a string set attribute if the sets differ.
pub fn add_string_set_operations_if_necessary(
    operations: &mut OperationList,
    desired: &AttributeValue,
    current: &AttributeValue,
    name: &AttributeName,
) {
    operations.extend(diff_string_set(desired, current, name));
}

fn check_scalar_kinds(desired: Option<&Known>, current: Option<&Known>, name: &AttributeName) {
    for known in [desired, current].into_iter().flatten() {
        assert!(
            known.kind() != AttributeKind::StringSet,
            "attribute '{}': string sets must be diffed with diff_string_set",
            name
        );
    }
    if let (Some(desired), Some(current)) = (desired, current) {
        assert!(
            desired.kind() == current.kind(),
            "attribute '{}': cannot diff {:?} against {:?}",
            name,
            desired.kind(),
            current.kind()
        );
    }
}

fn check_kind(value: &AttributeValue, expected: AttributeKind, name: &AttributeName) {
    if let Some(known) = value.known() {
        assert!(
            known.kind() == expected,
            "attribute '{}': expected {:?}, got {:?}",
            name,
            expected,
            known.kind()
        );
    }
}

fn set_members<'a>(value: &'a AttributeValue, name: &AttributeName) -> BTreeSet<&'a str> {
    match value {
        AttributeValue::Present(Known::StringSet(members)) => {
            members.iter().map(String::as_str).collect()
        }
        AttributeValue::Present(other) => panic!(
            "attribute '{}': cannot diff {:?} as a string set",
            name,
            other.kind()
        ),
        AttributeValue::Null | AttributeValue::Unknown => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn name() -> AttributeName {
        AttributeName::new("description")
    }

    #[test]
    fn test_identical_scalars_produce_nothing() {
        for value in [
            AttributeValue::Null,
            AttributeValue::string("x"),
            AttributeValue::string(""),
            AttributeValue::bool(true),
            AttributeValue::int(0),
        ] {
            assert_eq!(
                diff_scalar(&value, &value, &name(), StringEquality::Exact),
                None,
                "{:?}",
                value
            );
        }
    }

    #[test]
    fn test_unknown_desired_produces_nothing() {
        for current in [
            AttributeValue::Null,
            AttributeValue::string("x"),
            AttributeValue::int(3),
        ] {
            assert_eq!(
                diff_scalar(&AttributeValue::Unknown, &current, &name(), StringEquality::Exact),
                None
            );
        }
        assert!(diff_string_set(
            &AttributeValue::Unknown,
            &AttributeValue::string_set(["a"]),
            &name()
        )
        .is_empty());
    }

    #[test]
    fn test_scalar_removal_sets_no_values() {
        let op = diff_scalar(
            &AttributeValue::Null,
            &AttributeValue::string("x"),
            &name(),
            StringEquality::Exact,
        )
        .unwrap();
        assert_eq!(op.kind, OperationKind::Set);
        assert!(op.values.is_empty());
    }

    #[test]
    fn test_scalar_creation() {
        let op = diff_scalar(
            &AttributeValue::string("x"),
            &AttributeValue::Null,
            &name(),
            StringEquality::Exact,
        )
        .unwrap();
        assert_eq!(op, Operation::set(name(), vec!["x".to_string()]));

        let op = diff_scalar(
            &AttributeValue::int(30),
            &AttributeValue::Unknown,
            &AttributeName::new("max-entries"),
            StringEquality::Exact,
        )
        .unwrap();
        assert_eq!(op.values, vec!["30"]);
    }

    #[test]
    fn test_scalar_change_encodes_wire_value() {
        let op = diff_scalar(
            &AttributeValue::bool(false),
            &AttributeValue::bool(true),
            &AttributeName::new("enabled"),
            StringEquality::Exact,
        )
        .unwrap();
        assert_eq!(op.values, vec!["false"]);
    }

    #[test]
    fn test_empty_is_null_equivalence() {
        let eq = StringEquality::EmptyIsNull;
        assert_eq!(
            diff_scalar(&AttributeValue::string(""), &AttributeValue::Null, &name(), eq),
            None
        );
        assert_eq!(
            diff_scalar(&AttributeValue::Null, &AttributeValue::string(""), &name(), eq),
            None
        );

        // Clearing a value through "" is a removal
        let op = diff_scalar(
            &AttributeValue::string(""),
            &AttributeValue::string("x"),
            &name(),
            eq,
        )
        .unwrap();
        assert!(op.values.is_empty());

        // Exact comparison still sends the empty string
        let op = diff_scalar(
            &AttributeValue::string(""),
            &AttributeValue::Null,
            &name(),
            StringEquality::Exact,
        )
        .unwrap();
        assert_eq!(op.values, vec![""]);
    }

    #[test]
    fn test_custom_equality() {
        fn case_insensitive(a: Option<&str>, b: Option<&str>) -> bool {
            a.map(str::to_ascii_lowercase) == b.map(str::to_ascii_lowercase)
        }
        let eq = StringEquality::Custom(case_insensitive);
        assert_eq!(
            diff_scalar(
                &AttributeValue::string("INFO"),
                &AttributeValue::string("info"),
                &name(),
                eq
            ),
            None
        );
        assert!(diff_scalar(
            &AttributeValue::string("debug"),
            &AttributeValue::string("info"),
            &name(),
            eq
        )
        .is_some());
    }

    #[test]
    #[should_panic(expected = "cannot diff")]
    fn test_scalar_kind_mismatch_panics() {
        diff_scalar(
            &AttributeValue::string("1"),
            &AttributeValue::int(1),
            &name(),
            StringEquality::Exact,
        );
    }

    #[test]
    #[should_panic(expected = "diff_string_set")]
    fn test_scalar_rejects_sets() {
        diff_scalar(
            &AttributeValue::string_set(["a"]),
            &AttributeValue::Null,
            &name(),
            StringEquality::Exact,
        );
    }

    #[test]
    #[should_panic(expected = "as a string set")]
    fn test_set_rejects_scalars() {
        diff_string_set(
            &AttributeValue::string_set(["a"]),
            &AttributeValue::string("a"),
            &name(),
        );
    }

    #[test]
    #[should_panic(expected = "expected Bool")]
    fn test_typed_helper_checks_kind() {
        let mut ops = OperationList::new();
        add_bool_operation_if_necessary(
            &mut ops,
            &AttributeValue::int(1),
            &AttributeValue::Null,
            &AttributeName::new("enabled"),
        );
    }

    #[test]
    fn test_set_diff_minimality() {
        let ops = diff_string_set(
            &AttributeValue::string_set(["a", "b"]),
            &AttributeValue::string_set(["b", "c"]),
            &AttributeName::new("include-filter"),
        );
        assert_eq!(
            ops.as_slice(),
            &[
                Operation::add(AttributeName::new("include-filter"), vec!["a".into()]),
                Operation::remove(AttributeName::new("include-filter"), vec!["c".into()]),
            ]
        );
    }

    #[test]
    fn test_set_diff_sorts_values() {
        let ops = diff_string_set(
            &AttributeValue::string_set(["z", "m", "a"]),
            &AttributeValue::Null,
            &name(),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].values, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_set_diff_ignores_order_and_duplicates() {
        let ops = diff_string_set(
            &AttributeValue::string_set(["b", "a", "a"]),
            &AttributeValue::string_set(["a", "b"]),
            &name(),
        );
        assert!(ops.is_empty());
    }

    #[test]
    fn test_set_null_is_empty() {
        assert!(diff_string_set(
            &AttributeValue::Null,
            &AttributeValue::string_set(Vec::<String>::new()),
            &name()
        )
        .is_empty());

        let ops = diff_string_set(
            &AttributeValue::Null,
            &AttributeValue::string_set(["x"]),
            &name(),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Remove);
    }

    #[test]
    fn test_helpers_keep_declaration_order() {
        let mut ops = OperationList::new();
        add_string_operation_if_necessary(
            &mut ops,
            &AttributeValue::string("new"),
            &AttributeValue::string("old"),
            &AttributeName::new("description"),
            StringEquality::Exact,
        );
        add_bool_operation_if_necessary(
            &mut ops,
            &AttributeValue::bool(true),
            &AttributeValue::bool(true),
            &AttributeName::new("enabled"),
        );
        add_int_operation_if_necessary(
            &mut ops,
            &AttributeValue::int(2),
            &AttributeValue::int(1),
            &AttributeName::new("cache-level"),
        );
        add_string_set_operations_if_necessary(
            &mut ops,
            &AttributeValue::string_set(["x"]),
            &AttributeValue::Null,
            &AttributeName::new("include-filter"),
        );

        let paths: Vec<_> = ops.iter().map(|op| op.attribute.as_str()).collect();
        assert_eq!(paths, vec!["description", "cache-level", "include-filter"]);
    }

    #[test]
    fn test_operation_wire_format() {
        let mut ops = OperationList::new();
        ops.push(Operation::set(AttributeName::new("description"), vec![]));
        ops.push(Operation::add(
            AttributeName::new("include-filter"),
            vec!["(objectClass=person)".into()],
        ));

        let json = serde_json::to_value(&ops).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"op": "replace", "path": "description", "value": []},
                {"op": "add", "path": "include-filter", "value": ["(objectClass=person)"]},
            ])
        );
    }

    #[test]
    fn test_apply_operations() {
        let mut attributes = WireAttributes::new();
        attributes.insert("description".into(), vec!["old".into()]);
        attributes.insert("include-filter".into(), vec!["b".into(), "c".into()]);

        let mut ops = OperationList::new();
        ops.push(Operation::set(AttributeName::new("description"), vec![]));
        ops.extend(diff_string_set(
            &AttributeValue::string_set(["a", "b"]),
            &AttributeValue::string_set(["b", "c"]),
            &AttributeName::new("include-filter"),
        ));
        ops.apply_to(&mut attributes);

        assert!(!attributes.contains_key("description"));
        assert_eq!(attributes["include-filter"], vec!["b", "a"]);
    }

    fn scalar_value() -> impl Strategy<Value = AttributeValue> {
        prop_oneof![
            Just(AttributeValue::Null),
            Just(AttributeValue::Unknown),
            "[a-c]{0,2}".prop_map(AttributeValue::string),
        ]
    }

    fn bool_value() -> impl Strategy<Value = AttributeValue> {
        prop_oneof![
            Just(AttributeValue::Null),
            Just(AttributeValue::Unknown),
            any::<bool>().prop_map(AttributeValue::bool),
        ]
    }

    fn int_value() -> impl Strategy<Value = AttributeValue> {
        prop_oneof![
            Just(AttributeValue::Null),
            Just(AttributeValue::Unknown),
            any::<i64>().prop_map(AttributeValue::int),
        ]
    }

    fn set_value() -> impl Strategy<Value = AttributeValue> {
        prop_oneof![
            Just(AttributeValue::Null),
            Just(AttributeValue::Unknown),
            proptest::collection::vec("[a-e]", 0..6).prop_map(AttributeValue::string_set),
        ]
    }

    fn wire_object(name: &AttributeName, value: &AttributeValue) -> WireAttributes {
        let mut attributes = WireAttributes::new();
        if let Some(values) = value.to_wire().filter(|v| !v.is_empty()) {
            attributes.insert(name.as_str().to_string(), values);
        }
        attributes
    }

    fn sorted(values: Option<&Vec<String>>) -> Vec<String> {
        let mut values = values.cloned().unwrap_or_default();
        values.sort();
        values
    }

    fn check_scalar_round_trip(desired: &AttributeValue, current: &AttributeValue) {
        let name = name();
        let mut attributes = wire_object(&name, current);
        let before = attributes.clone();
        if let Some(op) = diff_scalar(desired, current, &name, StringEquality::Exact) {
            op.apply_to(&mut attributes);
        }
        match desired.to_wire() {
            None => assert_eq!(attributes, before),
            Some(expected) => assert_eq!(sorted(attributes.get(name.as_str())), expected),
        }
    }

    proptest! {
        #[test]
        fn prop_scalar_idempotent(value in scalar_value()) {
            prop_assert_eq!(diff_scalar(&value, &value, &name(), StringEquality::Exact), None);
        }

        #[test]
        fn prop_string_round_trip(desired in scalar_value(), current in scalar_value()) {
            check_scalar_round_trip(&desired, &current);
        }

        #[test]
        fn prop_bool_round_trip(desired in bool_value(), current in bool_value()) {
            check_scalar_round_trip(&desired, &current);
        }

        #[test]
        fn prop_int_round_trip(desired in int_value(), current in int_value()) {
            check_scalar_round_trip(&desired, &current);
        }

        #[test]
        fn prop_set_round_trip(desired in set_value(), current in set_value()) {
            let name = AttributeName::new("include-filter");
            let mut attributes = wire_object(&name, &current);
            let before = attributes.clone();
            diff_string_set(&desired, &current, &name).apply_to(&mut attributes);
            match desired.to_wire() {
                None => prop_assert_eq!(attributes, before),
                Some(expected) => prop_assert_eq!(sorted(attributes.get(name.as_str())), expected),
            }
        }

        #[test]
        fn prop_set_diff_is_minimal(desired in set_value(), current in set_value()) {
            let ops = diff_string_set(&desired, &current, &name());
            prop_assert!(ops.len() <= 2);
            for op in &ops {
                prop_assert!(!op.values.is_empty());
                let mut values = op.values.clone();
                values.sort();
                values.dedup();
                prop_assert_eq!(&values, &op.values);
            }
            if ops.len() == 2 {
                prop_assert_eq!(ops[0].kind, OperationKind::Add);
                prop_assert_eq!(ops[1].kind, OperationKind::Remove);
            }
        }

        #[test]
        fn prop_deterministic(desired in set_value(), current in set_value()) {
            let first = serde_json::to_vec(&diff_string_set(&desired, &current, &name())).unwrap();
            let second = serde_json::to_vec(&diff_string_set(&desired, &current, &name())).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
