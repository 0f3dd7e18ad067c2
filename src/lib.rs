//! # dsconfig-provider
//!
//! Declarative management of a directory server's configuration objects
//! through its HTTP configuration API.
//!
//! Each managed object type is a [`resource::ConfigResource`]: a collection
//! on the server plus an attribute schema. Plans and states are JSON
//! attribute models. Updates never resend a whole object; the
//! [`operations`] compiler turns the difference between plan and state into
//! a minimal, ordered list of `replace`/`add`/`remove` operations, applied by
//! the server in a single request.
//!
//! ## Quick Start
//!
//! ```ignore
//! use dsconfig_provider::{DirectoryProvider, ProviderService};
//! use serde_json::json;
//!
//! let provider = DirectoryProvider::new(|config| MyRestClient::connect(config));
//! provider.configure(json!({
//!     "https_host": "https://localhost:1443",
//!     "username": "cn=Directory Manager",
//!     "password": "secret",
//! })).await?;
//!
//! let state = provider.create("dsconfig_entry_cache", json!({
//!     "name": "FIFO",
//!     "enabled": true,
//!     "cache_level": 10,
//! })).await?;
//! ```
//!
//! ## Diffing
//!
//! ```
//! use dsconfig_provider::operations::{diff_scalar, StringEquality};
//! use dsconfig_provider::value::{AttributeName, AttributeValue};
//!
//! let op = diff_scalar(
//!     &AttributeValue::string("Hourly archive"),
//!     &AttributeValue::string("Nightly archive"),
//!     &AttributeName::new("description"),
//!     StringEquality::Exact,
//! );
//! assert!(op.is_some());
//!
//! // Unknown values are never diffed.
//! let op = diff_scalar(
//!     &AttributeValue::Unknown,
//!     &AttributeValue::string("Nightly archive"),
//!     &AttributeName::new("description"),
//!     StringEquality::Exact,
//! );
//! assert!(op.is_none());
//! ```
//!
//! ## Provider Protocol
//!
//! [`ProviderService`] covers the calls a host makes:
//!
//! - **schema / metadata**: provider configuration and resource schemas
//! - **validate_provider_config / configure / stop**
//! - **validate_resource_config / plan**
//! - **create / read / update / delete**
//! - **import_resource / list_resources**

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod operations;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

// Re-export main types at crate root
pub use client::{ConfigApiClient, ConfigObject, ObjectPath};
pub use config::{ProviderConfig, ProviderContext};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use operations::{diff_scalar, diff_string_set, Operation, OperationKind, OperationList};
pub use provider::{DirectoryProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};
pub use value::{AttributeName, AttributeValue};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
