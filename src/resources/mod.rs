//! Configuration object types managed by the provider.

use std::sync::Arc;

use crate::resource::ConfigResource;

pub mod change_subscription;
pub mod entry_cache;
pub mod log_file_rotation_listener;

pub use change_subscription::ChangeSubscription;
pub use entry_cache::FifoEntryCache;
pub use log_file_rotation_listener::{
    LogFileRotationListener, LogFileRotationListenerResource, RotationListenerKind,
    RotationListenerType,
};

/// Every resource type shipped with the provider, in registration order.
pub fn all() -> Vec<Arc<dyn ConfigResource>> {
    vec![
        Arc::new(ChangeSubscription),
        Arc::new(FifoEntryCache),
        Arc::new(LogFileRotationListenerResource),
    ]
}
