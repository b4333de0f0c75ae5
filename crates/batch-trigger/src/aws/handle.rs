//! Provider handles for provisioned resources

use batch_trigger_common::ResourceKind;
use serde::Serialize;
use std::fmt;

/// Identifier returned by the provider for a created or pre-existing resource.
///
/// `id` is whatever the provider uses to address the resource (launch template
/// ID, Batch ARN, EC2 instance ID); `name` is the name it was created under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.name, self.id)
    }
}
