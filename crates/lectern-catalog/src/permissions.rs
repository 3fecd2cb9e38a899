use lectern_core::types::Role;

use crate::error::{CatalogError, Result};

/// Every editorial capability, checked in one place. Adding a variant here
/// forces the compiler to make `check()` decide on it for every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadCatalog,
    EditContent,
    ScheduleContent,
    PublishContent,
    DeleteContent,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ReadCatalog => "read_catalog",
            Capability::EditContent => "edit_content",
            Capability::ScheduleContent => "schedule_content",
            Capability::PublishContent => "publish_content",
            Capability::DeleteContent => "delete_content",
        }
    }
}

/// Result of a capability check. Callers pattern-match this when they need
/// the reason, or use [`PermissionChecker::require`] to get an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Allowed,
    Denied { reason: String },
}

impl PermissionCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionCheck::Allowed)
    }
}

pub struct PermissionChecker;

impl PermissionChecker {
    /// Evaluate whether `role` may exercise `capability`.
    ///
    /// Admin holds every capability. Editors manage content but cannot
    /// delete it. Viewers only read.
    pub fn check(role: Role, capability: Capability) -> PermissionCheck {
        let allowed = match role {
            Role::Admin => true,
            Role::Editor => match capability {
                Capability::ReadCatalog
                | Capability::EditContent
                | Capability::ScheduleContent
                | Capability::PublishContent => true,
                Capability::DeleteContent => false,
            },
            Role::Viewer => matches!(capability, Capability::ReadCatalog),
        };

        if allowed {
            PermissionCheck::Allowed
        } else {
            PermissionCheck::Denied {
                reason: format!("role '{role}' lacks {}", capability.as_str()),
            }
        }
    }

    /// Like [`check`](Self::check) but converts a denial into an error.
    pub fn require(role: Role, capability: Capability) -> Result<()> {
        match Self::check(role, capability) {
            PermissionCheck::Allowed => Ok(()),
            PermissionCheck::Denied { reason } => Err(CatalogError::PermissionDenied(reason)),
        }
    }
}
