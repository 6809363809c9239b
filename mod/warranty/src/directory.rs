//! Collaborator seam to the user directory.
//!
//! The warranty module does NOT depend on the accounts module. It only
//! knows this trait; the concrete implementation is injected at startup.

use portal_core::ServiceError;
use serde::Serialize;

/// Contact details of a registration owner, used for the CSV export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerContact {
    pub company: String,
    pub mobile: String,
    pub gst: String,
}

/// Pluggable user directory.
pub trait UserDirectory: Send + Sync {
    /// Whether the given user exists, is active, and may register serials.
    fn is_eligible_to_register(&self, user_id: &str) -> Result<bool, ServiceError>;

    /// Contact details for a user, if known.
    fn contact_info(&self, user_id: &str) -> Result<Option<OwnerContact>, ServiceError>;
}

/// A directory that accepts every user. Used for testing.
pub struct AllowAll;

impl UserDirectory for AllowAll {
    fn is_eligible_to_register(&self, _user_id: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }

    fn contact_info(&self, _user_id: &str) -> Result<Option<OwnerContact>, ServiceError> {
        Ok(None)
    }
}
