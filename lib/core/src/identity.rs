//! Caller identity, resolved by the binary's bearer-token middleware.
//!
//! Business modules never touch tokens or sessions; they receive an
//! [`Identity`] from request extensions and decide based on its role.

use serde::{Deserialize, Serialize};

/// Role constants. Stored as-is in the users table.
pub mod role {
    pub const ADMIN: &str = "ADMIN";
    pub const CUSTOMER: &str = "CUSTOMER";
}

/// The resolved identity of the calling user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// User id from the accounts module.
    pub user_id: String,

    /// Role string ("ADMIN" or "CUSTOMER").
    pub role: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == role::ADMIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check() {
        let admin = Identity { user_id: "u1".into(), role: role::ADMIN.into() };
        let customer = Identity { user_id: "u2".into(), role: role::CUSTOMER.into() };
        assert!(admin.is_admin());
        assert!(!customer.is_admin());
    }
}
