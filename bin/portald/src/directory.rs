//! Bridges the accounts service into the warranty module's directory seam.

use std::sync::Arc;

use portal_accounts::service::AccountsService;
use portal_core::ServiceError;
use portal_warranty::directory::{OwnerContact, UserDirectory};

pub struct AccountsDirectory {
    accounts: Arc<AccountsService>,
}

impl AccountsDirectory {
    pub fn new(accounts: Arc<AccountsService>) -> Self {
        Self { accounts }
    }
}

impl UserDirectory for AccountsDirectory {
    fn is_eligible_to_register(&self, user_id: &str) -> Result<bool, ServiceError> {
        self.accounts.is_eligible_to_register(user_id)
    }

    fn contact_info(&self, user_id: &str) -> Result<Option<OwnerContact>, ServiceError> {
        match self.accounts.get_user(user_id) {
            Ok(user) => Ok(Some(OwnerContact {
                company: user.company,
                mobile: user.mobile,
                gst: user.gst.unwrap_or_default(),
            })),
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
