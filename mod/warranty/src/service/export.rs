//! Registration export — a CSV of all current registrations, with owner
//! contact details resolved through the user directory seam.

use std::collections::HashMap;

use portal_core::{ListParams, ServiceError};

use crate::model::SerialStatus;
use super::WarrantyService;
use super::ledger::SerialFilters;

const EXPORT_PAGE: usize = 500;

impl WarrantyService {
    /// Render every current registration as CSV. Unknown owners (for
    /// example deleted accounts) export with blank contact columns rather
    /// than failing the whole file.
    pub fn export_registrations_csv(&self) -> Result<Vec<u8>, ServiceError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "serial",
                "product",
                "company",
                "mobile",
                "gst",
                "registeredAt",
            ])
            .map_err(|e| ServiceError::Internal(format!("CSV write failed: {}", e)))?;

        let mut product_names: HashMap<String, String> = HashMap::new();
        let mut contacts: HashMap<String, Option<crate::directory::OwnerContact>> =
            HashMap::new();

        let mut offset = 0;
        loop {
            let page = self.list_serials(
                &ListParams {
                    limit: EXPORT_PAGE,
                    offset,
                },
                &SerialFilters {
                    status: Some(SerialStatus::Registered),
                    ..Default::default()
                },
            )?;
            if page.items.is_empty() {
                break;
            }
            offset += page.items.len();

            for record in &page.items {
                if !product_names.contains_key(&record.product_id) {
                    let name = self
                        .get_product(&record.product_id)
                        .map(|p| p.name)
                        .unwrap_or_default();
                    product_names.insert(record.product_id.clone(), name);
                }
                let product = product_names[&record.product_id].clone();

                let owner_id = record.owner_id.as_deref().unwrap_or_default();
                if !contacts.contains_key(owner_id) {
                    let c = self.directory.contact_info(owner_id)?;
                    contacts.insert(owner_id.to_string(), c);
                }
                let contact = contacts[owner_id].clone();
                let (company, mobile, gst) = match &contact {
                    Some(c) => (c.company.as_str(), c.mobile.as_str(), c.gst.as_str()),
                    None => ("", "", ""),
                };

                writer
                    .write_record([
                        record.serial.as_str(),
                        product.as_str(),
                        company,
                        mobile,
                        gst,
                        record.registered_at.as_deref().unwrap_or_default(),
                    ])
                    .map_err(|e| ServiceError::Internal(format!("CSV write failed: {}", e)))?;
            }
        }

        writer
            .into_inner()
            .map_err(|e| ServiceError::Internal(format!("CSV write failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::directory::{OwnerContact, UserDirectory};
    use crate::service::registration::EvidenceUpload;
    use crate::service::testutil::service_with_directory;
    use portal_core::ServiceError;

    struct FixedDirectory;

    impl UserDirectory for FixedDirectory {
        fn is_eligible_to_register(&self, _: &str) -> Result<bool, ServiceError> {
            Ok(true)
        }
        fn contact_info(&self, user_id: &str) -> Result<Option<OwnerContact>, ServiceError> {
            if user_id == "u1" {
                Ok(Some(OwnerContact {
                    company: "Acme Traders".into(),
                    mobile: "9876543210".into(),
                    gst: "29ABCDE1234F1Z5".into(),
                }))
            } else {
                Ok(None)
            }
        }
    }

    fn bill() -> EvidenceUpload {
        EvidenceUpload {
            filename: "bill.pdf".into(),
            bytes: b"pdf".to_vec(),
        }
    }

    #[test]
    fn exports_registered_serials_with_contacts() {
        let (_dir, svc) = service_with_directory(Arc::new(FixedDirectory));
        let p = svc.create_product("admin", "Router X", "").unwrap();
        svc.insert_available("SN-1", &p.id).unwrap();
        svc.insert_available("SN-2", &p.id).unwrap();
        svc.register_serial("u1", "SN-1", bill()).unwrap();

        let csv_bytes = svc.export_registrations_csv().unwrap();
        let text = String::from_utf8(csv_bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2); // header + one registration
        assert_eq!(lines[0], "serial,product,company,mobile,gst,registeredAt");
        assert!(lines[1].starts_with("SN-1,Router X,Acme Traders,9876543210,"));
    }

    #[test]
    fn unknown_owner_exports_blank_contact() {
        let (_dir, svc) = service_with_directory(Arc::new(FixedDirectory));
        let p = svc.create_product("admin", "Router X", "").unwrap();
        svc.insert_available("SN-1", &p.id).unwrap();
        svc.register_serial("u-deleted", "SN-1", bill()).unwrap();

        let text = String::from_utf8(svc.export_registrations_csv().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with("SN-1,Router X,,,,"));
    }

    #[test]
    fn empty_ledger_exports_header_only() {
        let (_dir, svc) = service_with_directory(Arc::new(FixedDirectory));
        let text = String::from_utf8(svc.export_registrations_csv().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
