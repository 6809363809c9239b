//! Inventory reads — derived counts over the ledger, never stored.

use portal_core::ServiceError;
use portal_sql::Value;
use serde::Serialize;

use super::WarrantyService;
use super::ledger::with_retry;

/// Per-product stock view. `available` is always derived so the three
/// numbers cannot drift apart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInventory {
    pub product_id: String,
    pub name: String,
    pub active: bool,
    pub uploaded: i64,
    pub assigned: i64,
    pub available: i64,
}

/// Portal-wide totals for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub products: i64,
    pub uploaded: i64,
    pub assigned: i64,
    pub available: i64,
}

impl WarrantyService {
    /// Stock levels for every product, including products with no serials
    /// yet.
    pub fn inventory(&self) -> Result<Vec<ProductInventory>, ServiceError> {
        let rows = with_retry(|| {
            self.sql.query(
                "SELECT p.id as id, p.name as name, p.active as active,
                        COUNT(s.id) as uploaded,
                        COALESCE(SUM(CASE WHEN s.status = 'REGISTERED' THEN 1 ELSE 0 END), 0) as assigned
                 FROM products p
                 LEFT JOIN serials s ON s.product_id = p.id
                 GROUP BY p.id
                 ORDER BY p.name",
                &[],
            )
        })?;

        let mut out = Vec::new();
        for row in &rows {
            let uploaded = row.get_i64("uploaded").unwrap_or(0);
            let assigned = row.get_i64("assigned").unwrap_or(0);
            out.push(ProductInventory {
                product_id: row
                    .get_str("id")
                    .ok_or_else(|| ServiceError::Internal("missing id column".into()))?
                    .to_string(),
                name: row.get_str("name").unwrap_or_default().to_string(),
                active: row.get_i64("active").unwrap_or(1) != 0,
                uploaded,
                assigned,
                available: uploaded.saturating_sub(assigned),
            });
        }
        Ok(out)
    }

    /// Stock levels for a single product.
    pub fn product_inventory(&self, product_id: &str) -> Result<ProductInventory, ServiceError> {
        let product = self.get_product(product_id)?;
        let counts = self.counts_by_product(product_id)?;
        Ok(ProductInventory {
            product_id: product.id,
            name: product.name,
            active: product.active,
            uploaded: counts.uploaded,
            assigned: counts.assigned,
            available: counts.uploaded.saturating_sub(counts.assigned),
        })
    }

    /// Portal-wide totals.
    pub fn inventory_summary(&self) -> Result<InventorySummary, ServiceError> {
        let products = with_retry(|| {
            self.sql
                .query("SELECT COUNT(*) as cnt FROM products", &[])
        })?
        .first()
        .and_then(|r| r.get_i64("cnt"))
        .unwrap_or(0);

        let rows = with_retry(|| {
            self.sql.query(
                "SELECT COUNT(*) as uploaded,
                        COALESCE(SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END), 0) as assigned
                 FROM serials",
                &[Value::Text("REGISTERED".into())],
            )
        })?;
        let uploaded = rows.first().and_then(|r| r.get_i64("uploaded")).unwrap_or(0);
        let assigned = rows.first().and_then(|r| r.get_i64("assigned")).unwrap_or(0);

        Ok(InventorySummary {
            products,
            uploaded,
            assigned,
            available: uploaded.saturating_sub(assigned),
        })
    }
}
