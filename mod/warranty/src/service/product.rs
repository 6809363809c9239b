//! Product catalog CRUD. Deleting a product is guarded: once serials have
//! been uploaded for it, the product can only be deactivated.

use portal_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use portal_sql::{Row, Value};
use serde_json::json;

use crate::model::{Product, action};
use super::WarrantyService;
use super::ledger::with_retry;

const PRODUCT_COLUMNS: &str = "id, name, description, active, create_at, update_at";

fn product_from_row(row: &Row) -> Result<Product, ServiceError> {
    Ok(Product {
        id: row
            .get_str("id")
            .ok_or_else(|| ServiceError::Internal("missing id column".into()))?
            .to_string(),
        name: row.get_str("name").unwrap_or_default().to_string(),
        description: row.get_str("description").map(String::from),
        active: row.get_i64("active").unwrap_or(1) != 0,
        create_at: row.get_str("create_at").map(String::from),
        update_at: row.get_str("update_at").map(String::from),
    })
}

impl WarrantyService {
    pub fn create_product(
        &self,
        actor: &str,
        name: &str,
        description: &str,
    ) -> Result<Product, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("product name is required".into()));
        }
        let description = match description.trim() {
            "" => None,
            d => Some(d.to_string()),
        };

        let id = new_id();
        let now = now_rfc3339();
        with_retry(|| {
            self.sql.exec(
                "INSERT INTO products (id, name, description, active, create_at, update_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                &[
                    Value::Text(id.clone()),
                    Value::Text(name.to_string()),
                    description
                        .clone()
                        .map(Value::Text)
                        .unwrap_or(Value::Null),
                    Value::Text(now.clone()),
                ],
            )
        })?;

        self.audit.record(
            actor,
            action::CREATE_PRODUCT,
            "product",
            &id,
            json!({ "name": name }),
        );

        Ok(Product {
            id,
            name: name.to_string(),
            description,
            active: true,
            create_at: Some(now.clone()),
            update_at: Some(now),
        })
    }

    pub fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let rows = with_retry(|| self.sql.query(&sql, &[Value::Text(id.to_string())]))?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("product '{}' not found", id)))?;
        product_from_row(row)
    }

    pub fn update_product(
        &self,
        actor: &str,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        active: Option<bool>,
    ) -> Result<Product, ServiceError> {
        let current = self.get_product(id)?;

        let name = match name {
            Some(n) if n.trim().is_empty() => {
                return Err(ServiceError::Validation("product name is required".into()));
            }
            Some(n) => n.trim().to_string(),
            None => current.name,
        };
        let description = match description.map(str::trim) {
            Some("") => None,
            Some(d) => Some(d.to_string()),
            None => current.description,
        };
        let active = active.unwrap_or(current.active);

        let now = now_rfc3339();
        with_retry(|| {
            self.sql.exec(
                "UPDATE products SET name = ?1, description = ?2, active = ?3, update_at = ?4
                 WHERE id = ?5",
                &[
                    Value::Text(name.clone()),
                    description
                        .clone()
                        .map(Value::Text)
                        .unwrap_or(Value::Null),
                    Value::Integer(active as i64),
                    Value::Text(now.clone()),
                    Value::Text(id.to_string()),
                ],
            )
        })?;

        self.audit.record(
            actor,
            action::UPDATE_PRODUCT,
            "product",
            id,
            json!({ "name": name, "active": active }),
        );

        self.get_product(id)
    }

    /// Delete a product that has no serials. A product with uploaded
    /// serials is part of the ledger's history and cannot be removed.
    pub fn delete_product(&self, actor: &str, id: &str) -> Result<(), ServiceError> {
        self.get_product(id)?;

        let counts = self.counts_by_product(id)?;
        if counts.uploaded > 0 {
            return Err(ServiceError::Conflict(format!(
                "product '{}' has {} serials on record; deactivate it instead",
                id, counts.uploaded
            )));
        }

        with_retry(|| {
            self.sql.exec(
                "DELETE FROM products WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
        })?;

        self.audit.record(
            actor,
            action::DELETE_PRODUCT,
            "product",
            id,
            json!({}),
        );
        Ok(())
    }

    pub fn list_products(
        &self,
        params: &ListParams,
        active_only: bool,
    ) -> Result<ListResult<Product>, ServiceError> {
        let limit = params.limit.min(500);
        let where_sql = if active_only { " WHERE active = 1" } else { "" };

        let count_sql = format!("SELECT COUNT(*) as cnt FROM products{}", where_sql);
        let total = with_retry(|| self.sql.query(&count_sql, &[]))?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let sql = format!(
            "SELECT {} FROM products{} ORDER BY name LIMIT ?1 OFFSET ?2",
            PRODUCT_COLUMNS, where_sql
        );
        let rows = with_retry(|| {
            self.sql.query(
                &sql,
                &[
                    Value::Integer(limit as i64),
                    Value::Integer(params.offset as i64),
                ],
            )
        })?;

        let mut items = Vec::new();
        for row in &rows {
            items.push(product_from_row(row)?);
        }
        Ok(ListResult { items, total })
    }
}
