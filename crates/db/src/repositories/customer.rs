use sqlx::{sqlite::SqliteRow, Row};

use boutiq_core::domain::customer::{Customer, CustomerId};
use boutiq_core::domain::merchant::MerchantId;

use super::row::{parse_decimal, parse_optional_timestamp, parse_timestamp, parse_u32};
use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, merchant_id, whatsapp_number, name, total_orders, \
     total_spent, last_interaction, last_order_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_whatsapp_number(
        &self,
        merchant_id: &MerchantId,
        whatsapp_number: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE merchant_id = ? AND whatsapp_number = ?"
        ))
        .bind(&merchant_id.0)
        .bind(whatsapp_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer (
                id, merchant_id, whatsapp_number, name, total_orders,
                total_spent, last_interaction, last_order_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                total_orders = excluded.total_orders,
                total_spent = excluded.total_spent,
                last_interaction = excluded.last_interaction,
                last_order_at = excluded.last_order_at",
        )
        .bind(&customer.id.0)
        .bind(&customer.merchant_id.0)
        .bind(&customer.whatsapp_number)
        .bind(customer.name.as_deref())
        .bind(i64::from(customer.total_orders))
        .bind(customer.total_spent.to_string())
        .bind(customer.last_interaction.to_rfc3339())
        .bind(customer.last_order_at.map(|value| value.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        merchant_id: MerchantId(row.try_get("merchant_id")?),
        whatsapp_number: row.try_get("whatsapp_number")?,
        name: row.try_get("name")?,
        total_orders: parse_u32("total_orders", row.try_get("total_orders")?)?,
        total_spent: parse_decimal("total_spent", row.try_get("total_spent")?)?,
        last_interaction: parse_timestamp("last_interaction", row.try_get("last_interaction")?)?,
        last_order_at: parse_optional_timestamp("last_order_at", row.try_get("last_order_at")?)?,
    })
}
