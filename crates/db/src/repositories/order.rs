use sqlx::{sqlite::SqliteRow, Row};

use boutiq_core::domain::customer::CustomerId;
use boutiq_core::domain::merchant::MerchantId;
use boutiq_core::domain::order::{Order, OrderId, OrderLine, OrderStatus, PaymentStatus};

use super::row::{parse_decimal, parse_timestamp};
use super::{OrderRepository, RepositoryError};
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, order_number, merchant_id, customer_id, items_json, \
     total_amount, status, delivery_address, payment_method, payment_status, notes, created_at";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn insert(&self, order: Order) -> Result<(), RepositoryError> {
        let items_json = serde_json::to_string(&order.items)
            .map_err(|error| RepositoryError::Decode(format!("encode items: {error}")))?;

        sqlx::query(
            "INSERT INTO customer_order (
                id, order_number, merchant_id, customer_id, items_json,
                total_amount, status, delivery_address, payment_method,
                payment_status, notes, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.order_number)
        .bind(&order.merchant_id.0)
        .bind(&order.customer_id.0)
        .bind(&items_json)
        .bind(order.total_amount.to_string())
        .bind(order.status.as_str())
        .bind(&order.delivery_address)
        .bind(&order.payment_method)
        .bind(order.payment_status.as_str())
        .bind(&order.notes)
        .bind(order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        merchant_id: &MerchantId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE merchant_id = ? AND id = ?"
        ))
        .bind(&merchant_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(order_from_row).transpose()
    }

    async fn list_for_merchant(
        &self,
        merchant_id: &MerchantId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM customer_order
                 WHERE merchant_id = ? AND status = ?
                 ORDER BY created_at DESC"
            ))
            .bind(&merchant_id.0)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM customer_order
                 WHERE merchant_id = ?
                 ORDER BY created_at DESC"
            ))
            .bind(&merchant_id.0)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(order_from_row).collect()
    }

    async fn update_status(
        &self,
        merchant_id: &MerchantId,
        id: &OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut order = self
            .find_by_id(merchant_id, id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("order `{}` not found", id.0)))?;

        order.transition_to(next)?;

        sqlx::query("UPDATE customer_order SET status = ? WHERE merchant_id = ? AND id = ?")
            .bind(order.status.as_str())
            .bind(&merchant_id.0)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(order)
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let items_raw = row.try_get::<String, _>("items_json")?;
    let items: Vec<OrderLine> = serde_json::from_str(&items_raw)
        .map_err(|error| RepositoryError::Decode(format!("decode items: {error}")))?;

    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    let payment_status_raw = row.try_get::<String, _>("payment_status")?;
    let payment_status = PaymentStatus::parse(&payment_status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment status `{payment_status_raw}`"))
    })?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        merchant_id: MerchantId(row.try_get("merchant_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        items,
        total_amount: parse_decimal("total_amount", row.try_get("total_amount")?)?,
        status,
        delivery_address: row.try_get("delivery_address")?,
        payment_method: row.try_get("payment_method")?,
        payment_status,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use boutiq_core::domain::customer::{Customer, CustomerId};
    use boutiq_core::domain::merchant::{Merchant, MerchantId, PhoneNumberId};
    use boutiq_core::domain::order::{Order, OrderId, OrderLine, OrderStatus, PaymentStatus};
    use boutiq_core::domain::product::ProductId;
    use boutiq_core::errors::DomainError;
    use boutiq_core::plans::PlanTier;

    use super::SqlOrderRepository;
    use crate::repositories::{
        CustomerRepository, MerchantRepository, OrderRepository, RepositoryError,
        SqlCustomerRepository, SqlMerchantRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let merchants = SqlMerchantRepository::new(pool.clone());
        merchants
            .save(Merchant {
                id: MerchantId("m-1".to_string()),
                name: "Chez Awa".to_string(),
                owner_phone: "22890000000".to_string(),
                phone_number_id: PhoneNumberId("pn-1".to_string()),
                whatsapp_token: String::from("wa-token").into(),
                business_description: String::new(),
                ai_persona: String::new(),
                city: "Lomé".to_string(),
                country: "Togo".to_string(),
                currency: "FCFA".to_string(),
                is_active: true,
                plan: PlanTier::Starter,
                subscription_expires_at: None,
                created_at: Utc::now(),
            })
            .await
            .expect("insert merchant");

        let customers = SqlCustomerRepository::new(pool.clone());
        let mut customer = Customer::new(MerchantId("m-1".to_string()), "22891112222");
        customer.id = CustomerId("c-1".to_string());
        customers.save(customer).await.expect("insert customer");

        pool
    }

    fn order(id: &str, number: &str) -> Order {
        Order {
            id: OrderId(id.to_string()),
            order_number: number.to_string(),
            merchant_id: MerchantId("m-1".to_string()),
            customer_id: CustomerId("c-1".to_string()),
            items: vec![OrderLine {
                product_id: ProductId("p-1".to_string()),
                name: "Pagne wax".to_string(),
                quantity: 2,
                unit_price: Decimal::from(1000),
                total: Decimal::from(2000),
            }],
            total_amount: Decimal::from(2000),
            status: OrderStatus::Pending,
            delivery_address: "Rue 1, Lomé".to_string(),
            payment_method: "mobile_money".to_string(),
            payment_status: PaymentStatus::Pending,
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_reload_preserves_line_items() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool);
        let merchant_id = MerchantId("m-1".to_string());

        let order = order("o-1", "CMD-20250301-AB12");
        repo.insert(order.clone()).await.expect("insert order");

        let found = repo
            .find_by_id(&merchant_id, &order.id)
            .await
            .expect("find order")
            .expect("order exists");
        assert_eq!(found.items, order.items);
        assert_eq!(found.total_amount, Decimal::from(2000));
        assert_eq!(found.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_order_number_is_rejected() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool);

        repo.insert(order("o-1", "CMD-20250301-AB12")).await.expect("first insert");
        let error = repo
            .insert(order("o-2", "CMD-20250301-AB12"))
            .await
            .expect_err("duplicate order number must fail");
        assert!(matches!(error, RepositoryError::Database(_)));
    }

    #[tokio::test]
    async fn status_update_applies_domain_transition() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool);
        let merchant_id = MerchantId("m-1".to_string());
        let id = OrderId("o-1".to_string());

        repo.insert(order("o-1", "CMD-20250301-AB12")).await.expect("insert order");

        let confirmed = repo
            .update_status(&merchant_id, &id, OrderStatus::Confirmed)
            .await
            .expect("pending -> confirmed");
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let error = repo
            .update_status(&merchant_id, &id, OrderStatus::Delivered)
            .await
            .expect_err("confirmed -> delivered skips steps");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::InvalidOrderTransition { .. })
        ));

        let reloaded = repo
            .find_by_id(&merchant_id, &id)
            .await
            .expect("reload")
            .expect("order exists");
        assert_eq!(reloaded.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_merchant() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool);

        repo.insert(order("o-1", "CMD-20250301-AB12")).await.expect("insert order");

        let other = MerchantId("m-2".to_string());
        let listed = repo.list_for_merchant(&other, None).await.expect("list orders");
        assert!(listed.is_empty());
    }
}
