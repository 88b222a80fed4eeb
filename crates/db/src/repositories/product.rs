use sqlx::{sqlite::SqliteRow, Row};

use boutiq_core::domain::merchant::MerchantId;
use boutiq_core::domain::product::{Product, ProductId};

use super::row::{parse_decimal, parse_u32};
use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str =
    "id, merchant_id, name, description, price, stock, category, is_available";

/// Bounded retries for a stock claim that loses the race between its
/// stock read and the guarded decrement.
const CLAIM_ATTEMPTS: u32 = 3;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list_available(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product
             WHERE merchant_id = ? AND is_available = 1 AND stock > 0
             ORDER BY category ASC, name ASC"
        ))
        .bind(&merchant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn find_by_id(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE merchant_id = ? AND id = ?"
        ))
        .bind(&merchant_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn search(
        &self,
        merchant_id: &MerchantId,
        query: &str,
    ) -> Result<Vec<Product>, RepositoryError> {
        let pattern = format!("%{}%", query.trim());
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product
             WHERE merchant_id = ? AND is_available = 1
               AND (name LIKE ? COLLATE NOCASE OR description LIKE ? COLLATE NOCASE)
             ORDER BY name ASC"
        ))
        .bind(&merchant_id.0)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn count_for_merchant(&self, merchant_id: &MerchantId) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product WHERE merchant_id = ?")
            .bind(&merchant_id.0)
            .fetch_one(&self.pool)
            .await?;

        parse_u32("count", count)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (
                id, merchant_id, name, description, price, stock, category, is_available
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                merchant_id = excluded.merchant_id,
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                stock = excluded.stock,
                category = excluded.category,
                is_available = excluded.is_available",
        )
        .bind(&product.id.0)
        .bind(&product.merchant_id.0)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(i64::from(product.stock))
        .bind(&product.category)
        .bind(product.is_available)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_stock(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
        requested: u32,
    ) -> Result<u32, RepositoryError> {
        if requested == 0 {
            return Ok(0);
        }

        for _ in 0..CLAIM_ATTEMPTS {
            let available: Option<i64> = sqlx::query_scalar(
                "SELECT stock FROM product WHERE merchant_id = ? AND id = ? AND is_available = 1",
            )
            .bind(&merchant_id.0)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

            let Some(available) = available else {
                return Ok(0);
            };
            let claim = requested.min(parse_u32("stock", available)?);
            if claim == 0 {
                return Ok(0);
            }

            // The guard re-validates the stock level inside one atomic
            // UPDATE; availability flips off in the same statement that
            // reaches zero.
            let updated = sqlx::query(
                "UPDATE product
                    SET stock = stock - ?3,
                        is_available = CASE WHEN stock - ?3 > 0 THEN 1 ELSE 0 END
                  WHERE merchant_id = ?1 AND id = ?2 AND stock >= ?3",
            )
            .bind(&merchant_id.0)
            .bind(&id.0)
            .bind(i64::from(claim))
            .execute(&self.pool)
            .await?;

            if updated.rows_affected() == 1 {
                return Ok(claim);
            }
            // Lost a race with a concurrent claim; re-read and retry.
        }

        Ok(0)
    }

    async fn release_stock(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return Ok(());
        }

        sqlx::query(
            "UPDATE product SET stock = stock + ?, is_available = 1
              WHERE merchant_id = ? AND id = ?",
        )
        .bind(i64::from(quantity))
        .bind(&merchant_id.0)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        merchant_id: MerchantId(row.try_get("merchant_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: parse_decimal("price", row.try_get("price")?)?,
        stock: parse_u32("stock", row.try_get("stock")?)?,
        category: row.try_get("category")?,
        is_available: row.try_get("is_available")?,
    })
}
