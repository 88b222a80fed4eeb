use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_MERCHANT_ID: &str = "merchant-demo-001";
const SEED_PHONE_NUMBER_ID: &str = "480000000000001";

const SEED_PRODUCT_IDS: &[&str] =
    &["product-demo-001", "product-demo-002", "product-demo-003", "product-demo-004"];

/// Deterministic demo storefront: one active merchant and a small
/// catalog with an in-stock, a low-stock and a sold-out product.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Load the demo storefront. Idempotent, safe to re-run.
    pub async fn load(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Verify the seeded rows match the contract this module promises.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let merchant_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM merchant WHERE id = ?1 AND phone_number_id = ?2 AND is_active = 1)",
        )
        .bind(SEED_MERCHANT_ID)
        .bind(SEED_PHONE_NUMBER_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("merchant-active", merchant_ok == 1));

        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM product WHERE merchant_id = ?1")
                .bind(SEED_MERCHANT_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("product-count", product_count == SEED_PRODUCT_IDS.len() as i64));

        let sold_out_hidden: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM product WHERE id = 'product-demo-003' AND stock = 0 AND is_available = 0)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("sold-out-hidden", sold_out_hidden == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the demo storefront from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM customer_order WHERE merchant_id = ?1")
            .bind(SEED_MERCHANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversation_session WHERE merchant_id = ?1")
            .bind(SEED_MERCHANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM customer WHERE merchant_id = ?1")
            .bind(SEED_MERCHANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message_usage WHERE merchant_id = ?1")
            .bind(SEED_MERCHANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product WHERE merchant_id = ?1")
            .bind(SEED_MERCHANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM merchant WHERE id = ?1")
            .bind(SEED_MERCHANT_ID)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
