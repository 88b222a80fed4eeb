use sqlx::Row;

use boutiq_core::domain::merchant::MerchantId;

use super::{MessageUsageRepository, RepositoryError};
use crate::DbPool;

/// Monthly assistant-reply counter, one row per merchant and `YYYY-MM`
/// bucket. The upsert keeps the increment atomic under concurrent
/// message handling.
pub struct SqlMessageUsageRepository {
    pool: DbPool,
}

impl SqlMessageUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageUsageRepository for SqlMessageUsageRepository {
    async fn assistant_messages_for_month(
        &self,
        merchant_id: &MerchantId,
        month: &str,
    ) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT assistant_messages FROM message_usage WHERE merchant_id = ? AND month = ?",
        )
        .bind(&merchant_id.0)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let count: i64 = row.try_get("assistant_messages")?;
                u32::try_from(count).map_err(|_| {
                    RepositoryError::Decode(format!("negative usage counter `{count}`"))
                })
            }
            None => Ok(0),
        }
    }

    async fn record_assistant_message(
        &self,
        merchant_id: &MerchantId,
        month: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO message_usage (merchant_id, month, assistant_messages)
             VALUES (?, ?, 1)
             ON CONFLICT(merchant_id, month)
             DO UPDATE SET assistant_messages = assistant_messages + 1",
        )
        .bind(&merchant_id.0)
        .bind(month)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
