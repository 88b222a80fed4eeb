use secrecy::ExposeSecret;
use sqlx::{sqlite::SqliteRow, Row};

use boutiq_core::domain::merchant::{Merchant, MerchantId, PhoneNumberId};
use boutiq_core::plans::PlanTier;

use super::row::{parse_optional_timestamp, parse_timestamp};
use super::{MerchantRepository, RepositoryError};
use crate::DbPool;

const MERCHANT_COLUMNS: &str = "id, name, owner_phone, phone_number_id, whatsapp_token, \
     business_description, ai_persona, city, country, currency, is_active, plan, \
     subscription_expires_at, created_at";

pub struct SqlMerchantRepository {
    pool: DbPool,
}

impl SqlMerchantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MerchantRepository for SqlMerchantRepository {
    async fn find_active_by_phone_number_id(
        &self,
        phone_number_id: &PhoneNumberId,
    ) -> Result<Option<Merchant>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchant WHERE phone_number_id = ? AND is_active = 1"
        ))
        .bind(&phone_number_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(merchant_from_row).transpose()
    }

    async fn find_by_id(&self, id: &MerchantId) -> Result<Option<Merchant>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {MERCHANT_COLUMNS} FROM merchant WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(merchant_from_row).transpose()
    }

    async fn save(&self, merchant: Merchant) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO merchant (
                id, name, owner_phone, phone_number_id, whatsapp_token,
                business_description, ai_persona, city, country, currency,
                is_active, plan, subscription_expires_at, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                owner_phone = excluded.owner_phone,
                phone_number_id = excluded.phone_number_id,
                whatsapp_token = excluded.whatsapp_token,
                business_description = excluded.business_description,
                ai_persona = excluded.ai_persona,
                city = excluded.city,
                country = excluded.country,
                currency = excluded.currency,
                is_active = excluded.is_active,
                plan = excluded.plan,
                subscription_expires_at = excluded.subscription_expires_at",
        )
        .bind(&merchant.id.0)
        .bind(&merchant.name)
        .bind(&merchant.owner_phone)
        .bind(&merchant.phone_number_id.0)
        .bind(merchant.whatsapp_token.expose_secret())
        .bind(&merchant.business_description)
        .bind(&merchant.ai_persona)
        .bind(&merchant.city)
        .bind(&merchant.country)
        .bind(&merchant.currency)
        .bind(merchant.is_active)
        .bind(merchant.plan.as_str())
        .bind(merchant.subscription_expires_at.map(|value| value.to_rfc3339()))
        .bind(merchant.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn merchant_from_row(row: SqliteRow) -> Result<Merchant, RepositoryError> {
    Ok(Merchant {
        id: MerchantId(row.try_get("id")?),
        name: row.try_get("name")?,
        owner_phone: row.try_get("owner_phone")?,
        phone_number_id: PhoneNumberId(row.try_get("phone_number_id")?),
        whatsapp_token: row.try_get::<String, _>("whatsapp_token")?.into(),
        business_description: row.try_get("business_description")?,
        ai_persona: row.try_get("ai_persona")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        currency: row.try_get("currency")?,
        is_active: row.try_get("is_active")?,
        plan: PlanTier::parse_or_starter(&row.try_get::<String, _>("plan")?),
        subscription_expires_at: parse_optional_timestamp(
            "subscription_expires_at",
            row.try_get("subscription_expires_at")?,
        )?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
