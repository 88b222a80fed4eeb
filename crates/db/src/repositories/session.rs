use std::collections::BTreeMap;

use sqlx::{sqlite::SqliteRow, Row};

use boutiq_core::domain::customer::CustomerId;
use boutiq_core::domain::merchant::MerchantId;
use boutiq_core::domain::product::ProductId;
use boutiq_core::domain::session::{
    ConversationSession, SessionId, SessionMessage, SessionState,
};

use super::row::parse_timestamp;
use super::{RepositoryError, SessionRepository};
use crate::DbPool;

const SESSION_COLUMNS: &str =
    "id, merchant_id, customer_id, messages_json, cart_json, state, is_active, updated_at";

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_active(
        &self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM conversation_session
             WHERE merchant_id = ? AND customer_id = ? AND is_active = 1
             ORDER BY updated_at DESC
             LIMIT 1"
        ))
        .bind(&merchant_id.0)
        .bind(&customer_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn save(&self, session: ConversationSession) -> Result<(), RepositoryError> {
        let messages_json = serde_json::to_string(&session.messages)
            .map_err(|error| RepositoryError::Decode(format!("encode messages: {error}")))?;
        let cart: BTreeMap<&str, u32> =
            session.cart.iter().map(|(id, quantity)| (id.0.as_str(), *quantity)).collect();
        let cart_json = serde_json::to_string(&cart)
            .map_err(|error| RepositoryError::Decode(format!("encode cart: {error}")))?;

        sqlx::query(
            "INSERT INTO conversation_session (
                id, merchant_id, customer_id, messages_json, cart_json,
                state, is_active, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                messages_json = excluded.messages_json,
                cart_json = excluded.cart_json,
                state = excluded.state,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
        )
        .bind(&session.id.0)
        .bind(&session.merchant_id.0)
        .bind(&session.customer_id.0)
        .bind(&messages_json)
        .bind(&cart_json)
        .bind(session.state.as_str())
        .bind(session.is_active)
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn session_from_row(row: SqliteRow) -> Result<ConversationSession, RepositoryError> {
    let messages_raw = row.try_get::<String, _>("messages_json")?;
    let messages: Vec<SessionMessage> = serde_json::from_str(&messages_raw)
        .map_err(|error| RepositoryError::Decode(format!("decode messages: {error}")))?;

    let cart_raw = row.try_get::<String, _>("cart_json")?;
    let cart_entries: BTreeMap<String, u32> = serde_json::from_str(&cart_raw)
        .map_err(|error| RepositoryError::Decode(format!("decode cart: {error}")))?;
    let cart = cart_entries.into_iter().map(|(id, quantity)| (ProductId(id), quantity)).collect();

    let state_raw = row.try_get::<String, _>("state")?;
    let state = SessionState::parse(&state_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown session state `{state_raw}`")))?;

    Ok(ConversationSession {
        id: SessionId(row.try_get("id")?),
        merchant_id: MerchantId(row.try_get("merchant_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        messages,
        cart,
        state,
        is_active: row.try_get("is_active")?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
