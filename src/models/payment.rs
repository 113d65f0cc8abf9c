use crate::database::connection::DbPool;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("A payment for intent {intent_id} already exists")]
    DuplicateIntent { intent_id: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// One external-processor transaction. Append-mostly: rows are created when
/// an intent is initiated and only their status changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
}

impl Payment {
    pub async fn insert<'e, E>(executor: E, payment: NewPayment) -> Result<Self, PaymentError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let now = Utc::now();
        let intent_id = payment.payment_intent_id.clone();

        let payment = sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (id, booking_id, user_id, payment_intent_id, amount, currency, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(payment.booking_id)
        .bind(payment.user_id)
        .bind(payment.payment_intent_id)
        .bind(payment.amount)
        .bind(payment.currency)
        .bind(payment.status)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PaymentError::DuplicateIntent { intent_id }
            }
            _ => PaymentError::Database(e),
        })?;

        Ok(payment)
    }

    pub async fn create(pool: &DbPool, payment: NewPayment) -> Result<Self, PaymentError> {
        Self::insert(pool, payment).await
    }

    pub async fn find_by_intent_for_user(
        pool: &DbPool,
        intent_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Self>, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE payment_intent_id = $1 AND user_id = $2",
        )
        .bind(intent_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(payment)
    }

    pub async fn mark_status(
        pool: &DbPool,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Self, PaymentError> {
        let payment = sqlx::query_as::<_, Payment>(
            "UPDATE payments SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(payment)
    }
}
