use crate::database::connection::DbPool;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MentorError {
    #[error("This user already has a mentor profile")]
    ProfileExists,
    #[error("Hourly rate must be greater than zero")]
    InvalidRate,
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hourly_rate: Decimal,
    pub experience_level: Option<String>,
    pub bio: Option<String>,
    pub is_verified: bool,
    pub total_sessions: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMentorProfile {
    pub user_id: Uuid,
    pub hourly_rate: Decimal,
    pub experience_level: Option<String>,
    pub bio: Option<String>,
}

impl MentorProfile {
    pub async fn create(pool: &DbPool, profile: CreateMentorProfile) -> Result<Self, MentorError> {
        if profile.hourly_rate <= Decimal::ZERO {
            return Err(MentorError::InvalidRate);
        }

        let now = Utc::now();

        let profile = sqlx::query_as::<_, MentorProfile>(
            "INSERT INTO mentor_profiles (id, user_id, hourly_rate, experience_level, bio, is_verified, total_sessions, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, false, 0, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(profile.user_id)
        .bind(profile.hourly_rate)
        .bind(profile.experience_level)
        .bind(profile.bio)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => MentorError::ProfileExists,
            _ => MentorError::Database(e),
        })?;

        Ok(profile)
    }

    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, MentorProfile>(
            "SELECT * FROM mentor_profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    pub async fn find_all(pool: &DbPool) -> Result<Vec<Self>, sqlx::Error> {
        let profiles = sqlx::query_as::<_, MentorProfile>(
            "SELECT * FROM mentor_profiles ORDER BY created_at DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(profiles)
    }
}
