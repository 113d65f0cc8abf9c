use crate::database::connection::DbPool;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("A user with this email already exists")]
    EmailTaken,
    #[error("Password hashing failed")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Mentee,
    Mentor,
    Admin,
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mentee" => Ok(UserRole::Mentee),
            "mentor" => Ok(UserRole::Mentor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub user_role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub user_role: UserRole,
}

impl User {
    pub async fn create(pool: &DbPool, user: CreateUser) -> Result<Self, UserError> {
        let now = Utc::now();
        let hashed_password = hash(user.password.as_bytes(), DEFAULT_COST)?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, fullname, email, password_hash, user_role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user.fullname)
        .bind(user.email)
        .bind(hashed_password)
        .bind(user.user_role)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => UserError::EmailTaken,
            _ => UserError::Database(e),
        })?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub fn verify_password(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, &self.password_hash)
    }

    pub async fn authenticate(
        pool: &DbPool,
        email: &str,
        password: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        if let Some(user) = Self::find_by_email(pool, email).await? {
            if user.verify_password(password).unwrap_or(false) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }
}
