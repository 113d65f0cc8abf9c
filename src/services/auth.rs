use crate::database::connection::DbPool;
use crate::models::auth::Claims;
use crate::models::user::User;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct AuthService {
    secret: String,
}

impl AuthService {
    pub fn new() -> Result<Self, AuthError> {
        let secret = env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)?;
        Ok(Self::with_secret(secret))
    }

    pub fn with_secret(secret: String) -> Self {
        Self { secret }
    }

    pub fn generate_token(&self, user: &User) -> Result<String, AuthError> {
        let claims = Claims::new(user);
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    pub async fn authenticate_user(
        &self,
        pool: &DbPool,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        let user = User::authenticate(pool, email, password).await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            fullname: "Ada Mentee".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            user_role: UserRole::Mentee,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let service = AuthService::with_secret("test-secret".to_string());
        let user = sample_user();

        let token = service.generate_token(&user).unwrap();
        let claims = service.verify_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, UserRole::Mentee);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let service = AuthService::with_secret("test-secret".to_string());
        let other = AuthService::with_secret("other-secret".to_string());
        let token = other.generate_token(&sample_user()).unwrap();

        assert!(matches!(service.verify_token(&token), Err(AuthError::Token(_))));
    }
}
