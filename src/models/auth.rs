use crate::models::user::{User, UserRole};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub user_role: UserRole,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            user_role: user.user_role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64, // expiration time
    pub iat: i64, // issued at
}

impl Claims {
    pub fn new(user: &User) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.user_role,
            exp: now + (24 * 60 * 60), // 24 hours
            iat: now,
        }
    }
}
