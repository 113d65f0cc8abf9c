use crate::models::user::UserRole;
use crate::services::auth::AuthService;
use actix_web::{
    Error, FromRequest, HttpRequest,
    dev::Payload,
    error::{ErrorInternalServerError, ErrorUnauthorized},
    http::header,
};
use std::future::{Ready, ready};
use tracing::error;
use uuid::Uuid;

/// Identity extracted from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub user_role: UserRole,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, Error> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ErrorUnauthorized("Missing authorization header"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ErrorUnauthorized("Invalid authorization header"))?;

    let auth_service = AuthService::new().map_err(|e| {
        error!("Failed to create auth service: {}", e);
        ErrorInternalServerError("Authentication service error")
    })?;

    let claims = auth_service
        .verify_token(token)
        .map_err(|_| ErrorUnauthorized("Invalid or expired token"))?;

    Ok(AuthenticatedUser {
        user_id: claims.sub,
        user_role: claims.role,
    })
}
