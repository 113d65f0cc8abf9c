use crate::{
    database::connection::DbPool,
    models::{
        auth::{AuthResponse, UserInfo},
        user::{CreateUser, User, UserError, UserRole},
    },
    requests::auth::{LoginRequest, RegisterRequest},
    services::auth::AuthService,
    utils::helpers::ApiResponse,
};
use actix_web::{HttpResponse, Result, web};
use tracing::error;

pub async fn register(
    pool: web::Data<DbPool>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let auth_service = AuthService::new().map_err(|e| {
        error!("Failed to create auth service: {}", e);
        actix_web::error::ErrorInternalServerError("Authentication service error")
    })?;

    let user_role = request
        .user_role
        .as_deref()
        .and_then(|role| role.parse().ok())
        .unwrap_or(UserRole::Mentee);

    let create_user = CreateUser {
        fullname: request.fullname.clone(),
        email: request.email.clone(),
        password: request.password.clone(),
        user_role,
    };

    let user = match User::create(&pool, create_user).await {
        Ok(user) => user,
        Err(UserError::EmailTaken) => {
            return Ok(HttpResponse::BadRequest()
                .json(ApiResponse::<()>::error(UserError::EmailTaken.to_string())));
        }
        Err(e) => {
            error!("Failed to create user: {}", e);
            return Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to create user")));
        }
    };

    let token = auth_service.generate_token(&user).map_err(|e| {
        error!("Failed to generate token: {}", e);
        actix_web::error::ErrorInternalServerError("Failed to generate token")
    })?;

    let response = AuthResponse {
        token,
        user: UserInfo::from(&user),
    };

    Ok(HttpResponse::Created().json(ApiResponse::success(response)))
}

pub async fn login(
    pool: web::Data<DbPool>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let auth_service = AuthService::new().map_err(|e| {
        error!("Failed to create auth service: {}", e);
        actix_web::error::ErrorInternalServerError("Authentication service error")
    })?;

    let user = auth_service
        .authenticate_user(&pool, &request.email, &request.password)
        .await
        .map_err(|e| {
            error!("Authentication error: {}", e);
            actix_web::error::ErrorInternalServerError("Authentication error")
        })?
        .ok_or_else(|| {
            error!("Invalid credentials for user: {}", request.email);
            actix_web::error::ErrorUnauthorized("Invalid credentials")
        })?;

    let token = auth_service.generate_token(&user).map_err(|e| {
        error!("Failed to generate token: {}", e);
        actix_web::error::ErrorInternalServerError("Failed to generate token")
    })?;

    let response = AuthResponse {
        token,
        user: UserInfo::from(&user),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}
