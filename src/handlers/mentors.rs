use crate::{
    database::connection::DbPool,
    middleware::auth::AuthenticatedUser,
    models::{
        mentor::{CreateMentorProfile, MentorError, MentorProfile},
        user::UserRole,
    },
    requests::mentor::CreateMentorProfileRequest,
    utils::helpers::ApiResponse,
};
use actix_web::{HttpResponse, Result, web};
use tracing::{error, info};
use uuid::Uuid;

pub async fn index(pool: web::Data<DbPool>) -> Result<HttpResponse> {
    match MentorProfile::find_all(&pool).await {
        Ok(profiles) => Ok(HttpResponse::Ok().json(ApiResponse::success(profiles))),
        Err(e) => {
            error!("Failed to fetch mentors: {}", e);
            Ok(HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                "Failed to fetch mentors".to_string(),
            )))
        }
    }
}

pub async fn show(pool: web::Data<DbPool>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let mentor_id = path.into_inner();

    match MentorProfile::find_by_id(&pool, mentor_id).await {
        Ok(Some(profile)) => Ok(HttpResponse::Ok().json(ApiResponse::success(profile))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ApiResponse::<()>::error(format!(
            "Mentor {} not found",
            mentor_id
        )))),
        Err(e) => {
            error!("Failed to fetch mentor {}: {}", mentor_id, e);
            Ok(HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                "Failed to fetch mentor".to_string(),
            )))
        }
    }
}

pub async fn create(
    pool: web::Data<DbPool>,
    request: web::Json<CreateMentorProfileRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("Creating mentor profile for user: {}", user.user_id);

    if user.user_role != UserRole::Mentor {
        return Ok(HttpResponse::Forbidden().json(ApiResponse::<()>::error(
            "Only mentors can create a mentor profile".to_string(),
        )));
    }

    let create_profile = CreateMentorProfile {
        user_id: user.user_id,
        hourly_rate: request.hourly_rate,
        experience_level: request.experience_level.clone(),
        bio: request.bio.clone(),
    };

    match MentorProfile::create(&pool, create_profile).await {
        Ok(profile) => {
            info!("Successfully created mentor profile: {}", profile.id);
            Ok(HttpResponse::Created().json(ApiResponse::success(profile)))
        }
        Err(e @ (MentorError::ProfileExists | MentorError::InvalidRate)) => {
            Ok(HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string())))
        }
        Err(MentorError::Database(e)) => {
            error!("Database error creating mentor profile: {}", e);
            Ok(HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                "Failed to create mentor profile".to_string(),
            )))
        }
    }
}
