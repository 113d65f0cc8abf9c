use crate::{
    database::connection::DbPool,
    middleware::auth::AuthenticatedUser,
    models::{
        booking::{Booking, BookingActor, BookingError, BookingScope},
        mentor::MentorProfile,
        user::{User, UserRole},
    },
    requests::booking::{ConfirmBookingRequest, CreateBookingRequest},
    requests::payment::ConfirmPaymentRequest,
    services::{
        email::Notifier,
        notifications::{
            StatusChange, notify_booking_confirmed, notify_booking_requested,
            notify_status_change,
        },
        payments::PaymentBridge,
    },
    utils::{
        clock::{Clock, SharedClock},
        helpers::ApiResponse,
    },
};
use actix_web::{HttpResponse, Result, web};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::payments::bridge_error_response;

pub(crate) fn booking_error_response(e: &BookingError) -> HttpResponse {
    match e {
        BookingError::NotFound { .. } | BookingError::MentorNotFound { .. } => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error(e.to_string()))
        }
        BookingError::NotMentor { .. } | BookingError::NotParty => {
            HttpResponse::Forbidden().json(ApiResponse::<()>::error(e.to_string()))
        }
        BookingError::InvalidTransition { .. } | BookingError::Validation(_) => {
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()))
        }
        BookingError::Database(err) => {
            error!("Database error: {}", err);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Database error"))
        }
    }
}

fn scope_for(user: &AuthenticatedUser) -> BookingScope {
    match user.user_role {
        UserRole::Admin => BookingScope::All,
        UserRole::Mentor => BookingScope::MentorUser(user.user_id),
        UserRole::Mentee => BookingScope::Mentee(user.user_id),
    }
}

/// Looks up (mentee, mentor user) for notification purposes; a missing
/// party is logged and skipped, it never fails the request.
pub(crate) async fn load_parties(pool: &DbPool, booking: &Booking) -> Option<(User, User)> {
    let mentee = match User::find_by_id(pool, booking.mentee_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Mentee {} missing for booking {}", booking.mentee_id, booking.id);
            return None;
        }
        Err(e) => {
            error!("Failed to load mentee for booking {}: {}", booking.id, e);
            return None;
        }
    };

    let profile = match MentorProfile::find_by_id(pool, booking.mentor_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            warn!("Mentor profile {} missing for booking {}", booking.mentor_id, booking.id);
            return None;
        }
        Err(e) => {
            error!("Failed to load mentor profile for booking {}: {}", booking.id, e);
            return None;
        }
    };

    match User::find_by_id(pool, profile.user_id).await {
        Ok(Some(mentor_user)) => Some((mentee, mentor_user)),
        Ok(None) => {
            warn!("Mentor user {} missing for booking {}", profile.user_id, booking.id);
            None
        }
        Err(e) => {
            error!("Failed to load mentor user for booking {}: {}", booking.id, e);
            None
        }
    }
}

pub async fn create(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    request: web::Json<CreateBookingRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("Creating booking for mentee: {}", user.user_id);

    let new = request.into_inner().into_new_booking(user.user_id);

    match Booking::create(&pool, new).await {
        Ok(booking) => {
            info!("Successfully created booking with ID: {}", booking.id);
            if let Some((mentee, mentor_user)) = load_parties(&pool, &booking).await {
                notify_booking_requested(&notifier, &booking, &mentor_user, &mentee);
            }
            Ok(HttpResponse::Created().json(ApiResponse::success(booking)))
        }
        Err(e) => Ok(booking_error_response(&e)),
    }
}

async fn reconciled_listing(
    pool: &DbPool,
    user: &AuthenticatedUser,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<Booking>, BookingError> {
    let scope = scope_for(user);
    let changed = Booking::reconcile_scoped(pool, scope, now).await?;
    if changed > 0 {
        info!("Auto-completed {} bookings for user {}", changed, user.user_id);
    }
    Booking::find_scoped(pool, scope).await
}

pub async fn index(
    pool: web::Data<DbPool>,
    clock: web::Data<SharedClock>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    match reconciled_listing(&pool, &user, clock.now()).await {
        Ok(bookings) => Ok(HttpResponse::Ok().json(ApiResponse::success(bookings))),
        Err(e) => Ok(booking_error_response(&e)),
    }
}

pub async fn upcoming(
    pool: web::Data<DbPool>,
    clock: web::Data<SharedClock>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let now = clock.now();
    match reconciled_listing(&pool, &user, now).await {
        Ok(bookings) => {
            let upcoming: Vec<Booking> =
                bookings.into_iter().filter(|b| b.is_upcoming(now)).collect();
            Ok(HttpResponse::Ok().json(ApiResponse::success(upcoming)))
        }
        Err(e) => Ok(booking_error_response(&e)),
    }
}

pub async fn past(
    pool: web::Data<DbPool>,
    clock: web::Data<SharedClock>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let now = clock.now();
    match reconciled_listing(&pool, &user, now).await {
        Ok(bookings) => {
            let past: Vec<Booking> = bookings.into_iter().filter(|b| b.is_past(now)).collect();
            Ok(HttpResponse::Ok().json(ApiResponse::success(past)))
        }
        Err(e) => Ok(booking_error_response(&e)),
    }
}

pub async fn show(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();

    let booking = match Booking::find_by_id(&pool, booking_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            return Ok(booking_error_response(&BookingError::NotFound { id: booking_id }));
        }
        Err(e) => return Ok(booking_error_response(&e)),
    };

    if user.user_role != UserRole::Admin && booking.mentee_id != user.user_id {
        let is_mentor = match MentorProfile::find_by_id(&pool, booking.mentor_id).await {
            Ok(Some(profile)) => profile.user_id == user.user_id,
            Ok(None) => false,
            Err(e) => return Ok(booking_error_response(&BookingError::Database(e))),
        };
        if !is_mentor {
            // hidden from non-parties, as if it did not exist
            return Ok(booking_error_response(&BookingError::NotFound { id: booking_id }));
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

#[derive(Debug, Clone, Copy)]
enum TransitionKind {
    Accept,
    Decline,
    Complete,
    Cancel,
}

async fn run_transition(
    pool: &DbPool,
    notifier: &Notifier,
    booking_id: Uuid,
    user: &AuthenticatedUser,
    kind: TransitionKind,
) -> HttpResponse {
    let mut booking = match Booking::find_by_id(pool, booking_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return booking_error_response(&BookingError::NotFound { id: booking_id }),
        Err(e) => return booking_error_response(&e),
    };

    let mentor = match MentorProfile::find_by_id(pool, booking.mentor_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            error!("Mentor profile {} missing for booking {}", booking.mentor_id, booking.id);
            return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                "Failed to resolve booking mentor".to_string(),
            ));
        }
        Err(e) => return booking_error_response(&BookingError::Database(e)),
    };

    let actor = booking.actor_for(user.user_id, mentor.user_id);
    let applied = match kind {
        TransitionKind::Accept => booking.accept(actor),
        TransitionKind::Decline => booking.decline(actor),
        TransitionKind::Complete => booking.complete(actor),
        TransitionKind::Cancel => booking.cancel(actor),
    };
    if let Err(e) = applied {
        return booking_error_response(&e);
    }

    let booking = match booking.store_transition(pool).await {
        Ok(booking) => booking,
        Err(e) => return booking_error_response(&e),
    };

    if let Some((mentee, mentor_user)) = load_parties(pool, &booking).await {
        match kind {
            TransitionKind::Accept => {
                notify_booking_confirmed(notifier, &booking, &mentor_user, &mentee)
            }
            TransitionKind::Decline => notify_status_change(
                notifier,
                &booking,
                StatusChange::Declined,
                &mentor_user,
                &mentee,
            ),
            TransitionKind::Complete => notify_status_change(
                notifier,
                &booking,
                StatusChange::Completed,
                &mentor_user,
                &mentee,
            ),
            TransitionKind::Cancel => notify_status_change(
                notifier,
                &booking,
                StatusChange::Cancelled,
                &mentor_user,
                &mentee,
            ),
        }
    }

    HttpResponse::Ok().json(ApiResponse::success(booking))
}

pub async fn accept(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("User {} accepting booking {}", user.user_id, path);
    Ok(run_transition(&pool, &notifier, path.into_inner(), &user, TransitionKind::Accept).await)
}

pub async fn decline(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("User {} declining booking {}", user.user_id, path);
    Ok(run_transition(&pool, &notifier, path.into_inner(), &user, TransitionKind::Decline).await)
}

pub async fn complete(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("User {} completing booking {}", user.user_id, path);
    Ok(run_transition(&pool, &notifier, path.into_inner(), &user, TransitionKind::Complete).await)
}

pub async fn cancel(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("User {} cancelling booking {}", user.user_id, path);
    Ok(run_transition(&pool, &notifier, path.into_inner(), &user, TransitionKind::Cancel).await)
}

/// Payment-first flow, step 1: price the requested booking and open a
/// processor intent carrying its fields; nothing is persisted yet.
pub async fn create_with_payment(
    bridge: web::Data<PaymentBridge>,
    request: web::Json<CreateBookingRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!("Creating payment-first intent for mentee: {}", user.user_id);

    let new = request.into_inner().into_new_booking(user.user_id);

    match bridge.create_intent_with_booking(new).await {
        Ok(intent) => Ok(HttpResponse::Ok().json(ApiResponse::success(intent))),
        Err(e) => Ok(bridge_error_response(e)),
    }
}

#[derive(Debug, Serialize)]
struct ConfirmedBookingResponse {
    booking_id: Uuid,
    meeting_link: Option<String>,
}

/// Payment-first flow, step 2: the booking materializes only after the
/// processor reports the charge succeeded.
pub async fn confirm_payment(
    pool: web::Data<DbPool>,
    bridge: web::Data<PaymentBridge>,
    notifier: web::Data<Notifier>,
    request: web::Json<ConfirmPaymentRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!(
        "Confirming payment-first intent {} for user {}",
        request.payment_intent_id, user.user_id
    );

    match bridge
        .confirm_and_materialize(user.user_id, &request.payment_intent_id)
        .await
    {
        Ok((booking, _payment)) => {
            if let Some((mentee, mentor_user)) = load_parties(&pool, &booking).await {
                notify_booking_requested(&notifier, &booking, &mentor_user, &mentee);
                notify_booking_confirmed(&notifier, &booking, &mentor_user, &mentee);
            }
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
                ConfirmedBookingResponse {
                    booking_id: booking.id,
                    meeting_link: booking.meeting_link.clone(),
                },
                "Booking created successfully",
            )))
        }
        Err(e) => Ok(bridge_error_response(e)),
    }
}

#[derive(Debug, Serialize)]
struct SimpleConfirmation {
    #[serde(skip_serializing_if = "Option::is_none")]
    meeting_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    onsite_address: Option<String>,
}

/// Simple confirmation: ties a supplied intent id to an existing booking
/// and answers with whatever the client needs to join the session.
pub async fn confirm(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    request: web::Json<ConfirmBookingRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!(
        "Confirming booking {} for user {}",
        request.booking_id, user.user_id
    );

    let mut booking = match Booking::find_by_id(&pool, request.booking_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            return Ok(booking_error_response(&BookingError::NotFound {
                id: request.booking_id,
            }));
        }
        Err(e) => return Ok(booking_error_response(&e)),
    };

    let mentor = match MentorProfile::find_by_id(&pool, booking.mentor_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            error!("Mentor profile {} missing for booking {}", booking.mentor_id, booking.id);
            return Ok(HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                "Failed to resolve booking mentor".to_string(),
            )));
        }
        Err(e) => return Ok(booking_error_response(&BookingError::Database(e))),
    };

    if booking.actor_for(user.user_id, mentor.user_id) == BookingActor::Other {
        return Ok(HttpResponse::Forbidden().json(ApiResponse::<()>::error(
            "You can only confirm your own bookings".to_string(),
        )));
    }

    if let Err(e) = booking.confirm_paid(&request.payment_intent_id) {
        return Ok(booking_error_response(&e));
    }

    let booking = match booking.store_transition(&pool).await {
        Ok(booking) => booking,
        Err(e) => return Ok(booking_error_response(&e)),
    };

    if let Some((mentee, mentor_user)) = load_parties(&pool, &booking).await {
        notify_booking_confirmed(&notifier, &booking, &mentor_user, &mentee);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        SimpleConfirmation {
            meeting_link: booking.meeting_link.clone(),
            onsite_address: booking.onsite_address.clone(),
        },
        "Booking confirmed",
    )))
}
