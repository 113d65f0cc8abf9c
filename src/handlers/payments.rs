use crate::{
    database::connection::DbPool,
    middleware::auth::AuthenticatedUser,
    models::payment::{Payment, PaymentError},
    requests::payment::{ConfirmPaymentRequest, CreatePaymentIntentRequest},
    services::{
        email::Notifier,
        notifications::{StatusChange, notify_booking_confirmed, notify_status_change},
        payments::{BridgeError, PaymentBridge},
    },
    utils::helpers::ApiResponse,
};
use actix_web::{HttpResponse, Result, web};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::bookings::{booking_error_response, load_parties};

pub(crate) fn bridge_error_response(e: BridgeError) -> HttpResponse {
    match e {
        BridgeError::InvalidAmount
        | BridgeError::InvalidCurrency
        | BridgeError::NotSucceeded { .. }
        | BridgeError::WrongFlow
        | BridgeError::AlreadyProcessed { .. }
        | BridgeError::Metadata { .. } => {
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()))
        }
        BridgeError::BookingNotFound | BridgeError::UnknownIntent { .. } => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error(e.to_string()))
        }
        BridgeError::Processor(err) => {
            error!("Payment processor error: {}", err);
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(err.to_string()))
        }
        BridgeError::Payment(PaymentError::DuplicateIntent { .. }) => {
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()))
        }
        BridgeError::Payment(PaymentError::Database(err)) | BridgeError::Database(err) => {
            error!("Database error: {}", err);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Database error"))
        }
        BridgeError::Booking(err) => booking_error_response(&err),
    }
}

/// Deferred flow, step 1: open an intent against an existing booking.
pub async fn create_payment_intent(
    bridge: web::Data<PaymentBridge>,
    request: web::Json<CreatePaymentIntentRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!(
        "Creating payment intent for booking {} by user {}",
        request.booking_id, user.user_id
    );

    match bridge
        .create_intent_for_booking(
            user.user_id,
            request.booking_id,
            request.amount,
            request.currency.clone(),
        )
        .await
    {
        Ok(intent) => {
            info!("Created payment intent {}", intent.payment_intent_id);
            Ok(HttpResponse::Ok().json(ApiResponse::success(intent)))
        }
        Err(e) => Ok(bridge_error_response(e)),
    }
}

#[derive(Debug, Serialize)]
struct PaymentConfirmedResponse {
    payment_id: Uuid,
    booking_id: Uuid,
}

/// Deferred flow, step 2: settle the payment and confirm the booking.
pub async fn confirm_payment(
    pool: web::Data<DbPool>,
    bridge: web::Data<PaymentBridge>,
    notifier: web::Data<Notifier>,
    request: web::Json<ConfirmPaymentRequest>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    info!(
        "Confirming payment intent {} for user {}",
        request.payment_intent_id, user.user_id
    );

    match bridge
        .confirm_booking_payment(user.user_id, &request.payment_intent_id)
        .await
    {
        Ok((payment, booking)) => {
            if let Some((mentee, mentor_user)) = load_parties(&pool, &booking).await {
                notify_booking_confirmed(&notifier, &booking, &mentor_user, &mentee);
                notify_status_change(
                    &notifier,
                    &booking,
                    StatusChange::Accepted,
                    &mentor_user,
                    &mentee,
                );
            }
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
                PaymentConfirmedResponse {
                    payment_id: payment.id,
                    booking_id: booking.id,
                },
                "Payment confirmed successfully",
            )))
        }
        Err(e) => Ok(bridge_error_response(e)),
    }
}

pub async fn payment_status(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let intent_id = path.into_inner();
    info!("Getting payment status for intent {}", intent_id);

    match Payment::find_by_intent_for_user(&pool, &intent_id, user.user_id).await {
        Ok(Some(payment)) => Ok(HttpResponse::Ok().json(ApiResponse::success(payment))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ApiResponse::<()>::error(
            "Payment not found".to_string(),
        ))),
        Err(e) => {
            error!("Database error getting payment status: {}", e);
            Ok(HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                "Failed to retrieve payment".to_string(),
            )))
        }
    }
}
