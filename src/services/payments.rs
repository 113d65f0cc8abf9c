//! Bridge between bookings and the external payment processor.
//!
//! Both charge flows run through one protocol, distinguished by a `scope`
//! tag in the intent's metadata: `booking_first` intents charge an already
//! persisted booking, `payment_first` intents carry the whole booking as
//! metadata and the booking row only materializes once the processor
//! reports the charge succeeded.

use crate::database::connection::DbPool;
use crate::models::booking::{
    Booking, BookingError, BookingStatus, InsertBooking, NewBooking, SessionType,
    compute_total_amount, generate_meeting_link,
};
use crate::models::mentor::MentorProfile;
use crate::models::payment::{NewPayment, Payment, PaymentError, PaymentStatus};
use crate::services::processor::{IntentStatus, PaymentIntent, PaymentProcessor, ProcessorError};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Currency must be a three-letter code")]
    InvalidCurrency,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Payment not completed, intent status is {status}")]
    NotSucceeded { status: IntentStatus },
    #[error("This payment intent was not created for this flow")]
    WrongFlow,
    #[error("Payment for intent {intent_id} not found")]
    UnknownIntent { intent_id: String },
    #[error("Payment for intent {intent_id} was already processed")]
    AlreadyProcessed { intent_id: String },
    #[error("Payment intent metadata is missing or invalid: {field}")]
    Metadata { field: &'static str },
    #[error("{0}")]
    Processor(#[from] ProcessorError),
    #[error("{0}")]
    Payment(#[from] PaymentError),
    #[error("{0}")]
    Booking(#[from] BookingError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

const SCOPE_KEY: &str = "scope";
const SCOPE_BOOKING_FIRST: &str = "booking_first";
const SCOPE_PAYMENT_FIRST: &str = "payment_first";

/// Which flow an intent was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentScope {
    BookingFirst { booking_id: Uuid },
    PaymentFirst,
}

impl IntentScope {
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, BridgeError> {
        match metadata.get(SCOPE_KEY).map(String::as_str) {
            Some(SCOPE_BOOKING_FIRST) => {
                let booking_id = metadata
                    .get("booking_id")
                    .and_then(|raw| raw.parse().ok())
                    .ok_or(BridgeError::Metadata {
                        field: "booking_id",
                    })?;
                Ok(IntentScope::BookingFirst { booking_id })
            }
            Some(SCOPE_PAYMENT_FIRST) => Ok(IntentScope::PaymentFirst),
            _ => Err(BridgeError::Metadata { field: SCOPE_KEY }),
        }
    }
}

/// Booking fields flattened into processor metadata for the payment-first
/// flow. Every value is a string on the wire; absent optionals are simply
/// not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingIntentFields {
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    pub session_type: SessionType,
    pub session_date: Option<NaiveDate>,
    pub session_time: Option<NaiveTime>,
    pub duration_minutes: i32,
    pub topic: String,
    pub description: Option<String>,
    pub onsite_address: Option<String>,
}

impl From<&NewBooking> for BookingIntentFields {
    fn from(new: &NewBooking) -> Self {
        Self {
            mentee_id: new.mentee_id,
            mentor_id: new.mentor_id,
            session_type: new.session_type,
            session_date: new.session_date,
            session_time: new.session_time,
            duration_minutes: new.duration_minutes,
            topic: new.topic.clone(),
            description: new.description.clone(),
            onsite_address: new.onsite_address.clone(),
        }
    }
}

impl BookingIntentFields {
    pub fn into_new_booking(self) -> NewBooking {
        NewBooking {
            mentee_id: self.mentee_id,
            mentor_id: self.mentor_id,
            session_type: self.session_type,
            session_date: self.session_date,
            session_time: self.session_time,
            duration_minutes: self.duration_minutes,
            topic: self.topic,
            description: self.description,
            onsite_address: self.onsite_address,
        }
    }

    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("mentee_id".to_string(), self.mentee_id.to_string());
        metadata.insert("mentor_id".to_string(), self.mentor_id.to_string());
        metadata.insert(
            "session_type".to_string(),
            self.session_type.as_str().to_string(),
        );
        if let Some(date) = self.session_date {
            metadata.insert("session_date".to_string(), date.to_string());
        }
        if let Some(time) = self.session_time {
            metadata.insert("session_time".to_string(), time.to_string());
        }
        metadata.insert(
            "duration_minutes".to_string(),
            self.duration_minutes.to_string(),
        );
        metadata.insert("topic".to_string(), self.topic.clone());
        if let Some(description) = &self.description {
            metadata.insert("description".to_string(), description.clone());
        }
        if let Some(address) = &self.onsite_address {
            metadata.insert("onsite_address".to_string(), address.clone());
        }
        metadata
    }

    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, BridgeError> {
        let mentee_id = metadata
            .get("mentee_id")
            .and_then(|raw| raw.parse().ok())
            .ok_or(BridgeError::Metadata { field: "mentee_id" })?;
        let mentor_id = metadata
            .get("mentor_id")
            .and_then(|raw| raw.parse().ok())
            .ok_or(BridgeError::Metadata { field: "mentor_id" })?;
        let session_type = metadata
            .get("session_type")
            .and_then(|raw| raw.parse().ok())
            .ok_or(BridgeError::Metadata {
                field: "session_type",
            })?;
        let session_date = match metadata.get("session_date") {
            Some(raw) => Some(raw.parse().map_err(|_| BridgeError::Metadata {
                field: "session_date",
            })?),
            None => None,
        };
        let session_time = match metadata.get("session_time") {
            Some(raw) => Some(raw.parse().map_err(|_| BridgeError::Metadata {
                field: "session_time",
            })?),
            None => None,
        };
        let duration_minutes = metadata
            .get("duration_minutes")
            .and_then(|raw| raw.parse().ok())
            .ok_or(BridgeError::Metadata {
                field: "duration_minutes",
            })?;
        let topic = metadata
            .get("topic")
            .cloned()
            .ok_or(BridgeError::Metadata { field: "topic" })?;

        Ok(Self {
            mentee_id,
            mentor_id,
            session_type,
            session_date,
            session_time,
            duration_minutes,
            topic,
            description: metadata.get("description").cloned(),
            onsite_address: metadata.get("onsite_address").cloned(),
        })
    }
}

pub fn ensure_succeeded(intent: &PaymentIntent) -> Result<(), BridgeError> {
    if intent.status == IntentStatus::Succeeded {
        Ok(())
    } else {
        Err(BridgeError::NotSucceeded {
            status: intent.status,
        })
    }
}

fn validate_charge(amount: Decimal, currency: &str) -> Result<(), BridgeError> {
    if amount <= Decimal::ZERO {
        return Err(BridgeError::InvalidAmount);
    }
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(BridgeError::InvalidCurrency);
    }
    Ok(())
}

fn to_minor_units(amount: Decimal) -> Result<i64, BridgeError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or(BridgeError::InvalidAmount)
}

fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentCreated {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
}

pub struct PaymentBridge {
    pool: DbPool,
    processor: Arc<dyn PaymentProcessor>,
    currency: String,
}

impl PaymentBridge {
    pub fn new(pool: DbPool, processor: Arc<dyn PaymentProcessor>, currency: String) -> Self {
        Self {
            pool,
            processor,
            currency,
        }
    }

    /// Deferred flow, step 1: intent for an existing booking of the caller,
    /// mirrored locally as a pending payment.
    pub async fn create_intent_for_booking(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        amount: Decimal,
        currency: Option<String>,
    ) -> Result<IntentCreated, BridgeError> {
        let currency = currency
            .unwrap_or_else(|| self.currency.clone())
            .to_lowercase();
        validate_charge(amount, &currency)?;

        let booking = Booking::find_by_id(&self.pool, booking_id)
            .await?
            .filter(|b| b.mentee_id == user_id)
            .ok_or(BridgeError::BookingNotFound)?;

        let mut metadata = HashMap::new();
        metadata.insert(SCOPE_KEY.to_string(), SCOPE_BOOKING_FIRST.to_string());
        metadata.insert("booking_id".to_string(), booking.id.to_string());

        let intent = self
            .processor
            .create_intent(to_minor_units(amount)?, &currency, &metadata)
            .await?;

        Payment::create(
            &self.pool,
            NewPayment {
                booking_id: booking.id,
                user_id,
                payment_intent_id: intent.id.clone(),
                amount,
                currency: currency.clone(),
                status: PaymentStatus::Pending,
            },
        )
        .await?;

        Ok(IntentCreated {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            amount,
            currency,
        })
    }

    /// Deferred flow, step 2: settle the pending payment and confirm its
    /// booking once the processor reports success.
    pub async fn confirm_booking_payment(
        &self,
        user_id: Uuid,
        intent_id: &str,
    ) -> Result<(Payment, Booking), BridgeError> {
        let intent = self.processor.retrieve_intent(intent_id).await?;
        if !matches!(
            IntentScope::from_metadata(&intent.metadata)?,
            IntentScope::BookingFirst { .. }
        ) {
            return Err(BridgeError::WrongFlow);
        }
        ensure_succeeded(&intent)?;

        let payment = Payment::find_by_intent_for_user(&self.pool, intent_id, user_id)
            .await?
            .ok_or_else(|| BridgeError::UnknownIntent {
                intent_id: intent_id.to_string(),
            })?;
        if payment.status != PaymentStatus::Pending {
            return Err(BridgeError::AlreadyProcessed {
                intent_id: intent_id.to_string(),
            });
        }

        let payment = Payment::mark_status(&self.pool, payment.id, PaymentStatus::Completed).await?;

        let mut booking = Booking::find_by_id(&self.pool, payment.booking_id)
            .await?
            .ok_or(BridgeError::BookingNotFound)?;
        booking.confirm_paid(intent_id)?;
        let booking = booking.store_transition(&self.pool).await?;

        Ok((payment, booking))
    }

    /// Payment-first flow, step 1: price the booking, attach its fields as
    /// intent metadata, persist nothing.
    pub async fn create_intent_with_booking(
        &self,
        new: NewBooking,
    ) -> Result<IntentCreated, BridgeError> {
        new.validate()?;

        let mentor = MentorProfile::find_by_id(&self.pool, new.mentor_id)
            .await
            .map_err(BookingError::from)?
            .ok_or(BookingError::MentorNotFound { id: new.mentor_id })?;
        let amount = compute_total_amount(mentor.hourly_rate, new.duration_minutes);
        let currency = self.currency.clone();
        validate_charge(amount, &currency)?;

        let mut metadata = BookingIntentFields::from(&new).to_metadata();
        metadata.insert(SCOPE_KEY.to_string(), SCOPE_PAYMENT_FIRST.to_string());

        let intent = self
            .processor
            .create_intent(to_minor_units(amount)?, &currency, &metadata)
            .await?;

        Ok(IntentCreated {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            amount,
            currency,
        })
    }

    /// Payment-first flow, step 2: verify the charge succeeded, read the
    /// booking back out of the intent's metadata, then materialize booking
    /// and payment in one transaction. A non-succeeded or unknown intent
    /// leaves no rows behind.
    pub async fn confirm_and_materialize(
        &self,
        user_id: Uuid,
        intent_id: &str,
    ) -> Result<(Booking, Payment), BridgeError> {
        let intent = self.processor.retrieve_intent(intent_id).await?;
        if IntentScope::from_metadata(&intent.metadata)? != IntentScope::PaymentFirst {
            return Err(BridgeError::WrongFlow);
        }
        ensure_succeeded(&intent)?;

        let fields = BookingIntentFields::from_metadata(&intent.metadata)?;
        let mut new = fields.into_new_booking();
        // the confirming caller is the mentee, same as at intent creation
        new.mentee_id = user_id;
        new.validate()?;

        let amount = from_minor_units(intent.amount);
        let session_type = new.session_type;

        let mut tx = self.pool.begin().await?;

        let booking = Booking::insert(
            &mut *tx,
            InsertBooking {
                new,
                total_amount: amount,
                status: BookingStatus::Confirmed,
                is_paid: true,
                meeting_link: None,
                payment_intent_id: Some(intent_id.to_string()),
            },
        )
        .await?;

        let booking = if session_type == SessionType::VideoCall {
            let link = generate_meeting_link(booking.id);
            sqlx::query_as::<_, Booking>(
                "UPDATE bookings SET meeting_link = $2 WHERE id = $1 RETURNING *",
            )
            .bind(booking.id)
            .bind(&link)
            .fetch_one(&mut *tx)
            .await?
        } else {
            booking
        };

        let payment = Payment::insert(
            &mut *tx,
            NewPayment {
                booking_id: booking.id,
                user_id,
                payment_intent_id: intent_id.to_string(),
                amount,
                currency: intent.currency.clone(),
                status: PaymentStatus::Completed,
            },
        )
        .await?;

        tx.commit().await?;

        Ok((booking, payment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> BookingIntentFields {
        BookingIntentFields {
            mentee_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            session_type: SessionType::VideoCall,
            session_date: NaiveDate::from_ymd_opt(2025, 7, 10),
            session_time: NaiveTime::from_hms_opt(14, 0, 0),
            duration_minutes: 90,
            topic: "Async Rust".to_string(),
            description: Some("Pinning and executors".to_string()),
            onsite_address: None,
        }
    }

    fn sample_intent(status: IntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: "pi_123".to_string(),
            client_secret: Some("pi_123_secret".to_string()),
            status,
            amount: 7500,
            currency: "usd".to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn booking_fields_round_trip_through_metadata() {
        let fields = sample_fields();
        let parsed = BookingIntentFields::from_metadata(&fields.to_metadata()).unwrap();
        assert_eq!(parsed, fields);
    }

    #[test]
    fn metadata_without_schedule_round_trips_to_none() {
        let mut fields = sample_fields();
        fields.session_date = None;
        fields.session_time = None;

        let parsed = BookingIntentFields::from_metadata(&fields.to_metadata()).unwrap();
        assert_eq!(parsed.session_date, None);
        assert_eq!(parsed.session_time, None);
    }

    #[test]
    fn metadata_missing_required_field_is_rejected() {
        let mut metadata = sample_fields().to_metadata();
        metadata.remove("mentor_id");
        assert!(matches!(
            BookingIntentFields::from_metadata(&metadata),
            Err(BridgeError::Metadata { field: "mentor_id" })
        ));
    }

    #[test]
    fn scope_tag_selects_the_flow() {
        let mut metadata = HashMap::new();
        metadata.insert(SCOPE_KEY.to_string(), SCOPE_PAYMENT_FIRST.to_string());
        assert_eq!(
            IntentScope::from_metadata(&metadata).unwrap(),
            IntentScope::PaymentFirst
        );

        let booking_id = Uuid::new_v4();
        metadata.insert(SCOPE_KEY.to_string(), SCOPE_BOOKING_FIRST.to_string());
        metadata.insert("booking_id".to_string(), booking_id.to_string());
        assert_eq!(
            IntentScope::from_metadata(&metadata).unwrap(),
            IntentScope::BookingFirst { booking_id }
        );

        metadata.remove(SCOPE_KEY);
        assert!(matches!(
            IntentScope::from_metadata(&metadata),
            Err(BridgeError::Metadata { field: "scope" })
        ));
    }

    #[test]
    fn only_succeeded_intents_pass_the_gate() {
        assert!(ensure_succeeded(&sample_intent(IntentStatus::Succeeded)).is_ok());
        assert!(matches!(
            ensure_succeeded(&sample_intent(IntentStatus::Processing)),
            Err(BridgeError::NotSucceeded { status: IntentStatus::Processing })
        ));
        assert!(matches!(
            ensure_succeeded(&sample_intent(IntentStatus::Canceled)),
            Err(BridgeError::NotSucceeded { .. })
        ));
    }

    #[test]
    fn charge_validation_rejects_bad_amounts_and_currencies() {
        assert!(validate_charge("25.00".parse().unwrap(), "usd").is_ok());
        assert!(matches!(
            validate_charge(Decimal::ZERO, "usd"),
            Err(BridgeError::InvalidAmount)
        ));
        assert!(matches!(
            validate_charge("10.00".parse().unwrap(), "dollars"),
            Err(BridgeError::InvalidCurrency)
        ));
        assert!(matches!(
            validate_charge("10.00".parse().unwrap(), "u$d"),
            Err(BridgeError::InvalidCurrency)
        ));
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units("75.00".parse().unwrap()).unwrap(), 7500);
        assert_eq!(to_minor_units("0.50".parse().unwrap()).unwrap(), 50);
        assert_eq!(from_minor_units(7500), "75.00".parse::<Decimal>().unwrap());
    }
}
