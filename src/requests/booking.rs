use crate::models::booking::{NewBooking, SessionType};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub mentor_id: Uuid,
    pub session_type: SessionType,
    pub session_date: Option<NaiveDate>,
    pub session_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub topic: String,
    pub description: Option<String>,
    pub onsite_address: Option<String>,
}

impl CreateBookingRequest {
    pub fn into_new_booking(self, mentee_id: Uuid) -> NewBooking {
        NewBooking {
            mentee_id,
            mentor_id: self.mentor_id,
            session_type: self.session_type,
            session_date: self.session_date,
            session_time: self.session_time,
            duration_minutes: self.duration_minutes.unwrap_or(60),
            topic: self.topic,
            description: self.description,
            onsite_address: self.onsite_address,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBookingRequest {
    pub booking_id: Uuid,
    pub payment_intent_id: String,
}
