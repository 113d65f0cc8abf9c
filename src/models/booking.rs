use crate::database::connection::DbPool;
use crate::models::mentor::MentorProfile;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Booking with ID {id} not found")]
    NotFound { id: Uuid },
    #[error("Mentor with ID {id} not found")]
    MentorNotFound { id: Uuid },
    #[error("Only the mentor can {action} this booking")]
    NotMentor { action: &'static str },
    #[error("You can only cancel your own bookings")]
    NotParty,
    #[error("Only {required} bookings can be {action}, current status is {current}")]
    InvalidTransition {
        required: &'static str,
        action: &'static str,
        current: BookingStatus,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::InProgress => write!(f, "in progress"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "session_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    VideoCall,
    Onsite,
    Other,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::VideoCall => "video_call",
            SessionType::Onsite => "onsite",
            SessionType::Other => "other",
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_call" => Ok(SessionType::VideoCall),
            "onsite" => Ok(SessionType::Onsite),
            "other" => Ok(SessionType::Other),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::VideoCall => write!(f, "Video Call"),
            SessionType::Onsite => write!(f, "On-site"),
            SessionType::Other => write!(f, "Other"),
        }
    }
}

/// Who a request's user is relative to one booking. Derived by handlers
/// from the stored mentee/mentor references, checked by the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingActor {
    Mentee,
    Mentor,
    Other,
}

/// Which bookings a caller may see: admins see everything, mentors see
/// bookings addressed to their profile, mentees see their own.
#[derive(Debug, Clone, Copy)]
pub enum BookingScope {
    All,
    MentorUser(Uuid),
    Mentee(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    pub session_type: SessionType,
    pub session_date: Option<NaiveDate>,
    pub session_time: Option<NaiveTime>,
    pub duration_minutes: i32,
    pub topic: String,
    pub description: Option<String>,
    pub total_amount: Decimal,
    pub is_paid: bool,
    pub status: BookingStatus,
    pub meeting_link: Option<String>,
    pub onsite_address: Option<String>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
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

impl NewBooking {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.duration_minutes <= 0 {
            return Err(BookingError::Validation(
                "duration_minutes must be a positive number of minutes".to_string(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(BookingError::Validation("topic must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Fully resolved row for insertion; used directly by the payment bridge so
/// a paid booking and its payment land in one transaction.
#[derive(Debug, Clone)]
pub struct InsertBooking {
    pub new: NewBooking,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub is_paid: bool,
    pub meeting_link: Option<String>,
    pub payment_intent_id: Option<String>,
}

pub fn compute_total_amount(hourly_rate: Decimal, duration_minutes: i32) -> Decimal {
    (hourly_rate * Decimal::from(duration_minutes) / Decimal::from(60)).round_dp(2)
}

pub fn generate_meeting_link(booking_id: Uuid) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!(
        "https://meet.google.com/mentor-{}-{}",
        booking_id,
        suffix.to_lowercase()
    )
}

impl Booking {
    // ---- state machine -------------------------------------------------

    pub fn accept(&mut self, actor: BookingActor) -> Result<(), BookingError> {
        if actor != BookingActor::Mentor {
            return Err(BookingError::NotMentor { action: "accept" });
        }
        if self.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                required: "pending",
                action: "accepted",
                current: self.status,
            });
        }
        self.status = BookingStatus::Confirmed;
        self.ensure_meeting_link();
        Ok(())
    }

    pub fn decline(&mut self, actor: BookingActor) -> Result<(), BookingError> {
        if actor != BookingActor::Mentor {
            return Err(BookingError::NotMentor { action: "decline" });
        }
        if self.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                required: "pending",
                action: "declined",
                current: self.status,
            });
        }
        self.status = BookingStatus::Cancelled;
        Ok(())
    }

    pub fn complete(&mut self, actor: BookingActor) -> Result<(), BookingError> {
        if actor != BookingActor::Mentor {
            return Err(BookingError::NotMentor { action: "complete" });
        }
        if self.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                required: "confirmed",
                action: "completed",
                current: self.status,
            });
        }
        self.status = BookingStatus::Completed;
        Ok(())
    }

    pub fn cancel(&mut self, actor: BookingActor) -> Result<(), BookingError> {
        if actor == BookingActor::Other {
            return Err(BookingError::NotParty);
        }
        if matches!(self.status, BookingStatus::Completed | BookingStatus::Cancelled) {
            return Err(BookingError::InvalidTransition {
                required: "pending, confirmed or in-progress",
                action: "cancelled",
                current: self.status,
            });
        }
        self.status = BookingStatus::Cancelled;
        Ok(())
    }

    /// Settles the booking after a successful payment: confirmed, paid,
    /// tied to the processor intent. Used by both payment flows and the
    /// simple confirmation endpoint.
    pub fn confirm_paid(&mut self, payment_intent_id: &str) -> Result<(), BookingError> {
        if matches!(self.status, BookingStatus::Completed | BookingStatus::Cancelled) {
            return Err(BookingError::InvalidTransition {
                required: "pending or confirmed",
                action: "confirmed",
                current: self.status,
            });
        }
        self.status = BookingStatus::Confirmed;
        self.is_paid = true;
        self.payment_intent_id = Some(payment_intent_id.to_string());
        self.ensure_meeting_link();
        Ok(())
    }

    fn ensure_meeting_link(&mut self) {
        if self.session_type == SessionType::VideoCall && self.meeting_link.is_none() {
            self.meeting_link = Some(generate_meeting_link(self.id));
        }
    }

    pub fn actor_for(&self, user_id: Uuid, mentor_user_id: Uuid) -> BookingActor {
        if user_id == mentor_user_id {
            BookingActor::Mentor
        } else if user_id == self.mentee_id {
            BookingActor::Mentee
        } else {
            BookingActor::Other
        }
    }

    // ---- session window ------------------------------------------------

    /// `[start, start + duration)` in UTC. `None` when either the date or
    /// the time is missing; such bookings never expire.
    pub fn session_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let date = self.session_date?;
        let time = self.session_time?;
        let start = date.and_time(time).and_utc();
        let end = start + Duration::minutes(i64::from(self.duration_minutes));
        Some((start, end))
    }

    /// Status the booking should hold at `now`, or `None` when it is
    /// already consistent. Applying the result and calling again always
    /// yields `None`, which makes the sweep idempotent.
    pub fn reconciled_status(&self, now: DateTime<Utc>) -> Option<BookingStatus> {
        if !matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::InProgress
        ) {
            return None;
        }
        let (start, end) = self.session_window()?;
        if now >= end {
            (self.status != BookingStatus::Completed).then_some(BookingStatus::Completed)
        } else if now >= start {
            (self.status != BookingStatus::InProgress).then_some(BookingStatus::InProgress)
        } else {
            None
        }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        if matches!(self.status, BookingStatus::Completed | BookingStatus::Cancelled) {
            return false;
        }
        match self.session_window() {
            Some((_, end)) => end > now,
            None => true,
        }
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        if matches!(self.status, BookingStatus::Completed | BookingStatus::Cancelled) {
            return true;
        }
        match self.session_window() {
            Some((_, end)) => end <= now,
            None => false,
        }
    }

    // ---- persistence ---------------------------------------------------

    pub async fn insert<'e, E>(executor: E, row: InsertBooking) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let now = Utc::now();
        // onsite_address is only meaningful for onsite sessions
        let onsite_address = match row.new.session_type {
            SessionType::Onsite => row.new.onsite_address,
            _ => None,
        };

        sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, mentee_id, mentor_id, session_type, session_date, session_time,
                                   duration_minutes, topic, description, total_amount, is_paid, status,
                                   meeting_link, onsite_address, payment_intent_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(row.new.mentee_id)
        .bind(row.new.mentor_id)
        .bind(row.new.session_type)
        .bind(row.new.session_date)
        .bind(row.new.session_time)
        .bind(row.new.duration_minutes)
        .bind(row.new.topic)
        .bind(row.new.description)
        .bind(row.total_amount)
        .bind(row.is_paid)
        .bind(row.status)
        .bind(row.meeting_link)
        .bind(onsite_address)
        .bind(row.payment_intent_id)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Creates a pending booking, pricing it from the mentor's hourly rate.
    pub async fn create(pool: &DbPool, new: NewBooking) -> Result<Self, BookingError> {
        new.validate()?;

        let mentor = MentorProfile::find_by_id(pool, new.mentor_id)
            .await?
            .ok_or(BookingError::MentorNotFound { id: new.mentor_id })?;

        let total_amount = compute_total_amount(mentor.hourly_rate, new.duration_minutes);

        let booking = Self::insert(
            pool,
            InsertBooking {
                new,
                total_amount,
                status: BookingStatus::Pending,
                is_paid: false,
                meeting_link: None,
                payment_intent_id: None,
            },
        )
        .await?;

        Ok(booking)
    }

    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Self>, BookingError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(booking)
    }

    pub async fn find_scoped(pool: &DbPool, scope: BookingScope) -> Result<Vec<Self>, BookingError> {
        let bookings = match scope {
            BookingScope::All => {
                sqlx::query_as::<_, Booking>("SELECT * FROM bookings ORDER BY created_at DESC")
                    .fetch_all(pool)
                    .await?
            }
            BookingScope::Mentee(user_id) => {
                sqlx::query_as::<_, Booking>(
                    "SELECT * FROM bookings WHERE mentee_id = $1 ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?
            }
            BookingScope::MentorUser(user_id) => {
                sqlx::query_as::<_, Booking>(
                    "SELECT b.* FROM bookings b
                     JOIN mentor_profiles m ON b.mentor_id = m.id
                     WHERE m.user_id = $1
                     ORDER BY b.created_at DESC",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?
            }
        };

        Ok(bookings)
    }

    /// Writes back the in-memory transition fields.
    pub async fn store_transition(&self, pool: &DbPool) -> Result<Self, BookingError> {
        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings
             SET status = $2, meeting_link = $3, is_paid = $4, payment_intent_id = $5, updated_at = $6
             WHERE id = $1
             RETURNING *",
        )
        .bind(self.id)
        .bind(self.status)
        .bind(&self.meeting_link)
        .bind(self.is_paid)
        .bind(&self.payment_intent_id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(booking)
    }

    /// Idempotent auto-completion sweep: rewrites every booking in scope
    /// whose session window says it should be in progress or completed.
    /// Invoked from the listing handlers and from the periodic job.
    pub async fn reconcile_scoped(
        pool: &DbPool,
        scope: BookingScope,
        now: DateTime<Utc>,
    ) -> Result<u64, BookingError> {
        let mut changed = 0u64;
        for booking in Self::find_scoped(pool, scope).await? {
            if let Some(next) = booking.reconciled_status(now) {
                sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
                    .bind(booking.id)
                    .bind(next)
                    .bind(now)
                    .execute(pool)
                    .await?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(status: BookingStatus, session_type: SessionType) -> Booking {
        let now = Utc.with_ymd_and_hms(2025, 7, 10, 9, 0, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            session_type,
            session_date: NaiveDate::from_ymd_opt(2025, 7, 10),
            session_time: NaiveTime::from_hms_opt(14, 0, 0),
            duration_minutes: 60,
            topic: "Borrow checker".to_string(),
            description: None,
            total_amount: "50.00".parse().unwrap(),
            is_paid: false,
            status,
            meeting_link: None,
            onsite_address: None,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn total_amount_is_rate_times_duration_hours() {
        let rate: Decimal = "50.00".parse().unwrap();
        assert_eq!(compute_total_amount(rate, 90), "75.00".parse().unwrap());
        assert_eq!(compute_total_amount(rate, 60), "50.00".parse().unwrap());
        assert_eq!(compute_total_amount(rate, 30), "25.00".parse().unwrap());
    }

    #[test]
    fn accept_confirms_and_links_video_calls() {
        let mut booking = sample(BookingStatus::Pending, SessionType::VideoCall);
        booking.accept(BookingActor::Mentor).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.meeting_link.as_deref().is_some_and(|l| !l.is_empty()));
    }

    #[test]
    fn accept_never_links_onsite_sessions() {
        let mut booking = sample(BookingStatus::Pending, SessionType::Onsite);
        booking.accept(BookingActor::Mentor).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.meeting_link.is_none());
    }

    #[test]
    fn accept_requires_pending() {
        let mut booking = sample(BookingStatus::Confirmed, SessionType::VideoCall);
        let err = booking.accept(BookingActor::Mentor).unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { required: "pending", .. }));
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn accept_requires_the_mentor() {
        let mut booking = sample(BookingStatus::Pending, SessionType::VideoCall);
        assert!(matches!(
            booking.accept(BookingActor::Mentee),
            Err(BookingError::NotMentor { .. })
        ));
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn decline_requires_pending() {
        let mut booking = sample(BookingStatus::InProgress, SessionType::Other);
        assert!(matches!(
            booking.decline(BookingActor::Mentor),
            Err(BookingError::InvalidTransition { .. })
        ));

        let mut booking = sample(BookingStatus::Pending, SessionType::Other);
        booking.decline(BookingActor::Mentor).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[test]
    fn complete_requires_confirmed() {
        let mut booking = sample(BookingStatus::Pending, SessionType::Other);
        assert!(matches!(
            booking.complete(BookingActor::Mentor),
            Err(BookingError::InvalidTransition { required: "confirmed", .. })
        ));

        let mut booking = sample(BookingStatus::Confirmed, SessionType::Other);
        booking.complete(BookingActor::Mentor).unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
    }

    #[test]
    fn cancel_allowed_for_either_party_until_terminal() {
        let mut booking = sample(BookingStatus::InProgress, SessionType::Other);
        booking.cancel(BookingActor::Mentee).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);

        let mut booking = sample(BookingStatus::Completed, SessionType::Other);
        assert!(matches!(
            booking.cancel(BookingActor::Mentor),
            Err(BookingError::InvalidTransition { .. })
        ));

        let mut booking = sample(BookingStatus::Pending, SessionType::Other);
        let err = booking.cancel(BookingActor::Other).unwrap_err();
        assert!(matches!(err, BookingError::NotParty));
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn confirm_paid_rejects_terminal_states() {
        let mut booking = sample(BookingStatus::Cancelled, SessionType::VideoCall);
        assert!(matches!(
            booking.confirm_paid("pi_123"),
            Err(BookingError::InvalidTransition { .. })
        ));

        let mut booking = sample(BookingStatus::Pending, SessionType::VideoCall);
        booking.confirm_paid("pi_123").unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.is_paid);
        assert_eq!(booking.payment_intent_id.as_deref(), Some("pi_123"));
        assert!(booking.meeting_link.is_some());
    }

    #[test]
    fn actor_resolution() {
        let booking = sample(BookingStatus::Pending, SessionType::Other);
        let mentor_user = Uuid::new_v4();
        assert_eq!(booking.actor_for(mentor_user, mentor_user), BookingActor::Mentor);
        assert_eq!(booking.actor_for(booking.mentee_id, mentor_user), BookingActor::Mentee);
        assert_eq!(booking.actor_for(Uuid::new_v4(), mentor_user), BookingActor::Other);
    }

    #[test]
    fn reconcile_moves_through_the_session_window() {
        let booking = sample(BookingStatus::Pending, SessionType::Other);
        // window is 14:00-15:00
        assert_eq!(booking.reconciled_status(at(13, 0)), None);
        assert_eq!(booking.reconciled_status(at(14, 30)), Some(BookingStatus::InProgress));
        assert_eq!(booking.reconciled_status(at(16, 0)), Some(BookingStatus::Completed));
    }

    #[test]
    fn reconcile_completes_an_elapsed_pending_booking() {
        // created with a window that has already elapsed
        let booking = sample(BookingStatus::Pending, SessionType::Other);
        assert_eq!(booking.reconciled_status(at(15, 0)), Some(BookingStatus::Completed));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut booking = sample(BookingStatus::Confirmed, SessionType::Other);
        let next = booking.reconciled_status(at(16, 0)).unwrap();
        booking.status = next;
        assert_eq!(booking.reconciled_status(at(16, 0)), None);
    }

    #[test]
    fn reconcile_skips_bookings_without_a_schedule() {
        let mut booking = sample(BookingStatus::Pending, SessionType::Other);
        booking.session_date = None;
        assert_eq!(booking.reconciled_status(at(23, 59)), None);
        assert!(booking.is_upcoming(at(23, 59)));
        assert!(!booking.is_past(at(23, 59)));
    }

    #[test]
    fn reconcile_leaves_terminal_states_alone() {
        let booking = sample(BookingStatus::Cancelled, SessionType::Other);
        assert_eq!(booking.reconciled_status(at(16, 0)), None);
    }

    #[test]
    fn upcoming_and_past_split_on_session_end() {
        let booking = sample(BookingStatus::Confirmed, SessionType::Other);
        assert!(booking.is_upcoming(at(13, 0)));
        assert!(!booking.is_past(at(13, 0)));
        assert!(booking.is_past(at(15, 0)));
        assert!(!booking.is_upcoming(at(15, 0)));

        let cancelled = sample(BookingStatus::Cancelled, SessionType::Other);
        assert!(cancelled.is_past(at(13, 0)));
    }

    #[test]
    fn new_booking_validation() {
        let new = NewBooking {
            mentee_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            session_type: SessionType::Other,
            session_date: None,
            session_time: None,
            duration_minutes: 0,
            topic: "Topic".to_string(),
            description: None,
            onsite_address: None,
        };
        assert!(matches!(new.validate(), Err(BookingError::Validation(_))));

        let new = NewBooking {
            duration_minutes: 60,
            topic: "  ".to_string(),
            ..new
        };
        assert!(matches!(new.validate(), Err(BookingError::Validation(_))));
    }
}
