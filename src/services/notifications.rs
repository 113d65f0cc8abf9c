//! Subject/body pairs for every booking lifecycle event, plus the rules
//! for who receives each one.

use crate::models::booking::{Booking, SessionType};
use crate::models::user::User;
use crate::services::email::{EmailTemplate, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    Mentee,
    Mentor,
    Both,
}

pub fn recipients_for(change: StatusChange) -> Recipients {
    match change {
        StatusChange::Accepted | StatusChange::Declined => Recipients::Mentee,
        StatusChange::Completed => Recipients::Mentor,
        StatusChange::Cancelled => Recipients::Both,
    }
}

fn schedule_line(booking: &Booking) -> (String, String) {
    let date = booking
        .session_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "to be scheduled".to_string());
    let time = booking
        .session_time
        .map(|t| t.to_string())
        .unwrap_or_else(|| "to be scheduled".to_string());
    (date, time)
}

fn session_details_html(booking: &Booking, with_amount: bool) -> String {
    let (date, time) = schedule_line(booking);
    let amount = if with_amount {
        format!("<li><strong>Amount:</strong> ${}</li>", booking.total_amount)
    } else {
        String::new()
    };
    format!(
        r#"<h3>Session Details:</h3>
<ul>
    <li><strong>Date:</strong> {}</li>
    <li><strong>Time:</strong> {}</li>
    <li><strong>Duration:</strong> {} minutes</li>
    <li><strong>Session Type:</strong> {}</li>
    <li><strong>Topic:</strong> {}</li>
    {}
</ul>"#,
        date, time, booking.duration_minutes, booking.session_type, booking.topic, amount
    )
}

fn location_html(booking: &Booking) -> String {
    match booking.session_type {
        SessionType::VideoCall => match &booking.meeting_link {
            Some(link) => format!(
                r#"<p><strong>Meeting Link:</strong> <a href="{}">{}</a></p>"#,
                link, link
            ),
            None => String::new(),
        },
        SessionType::Onsite => match &booking.onsite_address {
            Some(address) => format!("<p><strong>Location:</strong> {}</p>", address),
            None => String::new(),
        },
        SessionType::Other => String::new(),
    }
}

fn description_html(booking: &Booking) -> String {
    match &booking.description {
        Some(description) => format!("<p><strong>Description:</strong> {}</p>", description),
        None => String::new(),
    }
}

fn wrap_html(heading: &str, body: &str) -> String {
    format!(
        r#"<html>
<body>
    <h2>{}</h2>
    {}
    <p>Please log in to your dashboard for more details.</p>
    <p>Best regards,<br>MentorConnect Team</p>
</body>
</html>"#,
        heading, body
    )
}

pub fn booking_request_template(
    booking: &Booking,
    mentor_name: &str,
    mentee_name: &str,
) -> EmailTemplate {
    let subject = format!("New Session Request from {}", mentee_name);
    let body = format!(
        "<p>Hello {},</p>\n<p>You have received a new session request from {}.</p>\n{}\n{}\n<p>Please log in to your dashboard to accept or decline this request.</p>",
        mentor_name,
        mentee_name,
        session_details_html(booking, true),
        description_html(booking),
    );
    let (date, time) = schedule_line(booking);
    let text_body = format!(
        "Hello {},\n\nYou have received a new session request from {}.\n\nDate: {}\nTime: {}\nDuration: {} minutes\nTopic: {}\nAmount: ${}\n\nPlease log in to your dashboard to accept or decline this request.",
        mentor_name, mentee_name, date, time, booking.duration_minutes, booking.topic, booking.total_amount
    );

    EmailTemplate {
        subject,
        html_body: wrap_html("New Session Request", &body),
        text_body: Some(text_body),
    }
}

pub fn booking_confirmation_template(
    booking: &Booking,
    mentor_name: &str,
    mentee_name: &str,
) -> EmailTemplate {
    let subject = format!("Session Confirmed with {}", mentor_name);
    let body = format!(
        "<p>Hello {},</p>\n<p>Your session with {} has been confirmed!</p>\n{}\n{}\n{}",
        mentee_name,
        mentor_name,
        session_details_html(booking, true),
        description_html(booking),
        location_html(booking),
    );
    let (date, time) = schedule_line(booking);
    let mut text_body = format!(
        "Hello {},\n\nYour session with {} has been confirmed!\n\nDate: {}\nTime: {}\nDuration: {} minutes\nTopic: {}\nAmount: ${}",
        mentee_name, mentor_name, date, time, booking.duration_minutes, booking.topic, booking.total_amount
    );
    if let Some(link) = &booking.meeting_link {
        text_body.push_str(&format!("\nMeeting Link: {}", link));
    }
    if booking.session_type == SessionType::Onsite {
        if let Some(address) = &booking.onsite_address {
            text_body.push_str(&format!("\nLocation: {}", address));
        }
    }

    EmailTemplate {
        subject,
        html_body: wrap_html("Session Confirmed!", &body),
        text_body: Some(text_body),
    }
}

pub fn status_update_template(
    booking: &Booking,
    change: StatusChange,
    mentor_name: &str,
    mentee_name: &str,
) -> EmailTemplate {
    let (date, time) = schedule_line(booking);
    let (subject, message) = match change {
        StatusChange::Accepted => (
            format!("Session Accepted by {}", mentor_name),
            format!("Your session request has been accepted by {}.", mentor_name),
        ),
        StatusChange::Declined => (
            format!("Session Declined by {}", mentor_name),
            format!("Your session request has been declined by {}.", mentor_name),
        ),
        StatusChange::Completed => (
            format!("Session Completed with {}", mentee_name),
            format!(
                "Your session with {} has been marked as completed.",
                mentee_name
            ),
        ),
        StatusChange::Cancelled => (
            "Session Cancelled".to_string(),
            format!(
                "Your session scheduled for {} at {} has been cancelled.",
                date, time
            ),
        ),
    };

    let body = format!(
        "<p>{}</p>\n{}\n{}",
        message,
        session_details_html(booking, false),
        location_html(booking),
    );
    let text_body = format!(
        "{}\n\nDate: {}\nTime: {}\nDuration: {} minutes\nTopic: {}",
        message, date, time, booking.duration_minutes, booking.topic
    );

    EmailTemplate {
        subject: subject.clone(),
        html_body: wrap_html(&subject, &body),
        text_body: Some(text_body),
    }
}

pub fn notify_booking_requested(
    notifier: &Notifier,
    booking: &Booking,
    mentor_user: &User,
    mentee: &User,
) {
    let template = booking_request_template(booking, &mentor_user.fullname, &mentee.fullname);
    notifier.deliver(&mentor_user.email, Some(&mentor_user.fullname), &template);
}

pub fn notify_booking_confirmed(
    notifier: &Notifier,
    booking: &Booking,
    mentor_user: &User,
    mentee: &User,
) {
    let template = booking_confirmation_template(booking, &mentor_user.fullname, &mentee.fullname);
    notifier.deliver(&mentee.email, Some(&mentee.fullname), &template);
}

pub fn notify_status_change(
    notifier: &Notifier,
    booking: &Booking,
    change: StatusChange,
    mentor_user: &User,
    mentee: &User,
) {
    let template = status_update_template(booking, change, &mentor_user.fullname, &mentee.fullname);
    match recipients_for(change) {
        Recipients::Mentee => notifier.deliver(&mentee.email, Some(&mentee.fullname), &template),
        Recipients::Mentor => {
            notifier.deliver(&mentor_user.email, Some(&mentor_user.fullname), &template)
        }
        Recipients::Both => {
            notifier.deliver(&mentee.email, Some(&mentee.fullname), &template);
            notifier.deliver(&mentor_user.email, Some(&mentor_user.fullname), &template);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingStatus, SessionType};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    fn sample(session_type: SessionType) -> Booking {
        let now = Utc.with_ymd_and_hms(2025, 7, 10, 9, 0, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            session_type,
            session_date: NaiveDate::from_ymd_opt(2025, 7, 10),
            session_time: NaiveTime::from_hms_opt(14, 0, 0),
            duration_minutes: 90,
            topic: "Async Rust".to_string(),
            description: Some("Pinning and executors".to_string()),
            total_amount: "75.00".parse().unwrap(),
            is_paid: false,
            status: BookingStatus::Confirmed,
            meeting_link: None,
            onsite_address: None,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn confirmation_embeds_meeting_link_for_video_calls() {
        let mut booking = sample(SessionType::VideoCall);
        booking.meeting_link = Some("https://meet.google.com/mentor-abc".to_string());

        let template = booking_confirmation_template(&booking, "Grace", "Ada");
        assert!(template.html_body.contains("https://meet.google.com/mentor-abc"));
        assert!(template.text_body.unwrap().contains("Meeting Link"));
    }

    #[test]
    fn confirmation_embeds_address_for_onsite_sessions_only() {
        let mut booking = sample(SessionType::Onsite);
        booking.onsite_address = Some("12 Harbour St".to_string());

        let template = booking_confirmation_template(&booking, "Grace", "Ada");
        assert!(template.html_body.contains("12 Harbour St"));
        assert!(!template.html_body.contains("Meeting Link"));
    }

    #[test]
    fn request_template_carries_amount_and_topic() {
        let booking = sample(SessionType::Other);
        let template = booking_request_template(&booking, "Grace", "Ada");
        assert!(template.subject.contains("Ada"));
        assert!(template.html_body.contains("$75.00"));
        assert!(template.html_body.contains("Async Rust"));
    }

    #[test]
    fn missing_schedule_renders_placeholder_instead_of_failing() {
        let mut booking = sample(SessionType::Other);
        booking.session_date = None;
        booking.session_time = None;

        let template = status_update_template(&booking, StatusChange::Cancelled, "Grace", "Ada");
        assert!(template.html_body.contains("to be scheduled"));
    }

    #[test]
    fn cancellation_goes_to_both_parties() {
        assert_eq!(recipients_for(StatusChange::Cancelled), Recipients::Both);
        assert_eq!(recipients_for(StatusChange::Accepted), Recipients::Mentee);
        assert_eq!(recipients_for(StatusChange::Declined), Recipients::Mentee);
        assert_eq!(recipients_for(StatusChange::Completed), Recipients::Mentor);
    }
}
