use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateMentorProfileRequest {
    pub hourly_rate: Decimal,
    pub experience_level: Option<String>,
    pub bio: Option<String>,
}
