use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}
