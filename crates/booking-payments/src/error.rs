//! Payment Error Types

use thiserror::Error;

use booking_core::{BookingError, Plan};

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Checkout request is missing a field
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// Plan cannot be bought through checkout
    #[error("Plan not purchasable: {0}")]
    InvalidPlan(Plan),

    /// Salon already holds the requested plan
    #[error("Salon is already on the {0} plan")]
    AlreadyOnPlan(Plan),

    /// Configuration error (e.g. no price for a plan)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store failed while applying a provider event
    #[error("Reconciliation fault: {0}")]
    Reconciliation(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Stripe(_) | PaymentError::Storage(_) | PaymentError::Reconciliation(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.",
            PaymentError::InvalidRequest(_) => "Missing required fields: plan, user and salon.",
            PaymentError::InvalidPlan(_) => "This plan cannot be purchased.",
            PaymentError::AlreadyOnPlan(_) => "You are already on this plan.",
            PaymentError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}

impl From<BookingError> for PaymentError {
    fn from(err: BookingError) -> Self {
        PaymentError::Storage(err.to_string())
    }
}
