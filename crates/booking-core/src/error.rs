//! Error Types

use thiserror::Error;

use crate::model::Plan;

/// Result type alias for booking operations
pub type Result<T> = std::result::Result<T, BookingError>;

/// Booking error types
#[derive(Error, Debug)]
pub enum BookingError {
    /// Booking request failed validation
    #[error("Validation error on {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Plan quota exhausted
    #[error("Booking limit reached: {count}/{quota} on the {plan} plan")]
    LimitReached { plan: Plan, count: usize, quota: u32 },

    /// Salon id or slug resolved to nothing
    #[error("Salon not found: {0}")]
    SalonNotFound(String),

    /// Booking not found for the salon
    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// Backing store unavailable or call failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BookingError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// The core never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Storage(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            BookingError::Validation { message, .. } => message.clone(),
            BookingError::LimitReached { plan, quota, .. } => format!(
                "This salon has reached its limit of {} bookings on the {} plan. Please try again later or contact the salon.",
                quota,
                plan.display_name(),
            ),
            BookingError::SalonNotFound(_) => "This booking link is not valid.".into(),
            BookingError::BookingNotFound(_) => "Booking not found.".into(),
            _ => "We could not complete your booking. Please try again.".into(),
        }
    }
}
