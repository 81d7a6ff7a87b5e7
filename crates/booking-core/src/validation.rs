//! Booking Request Validation
//!
//! Checks are applied in form order and the first failure is reported.
//! Accepted dates and times are stored zero-padded so they sort by schedule.

use std::borrow::Cow;

use chrono::Timelike;
use validator::{Validate, ValidateEmail, ValidationErrors};

use crate::error::{BookingError, Result};
use crate::model::{parse_date, parse_time, BookingRequest, DATE_FORMAT};

pub const MAX_NAME_LEN: u64 = 100;
pub const MAX_PHONE_LEN: u64 = 20;
pub const MAX_NOTES_LEN: u64 = 500;

/// A booking request that passed validation, with blank optionals removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidBooking {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub booking_date: String,
    pub booking_time: String,
    pub notes: Option<String>,
}

/// Trimmed form fields with the declarative format rules
#[derive(Debug, Validate)]
struct BookingForm {
    #[validate(length(max = MAX_NAME_LEN, message = "Name must be at most 100 characters"))]
    customer_name: String,

    #[validate(email(message = "Invalid email"))]
    customer_email: Option<String>,

    #[validate(length(max = MAX_PHONE_LEN, message = "Phone must be at most 20 characters"))]
    customer_phone: Option<String>,

    booking_date: String,
    booking_time: String,

    #[validate(length(max = MAX_NOTES_LEN, message = "Notes must be at most 500 characters"))]
    notes: Option<String>,
}

impl From<&BookingRequest> for BookingForm {
    fn from(request: &BookingRequest) -> Self {
        Self {
            customer_name: request.customer_name.trim().to_string(),
            customer_email: non_blank(request.customer_email.as_ref()),
            customer_phone: non_blank(request.customer_phone.as_ref()),
            booking_date: request.booking_date.trim().to_string(),
            booking_time: request.booking_time.trim().to_string(),
            notes: non_blank(request.notes.as_ref()),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Email format check shared with the booking form
pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

/// Fail with the first rule violated on `field`, if any
fn check(errors: Option<&ValidationErrors>, field: &'static str) -> Result<()> {
    let Some(error) = errors
        .and_then(|e| e.field_errors().get(field).copied())
        .and_then(|list| list.first())
    else {
        return Ok(());
    };

    let message = error
        .message
        .clone()
        .unwrap_or_else(|| Cow::Owned(format!("Invalid {field}")));
    Err(BookingError::validation(field, message))
}

pub fn validate(request: &BookingRequest) -> Result<ValidBooking> {
    let form = BookingForm::from(request);
    let errors = form.validate().err();
    let errors = errors.as_ref();

    if form.customer_name.is_empty() {
        return Err(BookingError::validation("customer_name", "Name is required"));
    }
    check(errors, "customer_name")?;
    check(errors, "customer_email")?;
    check(errors, "customer_phone")?;

    if form.customer_email.is_none() && form.customer_phone.is_none() {
        return Err(BookingError::validation(
            "customer_phone",
            "Phone or email is required",
        ));
    }

    if form.booking_date.is_empty() {
        return Err(BookingError::validation("booking_date", "Date is required"));
    }
    let date = parse_date(&form.booking_date).ok_or_else(|| {
        BookingError::validation("booking_date", "Date must be formatted as YYYY-MM-DD")
    })?;

    if form.booking_time.is_empty() {
        return Err(BookingError::validation("booking_time", "Time is required"));
    }
    let time = parse_time(&form.booking_time).ok_or_else(|| {
        BookingError::validation("booking_time", "Time must be formatted as HH:MM")
    })?;

    check(errors, "notes")?;

    let booking_time = if time.second() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    };

    Ok(ValidBooking {
        customer_name: form.customer_name,
        customer_email: form.customer_email,
        customer_phone: form.customer_phone,
        booking_date: date.format(DATE_FORMAT).to_string(),
        booking_time,
        notes: form.notes,
    })
}
