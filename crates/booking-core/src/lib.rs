//! # booking-core
//!
//! Plan-gated booking admission for salon booking pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BookingAdmission                        │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌────────────────┐   │
//! │  │ Validation  │──│ Entitlement     │──│  SalonStore    │   │
//! │  │             │  │ Policy (quota)  │  │  (Strategy)    │   │
//! │  └─────────────┘  └─────────────────┘  └────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `SalonStore` trait is the only path to persisted salons and bookings,
//! so the hosted data store can be swapped without touching admission logic.

pub mod admission;
pub mod entitlement;
pub mod error;
pub mod model;
pub mod store;
pub mod validation;

pub use admission::{AdmissionConfig, BookingAdmission, BookingEvent, ValidityWindow};
pub use entitlement::{entitlements_for, quota_for, BookingUsage, Entitlements, Features, Quota};
pub use error::{BookingError, Result};
pub use model::{Booking, BookingRequest, Plan, Salon, SalonId, SalonUpdate, SubscriptionStatus};
pub use store::{MemorySalonStore, SalonStore};
