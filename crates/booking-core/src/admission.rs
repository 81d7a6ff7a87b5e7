//! Booking Admission Control
//!
//! Decides whether a customer's booking request is admitted for a salon,
//! given its plan quota and the bookings that currently count toward it.
//!
//! ```text
//! request ──▶ validate ──▶ plan ──▶ premium? ──yes──────────────┐
//!                                     │no                        │
//!                                     ▼                          ▼
//!                              count valid ──▶ re-count ──▶ insert ──▶ notify
//!                                     │ full        │ full
//!                                     ▼             ▼
//!                                LimitReached   LimitReached
//! ```
//!
//! Check and insert are separate store calls. Two requests racing on the
//! same quota boundary can both pass; the re-count right before the insert
//! narrows that window but does not close it.

use chrono::{Duration, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entitlement::{quota_for, BookingUsage, VALIDITY_GRACE_MINUTES};
use crate::error::{BookingError, Result};
use crate::model::{Booking, BookingRequest, Plan, Salon, SalonId};
use crate::store::SalonStore;
use crate::validation::validate;

/// Capacity of the live-update channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Time-based predicate deciding whether a booking counts toward quota
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityWindow {
    grace: Duration,
}

impl Default for ValidityWindow {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(VALIDITY_GRACE_MINUTES),
        }
    }
}

impl ValidityWindow {
    pub fn with_grace(grace: Duration) -> Self {
        Self { grace }
    }

    /// Future bookings, and past ones within the grace period, count.
    /// Bookings with an unparseable schedule never do.
    pub fn counts(&self, booking: &Booking, now: NaiveDateTime) -> bool {
        booking
            .scheduled_at()
            .is_some_and(|at| now - at <= self.grace)
    }

    pub fn count_valid(&self, bookings: &[Booking], now: NaiveDateTime) -> usize {
        bookings.iter().filter(|b| self.counts(b, now)).count()
    }
}

/// Live-update notifications for booking changes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    Admitted { booking: Booking },
    Deleted { salon_id: SalonId, booking_id: Uuid },
}

/// Admission evaluator configuration
#[derive(Clone, Debug)]
pub struct AdmissionConfig {
    /// Offset of the wall clock bookings are scheduled in
    pub utc_offset: FixedOffset,

    pub window: ValidityWindow,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            window: ValidityWindow::default(),
        }
    }
}

/// Plan-gated booking admission
pub struct BookingAdmission {
    store: Arc<dyn SalonStore>,
    config: AdmissionConfig,
    events: broadcast::Sender<BookingEvent>,
}

impl BookingAdmission {
    pub fn new(store: Arc<dyn SalonStore>, config: AdmissionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            config,
            events,
        }
    }

    /// Subscribe to admitted/deleted booking notifications
    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    /// Current wall-clock time in the salon's offset
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.config.utc_offset).naive_local()
    }

    async fn resolve(&self, salon_ref: &str) -> Result<Salon> {
        self.store
            .get_salon_by_id_or_slug(salon_ref)
            .await?
            .ok_or_else(|| BookingError::SalonNotFound(salon_ref.to_string()))
    }

    async fn count_valid(&self, salon_id: &SalonId, now: NaiveDateTime) -> Result<usize> {
        let bookings = self.store.list_bookings_for_salon(salon_id).await?;
        Ok(self.config.window.count_valid(&bookings, now))
    }

    /// Reject when the salon's valid bookings already fill its quota
    async fn ensure_capacity(&self, salon_id: &SalonId, plan: Plan, now: NaiveDateTime) -> Result<()> {
        let quota = quota_for(plan);
        let Some(limit) = quota.limit() else {
            return Ok(());
        };

        let count = self.count_valid(salon_id, now).await?;
        if quota.is_exhausted(count) {
            tracing::info!(
                salon_id = %salon_id,
                plan = %plan,
                count,
                quota = limit,
                "Booking limit reached"
            );
            return Err(BookingError::LimitReached {
                plan,
                count,
                quota: limit,
            });
        }

        Ok(())
    }

    /// Admit a booking request for the salon with the given id or slug
    pub async fn try_admit(&self, salon_ref: &str, request: &BookingRequest) -> Result<Booking> {
        self.try_admit_at(salon_ref, request, self.now()).await
    }

    /// Admission evaluated against an explicit "now"
    pub async fn try_admit_at(
        &self,
        salon_ref: &str,
        request: &BookingRequest,
        now: NaiveDateTime,
    ) -> Result<Booking> {
        let valid = validate(request)?;
        let salon = self.resolve(salon_ref).await?;

        let plan = self.store.get_salon_plan(&salon.id).await?;
        self.ensure_capacity(&salon.id, plan, now).await?;

        let booking = Booking {
            id: Uuid::new_v4(),
            salon_id: salon.id.clone(),
            customer_name: valid.customer_name,
            customer_email: valid.customer_email,
            customer_phone: valid.customer_phone,
            booking_date: valid.booking_date,
            booking_time: valid.booking_time,
            notes: valid.notes,
            created_at: Utc::now(),
        };

        // Re-check against fresh state right before writing.
        let plan = self.store.get_salon_plan(&salon.id).await?;
        self.ensure_capacity(&salon.id, plan, now).await?;

        let booking = self.store.insert_booking(booking).await?;

        tracing::info!(
            salon_id = %salon.id,
            booking_id = %booking.id,
            plan = %plan,
            date = %booking.booking_date,
            time = %booking.booking_time,
            "Booking admitted"
        );

        // No subscribers is fine.
        let _ = self.events.send(BookingEvent::Admitted {
            booking: booking.clone(),
        });

        Ok(booking)
    }

    /// Valid bookings against quota, as shown on the public page
    pub async fn usage(&self, salon_ref: &str) -> Result<BookingUsage> {
        self.usage_at(salon_ref, self.now()).await
    }

    pub async fn usage_at(&self, salon_ref: &str, now: NaiveDateTime) -> Result<BookingUsage> {
        let salon = self.resolve(salon_ref).await?;
        let count = self.count_valid(&salon.id, now).await?;
        Ok(BookingUsage::new(salon.plan, count))
    }

    /// Owner view of all bookings, ordered by schedule
    pub async fn list_bookings(&self, salon_ref: &str) -> Result<Vec<Booking>> {
        let salon = self.resolve(salon_ref).await?;
        let mut bookings = self.store.list_bookings_for_salon(&salon.id).await?;
        // Unparseable rows sort last, in stored order.
        bookings.sort_by_key(|b| {
            let at = b.scheduled_at();
            (at.is_none(), at)
        });
        Ok(bookings)
    }

    /// Owner deletion; not constrained by plan policy
    pub async fn delete_booking(&self, salon_ref: &str, booking_id: Uuid) -> Result<()> {
        let salon = self.resolve(salon_ref).await?;

        if !self.store.delete_booking(&salon.id, booking_id).await? {
            return Err(BookingError::BookingNotFound(booking_id.to_string()));
        }

        tracing::info!(salon_id = %salon.id, booking_id = %booking_id, "Booking deleted");

        let _ = self.events.send(BookingEvent::Deleted {
            salon_id: salon.id,
            booking_id,
        });

        Ok(())
    }
}
