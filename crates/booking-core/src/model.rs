//! Salon and Booking Records
//!
//! Strongly-typed rows of the external data store. Loosely-typed values
//! (plan and status strings) are normalized here, before they reach the
//! admission or reconciliation logic.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Salon identifier as issued by the data store
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalonId(String);

impl SalonId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SalonId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SalonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription plan tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Basic, Plan::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Premium => "premium",
        }
    }

    /// Strict parse; `None` for anything that is not a known tier
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "basic" => Some(Plan::Basic),
            "premium" => Some(Plan::Premium),
            _ => None,
        }
    }

    /// Normalize a stored value; unknown or missing falls back to `Free`
    pub fn from_stored(s: Option<&str>) -> Self {
        s.and_then(Self::parse).unwrap_or_default()
    }

    /// Whether the plan is sold through checkout
    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Basic => "Basic",
            Plan::Premium => "Premium",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side subscription status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            // the provider has used both spellings
            "canceled" | "cancelled" => Some(SubscriptionStatus::Canceled),
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Some(SubscriptionStatus::IncompleteExpired),
            "paused" => Some(SubscriptionStatus::Paused),
            _ => None,
        }
    }

    /// Statuses that revoke paid entitlements
    pub fn forces_free(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Canceled | SubscriptionStatus::Unpaid | SubscriptionStatus::PastDue
        )
    }

    /// Statuses under which a paid plan from metadata may be granted
    pub fn grants_plan(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant of the booking page builder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salon {
    pub id: SalonId,

    /// Public page path segment
    pub slug: String,

    pub name: String,

    pub owner_user_id: String,

    #[serde(default)]
    pub plan: Plan,

    #[serde(default)]
    pub subscription_status: Option<SubscriptionStatus>,

    #[serde(default)]
    pub stripe_customer_id: Option<String>,

    #[serde(default)]
    pub stripe_subscription_id: Option<String>,

    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,

    /// Creation time of the last provider event applied to this salon
    #[serde(default)]
    pub subscription_event_at: Option<DateTime<Utc>>,
}

impl Salon {
    /// Provision a salon on the free plan
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        owner_user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: SalonId::new(),
            slug: slug.into(),
            name: name.into(),
            owner_user_id: owner_user_id.into(),
            plan: Plan::Free,
            subscription_status: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
            subscription_event_at: None,
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    /// Apply a field patch; `None` fields are left untouched
    pub fn apply(&mut self, update: &SalonUpdate) {
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        if let Some(status) = update.subscription_status {
            self.subscription_status = Some(status);
        }
        if let Some(ref customer) = update.stripe_customer_id {
            self.stripe_customer_id = Some(customer.clone());
        }
        if let Some(ref subscription) = update.stripe_subscription_id {
            self.stripe_subscription_id = Some(subscription.clone());
        }
        if let Some(period_end) = update.current_period_end {
            self.current_period_end = Some(period_end);
        }
        if let Some(event_at) = update.subscription_event_at {
            self.subscription_event_at = Some(event_at);
        }
    }
}

/// Partial update of the subscription-related salon fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalonUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<SubscriptionStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_event_at: Option<DateTime<Utc>>,
}

impl SalonUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Accepted date format for bookings
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a booking time, with or without seconds
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// A single customer reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub salon_id: SalonId,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,

    /// `YYYY-MM-DD`
    pub booking_date: String,

    /// `HH:MM` or `HH:MM:SS`
    pub booking_time: String,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Scheduled moment in salon-local wall-clock time, if parseable
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = parse_date(&self.booking_date)?;
        let time = parse_time(&self.booking_time)?;
        Some(date.and_time(time))
    }
}

/// Customer-submitted booking form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub customer_name: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub customer_phone: Option<String>,

    #[serde(default)]
    pub booking_date: String,

    #[serde(default)]
    pub booking_time: String,

    #[serde(default)]
    pub notes: Option<String>,
}
