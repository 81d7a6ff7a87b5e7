//! Entitlement Policy
//!
//! Static mapping from plan tier to booking quota and feature access.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────────────────────────┐
//! │  Plan    │  Quota       │  Page customization                  │
//! ├──────────┼──────────────┼──────────────────────────────────────┤
//! │  free    │  10          │  name, address, link                 │
//! │  basic   │  45          │  + logo, background, colors          │
//! │  premium │  unlimited   │  + fonts, booking modal, support     │
//! └──────────┴──────────────┴──────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::model::Plan;

/// Grace period after a booking's scheduled moment during which it still counts
pub const VALIDITY_GRACE_MINUTES: i64 = 15;

/// Maximum number of concurrently valid bookings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "limit")]
pub enum Quota {
    Limited(u32),
    Unlimited,
}

impl Quota {
    /// Whether `count` valid bookings leave no room for another
    pub fn is_exhausted(&self, count: usize) -> bool {
        match self {
            Quota::Limited(limit) => count >= *limit as usize,
            Quota::Unlimited => false,
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Quota::Limited(limit) => Some(*limit),
            Quota::Unlimited => None,
        }
    }
}

/// Page customization features unlocked by a plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    pub custom_logo: bool,
    pub custom_background: bool,
    pub custom_colors: bool,
    pub custom_fonts: bool,
    pub booking_modal_styling: bool,
    pub priority_support: bool,
}

/// Everything a plan entitles a salon to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    pub plan: Plan,
    pub quota: Quota,
    pub features: Features,
}

/// Booking quota for a plan
pub fn quota_for(plan: Plan) -> Quota {
    match plan {
        Plan::Free => Quota::Limited(10),
        Plan::Basic => Quota::Limited(45),
        Plan::Premium => Quota::Unlimited,
    }
}

pub fn features_for(plan: Plan) -> Features {
    let paid = plan.is_paid();
    let premium = plan == Plan::Premium;
    Features {
        custom_logo: paid,
        custom_background: paid,
        custom_colors: paid,
        custom_fonts: premium,
        booking_modal_styling: premium,
        priority_support: premium,
    }
}

pub fn entitlements_for(plan: Plan) -> Entitlements {
    Entitlements {
        plan,
        quota: quota_for(plan),
        features: features_for(plan),
    }
}

/// Current booking usage against the plan quota
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingUsage {
    pub plan: Plan,
    pub valid_bookings: usize,
    pub quota: Quota,
    pub limit_reached: bool,
}

impl BookingUsage {
    pub fn new(plan: Plan, valid_bookings: usize) -> Self {
        let quota = quota_for(plan);
        Self {
            plan,
            valid_bookings,
            quota,
            limit_reached: quota.is_exhausted(valid_bookings),
        }
    }
}
