//! # booking-payments
//!
//! Plan purchases and subscription reconciliation for salons.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  create_checkout  ┌─────────────────┐  webhook   ┌──────────────┐
//! │  Dashboard  │──────────────────▶│ Stripe Checkout │───────────▶│  Reconciler  │
//! │  (pricing)  │◀──────────────────│  (hosted page)  │            │ salon.plan = │
//! └─────────────┘   success_url     └─────────────────┘            └──────────────┘
//! ```
//!
//! Checkout never changes the plan. The salon is upgraded only when the
//! provider reports the payment through a webhook, and downgraded to free when
//! a subscription lapses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booking_payments::{CheckoutConfig, CheckoutInitiator, CheckoutRequest, StripeClient};
//!
//! let provider = Arc::new(StripeClient::from_env()?);
//! let checkout = CheckoutInitiator::new(provider, CheckoutConfig::from_env());
//!
//! let session = checkout.create_checkout(CheckoutRequest {
//!     plan: Plan::Premium,
//!     salon_id: salon.id.clone(),
//!     user_id: "user-1".into(),
//!     user_email: Some("owner@example.com".into()),
//! }).await?;
//!
//! // Redirect the owner to: session.checkout_url
//! ```

mod checkout;
mod error;
pub mod signature;
mod webhook;

pub use checkout::{
    CheckoutConfig, CheckoutInitiator, CheckoutProvider, CheckoutRequest, CheckoutSession,
    CreatedSession, PriceTable, SessionParams, StripeClient, META_PLAN_ID, META_SALON_ID,
    META_USER_ID,
};
pub use error::{PaymentError, Result};
pub use signature::SignaturePolicy;
pub use webhook::{
    parse_event, CheckoutMode, ReconcileOutcome, SubscriptionChange, SubscriptionReconciler,
    WebhookEnvelope, WebhookEvent, CHECKOUT_PERIOD_DAYS,
};
