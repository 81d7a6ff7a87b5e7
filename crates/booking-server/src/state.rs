//! Application State

use std::sync::Arc;

use booking_core::{AdmissionConfig, BookingAdmission, SalonStore};
use booking_payments::{CheckoutInitiator, SignaturePolicy, SubscriptionReconciler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Salon and booking records
    pub store: Arc<dyn SalonStore>,

    /// Plan-gated booking admission
    pub admission: Arc<BookingAdmission>,

    /// Checkout initiator (optional - None if Stripe is not configured)
    pub checkout: Option<Arc<CheckoutInitiator>>,

    /// Webhook reconciler
    pub reconciler: Arc<SubscriptionReconciler>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SalonStore>,
        admission_config: AdmissionConfig,
        checkout: Option<CheckoutInitiator>,
        signature_policy: SignaturePolicy,
    ) -> Self {
        Self {
            admission: Arc::new(BookingAdmission::new(store.clone(), admission_config)),
            reconciler: Arc::new(SubscriptionReconciler::new(store.clone(), signature_policy)),
            checkout: checkout.map(Arc::new),
            store,
        }
    }
}
