//! Stripe Webhook Handling
//!
//! Reconciles subscription lifecycle events into salon plan/status fields.
//!
//! Every mutation is an unconditional overwrite keyed by the salon id from
//! the event metadata, so redelivering an event converges to the same state.
//! Events older than the last one applied to a salon are skipped, which keeps
//! a late-arriving stale event from rewinding the plan.
//!
//! Storage failures never surface to Stripe: they are logged as
//! reconciliation faults and the delivery is still acknowledged, so a broken
//! store cannot trigger a retry storm.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use booking_core::{Plan, SalonId, SalonStore, SalonUpdate, SubscriptionStatus};

use crate::checkout::{META_PLAN_ID, META_SALON_ID};
use crate::error::{PaymentError, Result};
use crate::signature::SignaturePolicy;

/// Length of the billing period assumed when a checkout completes
pub const CHECKOUT_PERIOD_DAYS: i64 = 30;

/// Checkout session mode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutMode {
    Subscription,
    Payment,
    Other(String),
}

impl CheckoutMode {
    fn parse(mode: Option<&str>) -> Self {
        match mode {
            Some("subscription") => CheckoutMode::Subscription,
            Some("payment") => CheckoutMode::Payment,
            other => CheckoutMode::Other(other.unwrap_or_default().to_string()),
        }
    }
}

/// Subscription state carried by `customer.subscription.*` events
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub subscription_id: String,
    pub salon_id: Option<SalonId>,
    /// `None` when Stripe sent a status this service does not know
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<Plan>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout completed - grant the purchased plan
    CheckoutCompleted {
        session_id: String,
        mode: CheckoutMode,
        salon_id: Option<SalonId>,
        plan: Option<Plan>,
        subscription_id: Option<String>,
        customer_id: Option<String>,
    },

    /// Subscription status changed
    SubscriptionUpdated(SubscriptionChange),

    /// Subscription ended
    SubscriptionDeleted(SubscriptionChange),

    /// One-off payment succeeded
    PaymentIntentSucceeded {
        payment_intent_id: String,
        salon_id: Option<SalonId>,
        plan: Option<Plan>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Event plus the envelope fields used for ordering
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookEnvelope {
    pub id: String,
    pub created: Option<DateTime<Utc>>,
    pub event: WebhookEvent,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: Option<i64>,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Either a bare id or an expanded object with an id
#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn into_id(self) -> String {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

type Metadata = HashMap<String, String>;

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    subscription: Option<Expandable>,
    #[serde(default)]
    customer: Option<Expandable>,
}

#[derive(Deserialize)]
struct RawSubscription {
    id: String,
    status: String,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    current_period_end: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPaymentIntent {
    id: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

fn meta_salon(metadata: Option<&Metadata>) -> Option<SalonId> {
    metadata
        .and_then(|m| m.get(META_SALON_ID))
        .filter(|s| !s.is_empty())
        .map(SalonId::from_string)
}

/// Strict: an unknown plan string is treated as absent
fn meta_plan(metadata: Option<&Metadata>) -> Option<Plan> {
    metadata
        .and_then(|m| m.get(META_PLAN_ID))
        .and_then(|p| Plan::parse(p))
}

fn object<T: serde::de::DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| PaymentError::WebhookParse(format!("invalid {what} data: {e}")))
}

fn subscription_change(value: serde_json::Value) -> Result<SubscriptionChange> {
    let sub: RawSubscription = object(value, "subscription")?;

    let status = SubscriptionStatus::parse(&sub.status);
    if status.is_none() {
        tracing::warn!(
            subscription_id = %sub.id,
            status = %sub.status,
            "Unknown subscription status, leaving status and plan unchanged"
        );
    }

    let current_period_end = sub
        .current_period_end
        .as_ref()
        .and_then(serde_json::Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Ok(SubscriptionChange {
        subscription_id: sub.id,
        salon_id: meta_salon(sub.metadata.as_ref()),
        status,
        plan: meta_plan(sub.metadata.as_ref()),
        current_period_end,
    })
}

/// Parse a raw webhook body into our event type
pub fn parse_event(payload: &[u8]) -> Result<WebhookEnvelope> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::WebhookParse(format!("failed to parse event: {e}")))?;

    let event = match raw.event_type.as_str() {
        "checkout.session.completed" => {
            let session: RawCheckoutSession = object(raw.data.object, "checkout session")?;
            WebhookEvent::CheckoutCompleted {
                session_id: session.id,
                mode: CheckoutMode::parse(session.mode.as_deref()),
                salon_id: meta_salon(session.metadata.as_ref()),
                plan: meta_plan(session.metadata.as_ref()),
                subscription_id: session.subscription.map(Expandable::into_id),
                customer_id: session.customer.map(Expandable::into_id),
            }
        }

        "customer.subscription.updated" => {
            WebhookEvent::SubscriptionUpdated(subscription_change(raw.data.object)?)
        }

        "customer.subscription.deleted" => {
            WebhookEvent::SubscriptionDeleted(subscription_change(raw.data.object)?)
        }

        "payment_intent.succeeded" => {
            let intent: RawPaymentIntent = object(raw.data.object, "payment intent")?;
            WebhookEvent::PaymentIntentSucceeded {
                payment_intent_id: intent.id,
                salon_id: meta_salon(intent.metadata.as_ref()),
                plan: meta_plan(intent.metadata.as_ref()),
            }
        }

        other => WebhookEvent::Other {
            event_type: other.to_string(),
        },
    };

    Ok(WebhookEnvelope {
        id: raw.id,
        created: raw.created.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        event,
    })
}

/// What reconciliation did with a delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Salon fields overwritten
    Applied { salon_id: SalonId, update: SalonUpdate },

    /// Event lacked what its handler needs
    Skipped { reason: &'static str },

    /// Event is older than the last one applied to the salon
    Stale {
        salon_id: SalonId,
        event_at: DateTime<Utc>,
        last_applied: DateTime<Utc>,
    },

    /// Event type we do not act on
    Ignored { event_type: String },

    /// Body could not be parsed
    Unparseable { error: String },

    /// Store failed; logged and acknowledged anyway
    Faulted { error: String },
}

/// Update to apply for an event, keyed by salon
struct PlannedUpdate {
    salon_id: SalonId,
    update: SalonUpdate,
}

/// Applies provider events to salon entitlement state
pub struct SubscriptionReconciler {
    store: Arc<dyn SalonStore>,
    policy: SignaturePolicy,
}

impl SubscriptionReconciler {
    pub fn new(store: Arc<dyn SalonStore>, policy: SignaturePolicy) -> Self {
        Self { store, policy }
    }

    pub fn signature_policy(&self) -> &SignaturePolicy {
        &self.policy
    }

    /// Verify, parse and apply a webhook delivery.
    ///
    /// Only a signature failure is returned as an error; everything past
    /// authentication is acknowledged.
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<ReconcileOutcome> {
        self.policy.verify(payload, signature)?;

        let envelope = match parse_event(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable webhook body");
                return Ok(ReconcileOutcome::Unparseable {
                    error: e.to_string(),
                });
            }
        };

        tracing::info!(event_id = %envelope.id, event = ?envelope.event, "Processing Stripe webhook");

        match self.apply(&envelope).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let fault = PaymentError::Reconciliation(e.to_string());
                tracing::error!(event_id = %envelope.id, error = %fault, "Webhook reconciliation failed");
                Ok(ReconcileOutcome::Faulted {
                    error: fault.to_string(),
                })
            }
        }
    }

    /// Apply a parsed event to the store
    pub async fn apply(&self, envelope: &WebhookEnvelope) -> Result<ReconcileOutcome> {
        let planned = match Self::plan_update(envelope) {
            Ok(planned) => planned,
            Err(outcome) => {
                if let ReconcileOutcome::Skipped { reason } = &outcome {
                    tracing::warn!(event_id = %envelope.id, reason, "Skipping webhook event");
                } else {
                    tracing::debug!(event_id = %envelope.id, outcome = ?outcome, "Unhandled webhook event");
                }
                return Ok(outcome);
            }
        };

        self.write(planned, envelope.created).await
    }

    /// Translate an event into salon field overwrites
    fn plan_update(envelope: &WebhookEnvelope) -> std::result::Result<PlannedUpdate, ReconcileOutcome> {
        match &envelope.event {
            WebhookEvent::CheckoutCompleted {
                mode,
                salon_id,
                plan,
                subscription_id,
                customer_id,
                ..
            } => match mode {
                CheckoutMode::Subscription => {
                    let (Some(salon_id), Some(plan), Some(subscription_id), Some(customer_id)) =
                        (salon_id, plan, subscription_id, customer_id)
                    else {
                        return Err(ReconcileOutcome::Skipped {
                            reason: "checkout missing salonId, planId, subscription or customer",
                        });
                    };

                    // Anchored on the event time so redelivery yields the same period end.
                    let base = envelope.created.unwrap_or_else(Utc::now);

                    Ok(PlannedUpdate {
                        salon_id: salon_id.clone(),
                        update: SalonUpdate {
                            plan: Some(*plan),
                            subscription_status: Some(SubscriptionStatus::Active),
                            stripe_customer_id: Some(customer_id.clone()),
                            stripe_subscription_id: Some(subscription_id.clone()),
                            current_period_end: Some(base + Duration::days(CHECKOUT_PERIOD_DAYS)),
                            ..Default::default()
                        },
                    })
                }

                CheckoutMode::Payment => plan_only(salon_id.as_ref(), *plan),

                CheckoutMode::Other(_) => Err(ReconcileOutcome::Skipped {
                    reason: "checkout mode is neither subscription nor payment",
                }),
            },

            WebhookEvent::SubscriptionUpdated(change) | WebhookEvent::SubscriptionDeleted(change) => {
                let Some(salon_id) = &change.salon_id else {
                    return Err(ReconcileOutcome::Skipped {
                        reason: "subscription has no salonId metadata",
                    });
                };

                let plan = if change.status.is_some_and(|s| s.forces_free()) {
                    Some(Plan::Free)
                } else if change.status.is_some_and(|s| s.grants_plan()) {
                    change.plan.filter(Plan::is_paid)
                } else {
                    None
                };

                Ok(PlannedUpdate {
                    salon_id: salon_id.clone(),
                    update: SalonUpdate {
                        plan,
                        subscription_status: change.status,
                        current_period_end: change.current_period_end,
                        ..Default::default()
                    },
                })
            }

            WebhookEvent::PaymentIntentSucceeded { salon_id, plan, .. } => {
                plan_only(salon_id.as_ref(), *plan)
            }

            WebhookEvent::Other { event_type } => Err(ReconcileOutcome::Ignored {
                event_type: event_type.clone(),
            }),
        }
    }

    async fn write(&self, planned: PlannedUpdate, created: Option<DateTime<Utc>>) -> Result<ReconcileOutcome> {
        let PlannedUpdate {
            salon_id,
            mut update,
        } = planned;

        let Some(salon) = self.store.get_salon(&salon_id).await? else {
            tracing::warn!(salon_id = %salon_id, "Webhook references unknown salon");
            return Ok(ReconcileOutcome::Skipped {
                reason: "salon not found",
            });
        };

        if let Some(event_at) = created {
            if let Some(last_applied) = salon.subscription_event_at {
                if event_at < last_applied {
                    tracing::warn!(
                        salon_id = %salon_id,
                        event_at = %event_at,
                        last_applied = %last_applied,
                        "Skipping stale webhook event"
                    );
                    return Ok(ReconcileOutcome::Stale {
                        salon_id,
                        event_at,
                        last_applied,
                    });
                }
            }
            update.subscription_event_at = Some(event_at);
        }

        let updated = self.store.update_salon(&salon_id, &update).await?;

        tracing::info!(
            salon_id = %salon_id,
            plan = %updated.plan,
            status = ?updated.subscription_status,
            "Updated salon subscription"
        );

        Ok(ReconcileOutcome::Applied { salon_id, update })
    }
}

fn plan_only(
    salon_id: Option<&SalonId>,
    plan: Option<Plan>,
) -> std::result::Result<PlannedUpdate, ReconcileOutcome> {
    match (salon_id, plan) {
        (Some(salon_id), Some(plan)) => Ok(PlannedUpdate {
            salon_id: salon_id.clone(),
            update: SalonUpdate {
                plan: Some(plan),
                ..Default::default()
            },
        }),
        _ => Err(ReconcileOutcome::Skipped {
            reason: "missing salonId or planId metadata",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use booking_core::{Booking, BookingError, MemorySalonStore, Salon};
    use serde_json::json;

    const CREATED: i64 = 1_767_225_600; // 2026-01-01T00:00:00Z

    async fn setup(plan: Plan) -> (Arc<MemorySalonStore>, SubscriptionReconciler, SalonId) {
        let store = Arc::new(MemorySalonStore::new());
        let salon = store
            .insert_salon(Salon::new("studio", "Studio", "user-1").with_plan(plan))
            .await
            .unwrap();
        let reconciler = SubscriptionReconciler::new(store.clone(), SignaturePolicy::Disabled);
        (store, reconciler, salon.id)
    }

    fn event(event_type: &str, created: i64, object: serde_json::Value) -> Vec<u8> {
        json!({
            "id": format!("evt_{created}"),
            "type": event_type,
            "created": created,
            "data": { "object": object },
        })
        .to_string()
        .into_bytes()
    }

    fn checkout_completed(salon_id: &SalonId, created: i64) -> Vec<u8> {
        event(
            "checkout.session.completed",
            created,
            json!({
                "id": "cs_test_1",
                "mode": "subscription",
                "subscription": "sub_123",
                "customer": { "id": "cus_456", "object": "customer" },
                "metadata": { "userId": "user-1", "salonId": salon_id.as_str(), "planId": "premium" },
            }),
        )
    }

    fn subscription_event(
        event_type: &str,
        salon_id: &SalonId,
        status: &str,
        plan: Option<&str>,
        created: i64,
    ) -> Vec<u8> {
        let mut metadata = json!({ "salonId": salon_id.as_str() });
        if let Some(plan) = plan {
            metadata["planId"] = json!(plan);
        }
        event(
            event_type,
            created,
            json!({
                "id": "sub_123",
                "status": status,
                "metadata": metadata,
                "current_period_end": CREATED + 86_400 * 31,
            }),
        )
    }

    #[tokio::test]
    async fn test_checkout_subscription_grants_plan() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;

        let outcome = reconciler
            .handle(&checkout_completed(&salon_id, CREATED), None)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Premium);
        assert_eq!(salon.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(salon.stripe_customer_id.as_deref(), Some("cus_456"));
        assert_eq!(salon.stripe_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(
            salon.current_period_end,
            DateTime::from_timestamp(CREATED + 30 * 86_400, 0)
        );
    }

    #[tokio::test]
    async fn test_checkout_redelivery_is_idempotent() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;
        let payload = checkout_completed(&salon_id, CREATED);

        reconciler.handle(&payload, None).await.unwrap();
        let once = store.get_salon(&salon_id).await.unwrap().unwrap();

        reconciler.handle(&payload, None).await.unwrap();
        let twice = store.get_salon(&salon_id).await.unwrap().unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_checkout_payment_mode_sets_plan_only() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;
        let payload = event(
            "checkout.session.completed",
            CREATED,
            json!({
                "id": "cs_test_2",
                "mode": "payment",
                "metadata": { "salonId": salon_id.as_str(), "planId": "basic" },
            }),
        );

        reconciler.handle(&payload, None).await.unwrap();

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Basic);
        assert!(salon.subscription_status.is_none());
        assert!(salon.stripe_customer_id.is_none());
    }

    #[tokio::test]
    async fn test_checkout_missing_customer_is_skipped() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;
        let payload = event(
            "checkout.session.completed",
            CREATED,
            json!({
                "id": "cs_test_3",
                "mode": "subscription",
                "subscription": "sub_123",
                "metadata": { "salonId": salon_id.as_str(), "planId": "premium" },
            }),
        );

        let outcome = reconciler.handle(&payload, None).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Skipped { .. }));
        assert_eq!(store.get_salon_plan(&salon_id).await.unwrap(), Plan::Free);
    }

    #[tokio::test]
    async fn test_unknown_plan_metadata_is_skipped() {
        let (store, reconciler, salon_id) = setup(Plan::Basic).await;
        let payload = event(
            "payment_intent.succeeded",
            CREATED,
            json!({ "id": "pi_1", "metadata": { "salonId": salon_id.as_str(), "planId": "gold" } }),
        );

        let outcome = reconciler.handle(&payload, None).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Skipped { .. }));
        assert_eq!(store.get_salon_plan(&salon_id).await.unwrap(), Plan::Basic);
    }

    #[tokio::test]
    async fn test_canceled_forces_free_despite_metadata() {
        let (store, reconciler, salon_id) = setup(Plan::Premium).await;
        let payload = subscription_event(
            "customer.subscription.updated",
            &salon_id,
            "canceled",
            Some("premium"),
            CREATED,
        );

        reconciler.handle(&payload, None).await.unwrap();

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Free);
        assert_eq!(salon.subscription_status, Some(SubscriptionStatus::Canceled));
    }

    #[tokio::test]
    async fn test_past_due_and_unpaid_force_free() {
        for status in ["past_due", "unpaid"] {
            let (store, reconciler, salon_id) = setup(Plan::Basic).await;
            let payload =
                subscription_event("customer.subscription.updated", &salon_id, status, None, CREATED);
            reconciler.handle(&payload, None).await.unwrap();
            assert_eq!(store.get_salon_plan(&salon_id).await.unwrap(), Plan::Free, "{status}");
        }
    }

    #[tokio::test]
    async fn test_active_update_with_plan_and_period_end() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;
        let payload = subscription_event(
            "customer.subscription.updated",
            &salon_id,
            "trialing",
            Some("basic"),
            CREATED,
        );

        reconciler.handle(&payload, None).await.unwrap();

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Basic);
        assert_eq!(salon.subscription_status, Some(SubscriptionStatus::Trialing));
        assert_eq!(salon.current_period_end, DateTime::from_timestamp(CREATED + 86_400 * 31, 0));
    }

    #[tokio::test]
    async fn test_active_update_without_plan_keeps_plan() {
        let (store, reconciler, salon_id) = setup(Plan::Premium).await;
        let payload =
            subscription_event("customer.subscription.updated", &salon_id, "active", None, CREATED);

        reconciler.handle(&payload, None).await.unwrap();

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Premium);
        assert_eq!(salon.subscription_status, Some(SubscriptionStatus::Active));
    }

    #[tokio::test]
    async fn test_incomplete_status_leaves_plan() {
        let (store, reconciler, salon_id) = setup(Plan::Basic).await;
        let payload = subscription_event(
            "customer.subscription.updated",
            &salon_id,
            "incomplete",
            Some("premium"),
            CREATED,
        );

        reconciler.handle(&payload, None).await.unwrap();
        assert_eq!(store.get_salon_plan(&salon_id).await.unwrap(), Plan::Basic);
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_plan_and_period_end_applies() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;
        let active =
            subscription_event("customer.subscription.updated", &salon_id, "active", Some("premium"), CREATED);
        reconciler.handle(&active, None).await.unwrap();

        let period_end = CREATED + 86_400 * 62;
        let payload = event(
            "customer.subscription.updated",
            CREATED + 60,
            json!({
                "id": "sub_123",
                "status": "on_hold",
                "metadata": { "salonId": salon_id.as_str(), "planId": "basic" },
                "current_period_end": period_end,
            }),
        );

        let outcome = reconciler.handle(&payload, None).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Premium);
        assert_eq!(salon.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(salon.current_period_end, DateTime::from_timestamp(period_end, 0));
    }

    #[tokio::test]
    async fn test_subscription_deleted_downgrades() {
        let (store, reconciler, salon_id) = setup(Plan::Premium).await;
        let payload = subscription_event(
            "customer.subscription.deleted",
            &salon_id,
            "canceled",
            Some("premium"),
            CREATED,
        );

        reconciler.handle(&payload, None).await.unwrap();
        assert_eq!(store.get_salon_plan(&salon_id).await.unwrap(), Plan::Free);
    }

    #[tokio::test]
    async fn test_payment_intent_sets_plan() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;
        let payload = event(
            "payment_intent.succeeded",
            CREATED,
            json!({ "id": "pi_1", "metadata": { "salonId": salon_id.as_str(), "planId": "premium" } }),
        );

        reconciler.handle(&payload, None).await.unwrap();
        assert_eq!(store.get_salon_plan(&salon_id).await.unwrap(), Plan::Premium);
    }

    #[tokio::test]
    async fn test_stale_event_does_not_rewind() {
        let (store, reconciler, salon_id) = setup(Plan::Free).await;

        let cancel = subscription_event(
            "customer.subscription.deleted",
            &salon_id,
            "canceled",
            None,
            CREATED + 3_600,
        );
        reconciler.handle(&cancel, None).await.unwrap();

        let late_active = subscription_event(
            "customer.subscription.updated",
            &salon_id,
            "active",
            Some("premium"),
            CREATED,
        );
        let outcome = reconciler.handle(&late_active, None).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Stale { .. }));

        let salon = store.get_salon(&salon_id).await.unwrap().unwrap();
        assert_eq!(salon.plan, Plan::Free);
        assert_eq!(salon.subscription_status, Some(SubscriptionStatus::Canceled));
    }

    #[tokio::test]
    async fn test_unknown_event_and_salon() {
        let (_store, reconciler, _salon_id) = setup(Plan::Free).await;

        let outcome = reconciler
            .handle(&event("invoice.paid", CREATED, json!({ "id": "in_1" })), None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                event_type: "invoice.paid".into()
            }
        );

        let outcome = reconciler
            .handle(&checkout_completed(&SalonId::from_string("ghost"), CREATED), None)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped { reason: "salon not found" });
    }

    #[tokio::test]
    async fn test_garbage_body_is_acknowledged() {
        let (_store, reconciler, _salon_id) = setup(Plan::Free).await;
        let outcome = reconciler.handle(b"not json", None).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Unparseable { .. }));
    }

    fn stripe_header(payload: &[u8], secret: &str) -> String {
        use hmac::{Hmac, Mac};

        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[tokio::test]
    async fn test_signature_required() {
        let store = Arc::new(MemorySalonStore::new());
        let salon = store.insert_salon(Salon::new("s", "S", "u")).await.unwrap();
        let reconciler = SubscriptionReconciler::new(
            store.clone(),
            SignaturePolicy::from_secret(Some("whsec_test")),
        );
        let payload = checkout_completed(&salon.id, Utc::now().timestamp());

        let unsigned = reconciler.handle(&payload, None).await;
        assert!(matches!(unsigned, Err(PaymentError::WebhookSignature(_))));

        let forged = stripe_header(&payload, "whsec_other");
        assert!(reconciler.handle(&payload, Some(&forged)).await.is_err());
        assert_eq!(store.get_salon_plan(&salon.id).await.unwrap(), Plan::Free);

        let signed = stripe_header(&payload, "whsec_test");
        reconciler.handle(&payload, Some(&signed)).await.unwrap();
        assert_eq!(store.get_salon_plan(&salon.id).await.unwrap(), Plan::Premium);
    }

    /// Store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl SalonStore for BrokenStore {
        async fn insert_salon(&self, _salon: Salon) -> booking_core::Result<Salon> {
            Err(BookingError::Storage("down".into()))
        }

        async fn get_salon(&self, _id: &SalonId) -> booking_core::Result<Option<Salon>> {
            Err(BookingError::Storage("down".into()))
        }

        async fn get_salon_by_id_or_slug(&self, _id_or_slug: &str) -> booking_core::Result<Option<Salon>> {
            Err(BookingError::Storage("down".into()))
        }

        async fn list_bookings_for_salon(&self, _salon_id: &SalonId) -> booking_core::Result<Vec<Booking>> {
            Err(BookingError::Storage("down".into()))
        }

        async fn insert_booking(&self, _booking: Booking) -> booking_core::Result<Booking> {
            Err(BookingError::Storage("down".into()))
        }

        async fn delete_booking(&self, _salon_id: &SalonId, _booking_id: uuid::Uuid) -> booking_core::Result<bool> {
            Err(BookingError::Storage("down".into()))
        }

        async fn update_salon(&self, _id: &SalonId, _update: &SalonUpdate) -> booking_core::Result<Salon> {
            Err(BookingError::Storage("down".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_fault_is_acknowledged() {
        let reconciler = SubscriptionReconciler::new(Arc::new(BrokenStore), SignaturePolicy::Disabled);
        let outcome = reconciler
            .handle(&checkout_completed(&SalonId::from_string("s1"), CREATED), None)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Faulted { .. }));
    }
}
