//! Stripe Checkout Integration
//!
//! Creates hosted checkout sessions for plan upgrades. The session metadata
//! (`userId`, `salonId`, `planId`) is the only link the reconciler has back to
//! the salon once Stripe reports the payment, so it is set on both the session
//! and its subscription.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionPaymentMethodTypes, CreateCheckoutSessionSubscriptionData,
};

use booking_core::{Plan, SalonId};

use crate::error::{PaymentError, Result};

/// Metadata key carrying the owner's user id
pub const META_USER_ID: &str = "userId";
/// Metadata key carrying the salon id
pub const META_SALON_ID: &str = "salonId";
/// Metadata key carrying the purchased plan
pub const META_PLAN_ID: &str = "planId";

const DEFAULT_SITE_URL: &str = "http://localhost:8080";

/// Provider-agnostic checkout session parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub price_id: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// Session as returned by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub url: String,
}

/// Payment provider that can open hosted checkout sessions
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_session(&self, params: &SessionParams) -> Result<CreatedSession>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: Option<&str>) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.map(str::to_string),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = lookup("STRIPE_SECRET_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = lookup("STRIPE_WEBHOOK_SECRET").filter(|v| !v.is_empty());

        Ok(Self::new(&secret_key, webhook_secret.as_deref()))
    }

    /// Get the webhook secret, if signature verification is configured
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_session(&self, request: &SessionParams) -> Result<CreatedSession> {
        let mut params = CreateCheckoutSession::new();
        params.customer_email = request.customer_email.as_deref();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.metadata = Some(request.metadata.clone());
        params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(request.metadata.clone()),
            ..Default::default()
        });
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(request.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CreatedSession {
            session_id: session.id.to_string(),
            url,
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

/// Provider price ids per paid plan
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceTable {
    pub basic: Option<String>,
    pub premium: Option<String>,
}

impl PriceTable {
    /// Price id for a plan, or a configuration error when none is set
    pub fn price_for(&self, plan: Plan) -> Result<&str> {
        let price = match plan {
            Plan::Free => return Err(PaymentError::InvalidPlan(plan)),
            Plan::Basic => self.basic.as_deref(),
            Plan::Premium => self.premium.as_deref(),
        };

        price
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PaymentError::Config(format!("Price ID not found for plan: {plan}")))
    }
}

/// Checkout configuration: prices and redirect targets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub prices: PriceTable,

    /// Public base URL of the booking site
    pub site_url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            prices: PriceTable::default(),
            site_url: DEFAULT_SITE_URL.into(),
        }
    }
}

impl CheckoutConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let site_url = lookup("SITE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SITE_URL.into());

        Self {
            prices: PriceTable {
                basic: lookup("STRIPE_PRICE_BASIC"),
                premium: lookup("STRIPE_PRICE_PREMIUM"),
            },
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Where Stripe sends the owner after paying
    pub fn success_url(&self, plan: Plan) -> String {
        format!(
            "{}/dashboard?success=true&session_id={{CHECKOUT_SESSION_ID}}&planId={}",
            self.site_url, plan
        )
    }

    /// Where Stripe sends the owner after backing out
    pub fn cancel_url(&self) -> String {
        format!("{}/pricing?canceled=true", self.site_url)
    }
}

/// Request to upgrade a salon's plan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Plan to purchase
    pub plan: Plan,

    pub salon_id: SalonId,

    /// Owner initiating the upgrade
    pub user_id: String,

    /// Prefills the checkout form
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session ID
    pub id: String,

    /// URL to redirect the owner to
    pub checkout_url: String,

    /// Plan pending until the provider confirms payment
    pub pending_plan: Plan,
}

/// Creates checkout sessions for plan upgrades
pub struct CheckoutInitiator {
    provider: Arc<dyn CheckoutProvider>,
    config: CheckoutConfig,
}

impl CheckoutInitiator {
    pub fn new(provider: Arc<dyn CheckoutProvider>, config: CheckoutConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Create a hosted checkout session and return where to redirect the owner
    pub async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        if request.salon_id.as_str().trim().is_empty() || request.user_id.trim().is_empty() {
            return Err(PaymentError::InvalidRequest(
                "planId, userId and salonId are required".into(),
            ));
        }

        let price_id = self.config.prices.price_for(request.plan)?.to_string();

        let mut metadata = HashMap::new();
        metadata.insert(META_USER_ID.to_string(), request.user_id.clone());
        metadata.insert(META_SALON_ID.to_string(), request.salon_id.to_string());
        metadata.insert(META_PLAN_ID.to_string(), request.plan.as_str().to_string());

        let params = SessionParams {
            price_id,
            customer_email: request.user_email.clone().filter(|e| !e.trim().is_empty()),
            success_url: self.config.success_url(request.plan),
            cancel_url: self.config.cancel_url(),
            metadata,
        };

        let session = self.provider.create_session(&params).await.map_err(|e| {
            tracing::error!(
                provider = self.provider.name(),
                salon_id = %request.salon_id,
                plan = %request.plan,
                error = %e,
                "Checkout session creation failed"
            );
            e
        })?;

        tracing::info!(
            session_id = %session.session_id,
            salon_id = %request.salon_id,
            user_id = %request.user_id,
            plan = %request.plan,
            "Created checkout session"
        );

        Ok(CheckoutSession {
            id: session.session_id,
            checkout_url: session.url,
            pending_plan: request.plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// Records the params it was called with
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<SessionParams>>,
        fail: bool,
    }

    #[async_trait]
    impl CheckoutProvider for RecordingProvider {
        async fn create_session(&self, params: &SessionParams) -> Result<CreatedSession> {
            if self.fail {
                return Err(PaymentError::Stripe("card_declined".into()));
            }
            self.calls.lock().await.push(params.clone());
            Ok(CreatedSession {
                session_id: "cs_test_123".into(),
                url: "https://checkout.stripe.com/c/pay/cs_test_123".into(),
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn config() -> CheckoutConfig {
        CheckoutConfig::from_lookup(|key| match key {
            "STRIPE_PRICE_BASIC" => Some("price_basic".into()),
            "STRIPE_PRICE_PREMIUM" => Some("price_premium".into()),
            "SITE_URL" => Some("https://agenda.example.com/".into()),
            _ => None,
        })
    }

    fn request(plan: Plan) -> CheckoutRequest {
        CheckoutRequest {
            plan,
            salon_id: SalonId::from_string("salon-1"),
            user_id: "user-1".into(),
            user_email: Some("owner@example.com".into()),
        }
    }

    #[tokio::test]
    async fn test_session_carries_metadata() {
        let provider = Arc::new(RecordingProvider::default());
        let initiator = CheckoutInitiator::new(provider.clone(), config());

        let session = initiator.create_checkout(request(Plan::Premium)).await.unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert_eq!(session.pending_plan, Plan::Premium);

        let calls = provider.calls.lock().await;
        let params = &calls[0];
        assert_eq!(params.price_id, "price_premium");
        assert_eq!(params.metadata[META_SALON_ID], "salon-1");
        assert_eq!(params.metadata[META_USER_ID], "user-1");
        assert_eq!(params.metadata[META_PLAN_ID], "premium");
        assert_eq!(params.customer_email.as_deref(), Some("owner@example.com"));
    }

    #[test]
    fn test_redirect_urls() {
        let config = config();
        assert_eq!(
            config.success_url(Plan::Basic),
            "https://agenda.example.com/dashboard?success=true&session_id={CHECKOUT_SESSION_ID}&planId=basic"
        );
        assert_eq!(config.cancel_url(), "https://agenda.example.com/pricing?canceled=true");
        assert_eq!(CheckoutConfig::default().cancel_url(), "http://localhost:8080/pricing?canceled=true");
    }

    #[tokio::test]
    async fn test_missing_price_is_config_error() {
        let provider = Arc::new(RecordingProvider::default());
        let config = CheckoutConfig {
            prices: PriceTable {
                basic: Some("price_basic".into()),
                premium: None,
            },
            ..CheckoutConfig::default()
        };
        let initiator = CheckoutInitiator::new(provider.clone(), config);

        let result = initiator.create_checkout(request(Plan::Premium)).await;
        assert!(matches!(result, Err(PaymentError::Config(_))));
        assert!(provider.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_free_plan_not_purchasable() {
        let initiator = CheckoutInitiator::new(Arc::new(RecordingProvider::default()), config());
        let result = initiator.create_checkout(request(Plan::Free)).await;
        assert!(matches!(result, Err(PaymentError::InvalidPlan(Plan::Free))));
    }

    #[tokio::test]
    async fn test_missing_ids_rejected() {
        let initiator = CheckoutInitiator::new(Arc::new(RecordingProvider::default()), config());
        let mut req = request(Plan::Basic);
        req.user_id = String::new();
        let result = initiator.create_checkout(req).await;
        assert!(matches!(result, Err(PaymentError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = Arc::new(RecordingProvider {
            fail: true,
            ..Default::default()
        });
        let initiator = CheckoutInitiator::new(provider, config());
        let result = initiator.create_checkout(request(Plan::Basic)).await;
        assert!(matches!(result, Err(PaymentError::Stripe(_))));
    }

    #[test]
    fn test_stripe_client_requires_secret_key() {
        assert!(matches!(
            StripeClient::from_lookup(|_| None),
            Err(PaymentError::Config(_))
        ));

        let client = StripeClient::from_lookup(|key| match key {
            "STRIPE_SECRET_KEY" => Some("sk_test_xxx".into()),
            _ => None,
        })
        .unwrap();
        assert!(client.webhook_secret().is_none());
    }
}
