//! Webhook Signature Verification
//!
//! Authenticates the `Stripe-Signature` header through `stripe::Webhook`.
//! Event bodies are decoded by the reconciler's own envelope types, so a
//! body that is correctly signed but does not fit the typed Stripe event
//! model still counts as authenticated.

use stripe::{Webhook, WebhookError};

use crate::error::{PaymentError, Result};

/// How inbound webhooks are authenticated
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Reject anything not signed with this secret
    Required { secret: String },

    /// Accept unsigned payloads (local development only)
    Disabled,
}

impl SignaturePolicy {
    pub fn from_secret(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) if !secret.is_empty() => SignaturePolicy::Required {
                secret: secret.to_string(),
            },
            _ => SignaturePolicy::Disabled,
        }
    }

    pub fn is_enforced(&self) -> bool {
        matches!(self, SignaturePolicy::Required { .. })
    }

    /// Check a payload against its signature header
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<()> {
        let secret = match self {
            SignaturePolicy::Disabled => {
                tracing::warn!("Webhook signature verification disabled, accepting unsigned event");
                return Ok(());
            }
            SignaturePolicy::Required { secret } => secret,
        };

        let header = header.ok_or_else(|| {
            PaymentError::WebhookSignature("missing Stripe-Signature header".into())
        })?;

        let payload = std::str::from_utf8(payload)
            .map_err(|e| PaymentError::WebhookSignature(format!("payload is not UTF-8: {e}")))?;

        match Webhook::construct_event(payload, header, secret) {
            Ok(_) => Ok(()),
            // Raised only after the signature and timestamp checks have passed.
            Err(WebhookError::BadParse(e)) => {
                tracing::debug!(error = %e, "Signed webhook outside the typed event model");
                Ok(())
            }
            Err(e) => Err(PaymentError::WebhookSignature(e.to_string())),
        }
    }
}
