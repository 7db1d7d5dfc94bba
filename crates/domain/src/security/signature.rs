use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::constant_time;

type HmacSha256 = Hmac<Sha256>;

/// Payment signature failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No signing secret was configured.
    #[error("Payment signing secret must not be empty")]
    EmptySecret,

    /// The secret could not key the MAC.
    #[error("Payment signing secret is not a valid HMAC key")]
    InvalidKey,

    /// The supplied signature does not match. Carries no detail on purpose.
    #[error("Invalid payment signature")]
    InvalidSignature,
}

/// Verifies gateway payment callbacks.
///
/// The signature is the lowercase hex HMAC-SHA256 of `"{order_id}|{payment_id}"`
/// keyed with the gateway secret. Comparison is constant-time: a forged
/// signature is rejected in the same time whichever character is wrong.
#[derive(Clone)]
pub struct PaymentVerifier {
    keyed: HmacSha256,
}

impl PaymentVerifier {
    /// Creates a verifier for the given secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignatureError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SignatureError::EmptySecret);
        }
        let keyed = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { keyed })
    }

    /// Computes the expected signature for a payment.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        hex::encode(self.mac(order_id, payment_id).finalize().into_bytes())
    }

    /// Checks a client-supplied signature.
    pub fn verify(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        let expected = self.sign(order_id, payment_id);
        if constant_time::eq(expected.as_bytes(), signature.as_bytes()) {
            Ok(())
        } else {
            metrics::counter!("payment_signature_failures_total").increment(1);
            tracing::warn!(order_id, "payment signature mismatch");
            Err(SignatureError::InvalidSignature)
        }
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac
    }
}

impl std::fmt::Debug for PaymentVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentVerifier")
            .field("key", &"<redacted>")
            .finish()
    }
}
