use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use crate::error::BuildError;
use crate::traits::TransferBuilder;
use crate::types::TransferPayload;

/// Domain tag prefixed to every transfer message. Versioned so a
/// future payload layout cannot collide with identifiers minted today.
const TRANSFER_DOMAIN: &[u8] = b"treasury-transfer:v1";

/// Signs transfers with the treasury's Ed25519 key.
///
/// The seed is injected once at construction and never exposed; the
/// only outward-facing identity is the base58 verifying key.
pub struct Ed25519TransferBuilder {
    signing_key: SigningKey,
}

impl Ed25519TransferBuilder {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Canonical unsigned message for one transfer.
    fn message(&self, destination: &str, amount: i64, target_window: u64) -> Vec<u8> {
        let source = self.signing_key.verifying_key().to_bytes();
        let mut msg = Vec::with_capacity(
            TRANSFER_DOMAIN.len() + source.len() + destination.len() + 8 + 8 + 4,
        );
        msg.extend_from_slice(TRANSFER_DOMAIN);
        msg.extend_from_slice(&source);
        msg.extend_from_slice(&(destination.len() as u32).to_le_bytes());
        msg.extend_from_slice(destination.as_bytes());
        msg.extend_from_slice(&amount.to_le_bytes());
        msg.extend_from_slice(&target_window.to_le_bytes());
        msg
    }
}

impl TransferBuilder for Ed25519TransferBuilder {
    fn treasury_id(&self) -> String {
        bs58::encode(self.signing_key.verifying_key().to_bytes()).into_string()
    }

    fn build(
        &self,
        destination: &str,
        amount: i64,
        target_window: u64,
    ) -> Result<TransferPayload, BuildError> {
        if destination.is_empty() {
            return Err(BuildError::InvalidInput(
                "destination address is empty".into(),
            ));
        }
        if amount <= 0 {
            return Err(BuildError::InvalidInput(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let message = self.message(destination, amount, target_window);
        // Ed25519 signing is deterministic, so the payload bytes and
        // the identifier below are stable for a given input tuple.
        let signature = self.signing_key.sign(&message);

        let mut bytes = message;
        bytes.extend_from_slice(&signature.to_bytes());

        let transaction_id = hex::encode(Sha256::digest(&bytes));

        Ok(TransferPayload {
            bytes,
            transaction_id,
        })
    }
}
