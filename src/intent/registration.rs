// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Idempotent intent registration with the provider's secret store.

use tracing::{debug, info};

use super::IntentPayload;
use crate::enclave::{ProviderError, SecretStore};

/// Requester secret slot the enclave reads the intent from.
pub const INTENT_SECRET_INDEX: u32 = 1;

/// How the payload ended up in the secret store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The payload was pushed by this call.
    Created,
    /// A secret already occupied the slot; the existing registration is used.
    Reused,
}

/// Push the payload as the requester's intent secret.
///
/// Secrets are immutable on the provider, so a resubmission reports
/// "already exists". That outcome is not an error.
pub async fn register_intent<S: SecretStore + ?Sized>(
    store: &S,
    payload: &IntentPayload,
) -> Result<Registration, ProviderError> {
    match store
        .push_requester_secret(INTENT_SECRET_INDEX, payload.as_str())
        .await
    {
        Ok(()) => {
            debug!(index = INTENT_SECRET_INDEX, "Intent secret registered");
            Ok(Registration::Created)
        }
        Err(ProviderError::AlreadyExists) => {
            info!(
                index = INTENT_SECRET_INDEX,
                "Intent secret already registered, reusing it"
            );
            Ok(Registration::Reused)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::tests::MemorySecretStore;
    use crate::intent::encode;

    const DEST: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const VAULT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[tokio::test]
    async fn first_push_creates_the_secret() {
        let store = MemorySecretStore::default();
        let payload = encode(DEST, "5", VAULT).unwrap();

        assert_eq!(
            register_intent(&store, &payload).await.unwrap(),
            Registration::Created
        );
        assert_eq!(
            store.secrets.lock().unwrap().get(&INTENT_SECRET_INDEX),
            Some(&payload.as_str().to_string())
        );
    }

    #[tokio::test]
    async fn already_exists_is_not_an_error() {
        let store = MemorySecretStore::default();
        let payload = encode(DEST, "5", VAULT).unwrap();

        register_intent(&store, &payload).await.unwrap();
        assert_eq!(
            register_intent(&store, &payload).await.unwrap(),
            Registration::Reused
        );
    }
}
