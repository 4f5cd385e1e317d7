//! Authorization Adapter (C10).
//!
//! An optional per-request indirection to an external trust root that holds
//! encrypted provider secrets and delegation policy. Disabled by default
//! (`authorization.enabled = false`); when enabled, every dispatch runs the
//! full check chain with no caching, and any failure — including the trust
//! root being unreachable — fails the request closed.

use async_trait::async_trait;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, KeyInit,
    aead::{Aead, Nonce},
};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::LlmError;

/// A ciphertext envelope as returned by `get_secret_ciphertext`: `format=1`
/// means X25519 ECDH + HKDF-SHA256 + ChaCha20-Poly1305, encrypted to the
/// process-local public key.
#[derive(Debug, Clone)]
pub(crate) struct SecretEnvelope {
    pub format: u8,
    pub sender_public_key: [u8; 32],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// Result of `get_secret_ciphertext`: the envelope may not exist at all,
/// which is distinct from the envelope failing to decrypt.
pub(crate) struct SecretLookup {
    pub envelope: Option<SecretEnvelope>,
    pub secret_version: u64,
    pub key_version: u64,
}

/// External collaborator contract from §4.6. A real deployment implements
/// this against the trust root's RPC endpoint; tests implement it against an
/// in-memory fake.
#[async_trait]
pub(crate) trait TrustRootClient: Send + Sync {
    async fn is_delegate_permitted(&self, owner: &str, delegate: &str) -> anyhow::Result<bool>;

    async fn is_model_permitted(&self, owner: &str, provider_id: &str, model_id: &str) -> anyhow::Result<bool>;

    async fn get_secret_ciphertext(&self, owner: &str, provider_id: &str) -> anyhow::Result<SecretLookup>;

    /// Best-effort usage receipt. Emission failures must be logged by the
    /// implementation and never propagated as a request failure.
    async fn emit_usage_receipt(&self, receipt: UsageReceipt);
}

#[derive(Debug, Clone)]
pub(crate) struct UsageReceipt {
    pub request_hash: String,
    pub owner: String,
    pub delegate: String,
    pub provider_id: String,
    pub model_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Decrypts a `SecretEnvelope` with the process-local X25519 private key,
/// yielding the plaintext API key bytes.
pub(crate) struct EnvelopeDecryptor {
    private_key: StaticSecret,
}

const HKDF_INFO: &[u8] = b"aigateway-trust-root-secret-v1";

impl EnvelopeDecryptor {
    pub(crate) fn new(private_key: StaticSecret) -> Self {
        Self { private_key }
    }

    /// Decrypts `envelope`, returning the plaintext as a `SecretString` so it
    /// is zeroized on drop like any other credential in this crate.
    pub(crate) fn decrypt(&self, envelope: &SecretEnvelope) -> crate::Result<SecretString> {
        if envelope.format != 1 {
            return Err(LlmError::DecryptionFailed);
        }

        let sender_public = PublicKey::from(envelope.sender_public_key);
        let shared_secret = self.private_key.diffie_hellman(&sender_public);

        let hk = Hkdf::<Sha256>::new(None, shared_secret.as_bytes());
        let mut key_bytes = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key_bytes).map_err(|_| LlmError::DecryptionFailed)?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let nonce = Nonce::<ChaCha20Poly1305>::from_slice(&envelope.nonce);

        let plaintext = cipher
            .decrypt(nonce, envelope.ciphertext.as_ref())
            .map_err(|_| LlmError::DecryptionFailed)?;

        let key = String::from_utf8(plaintext).map_err(|_| LlmError::DecryptionFailed)?;

        Ok(SecretString::from(key))
    }
}

/// Wraps a [`TrustRootClient`] with the decrypt step and the ordering from
/// §4.6: delegate permission, then model permission, then secret retrieval.
pub(crate) struct AuthorizationAdapter {
    client: Box<dyn TrustRootClient>,
    decryptor: EnvelopeDecryptor,
}

impl AuthorizationAdapter {
    pub(crate) fn new(client: Box<dyn TrustRootClient>, private_key: StaticSecret) -> Self {
        Self {
            client,
            decryptor: EnvelopeDecryptor::new(private_key),
        }
    }

    /// Runs the full check chain and returns the decrypted provider API key.
    /// Fails closed: any collaborator error becomes `TrustRootUnavailable`.
    pub(crate) async fn resolve_api_key(&self, owner: &str, delegate: &str, provider_id: &str, model_id: &str) -> crate::Result<SecretString> {
        let delegate_ok = self
            .client
            .is_delegate_permitted(owner, delegate)
            .await
            .map_err(|_| LlmError::TrustRootUnavailable)?;

        if !delegate_ok {
            return Err(LlmError::DelegateNotPermitted);
        }

        let model_ok = self
            .client
            .is_model_permitted(owner, provider_id, model_id)
            .await
            .map_err(|_| LlmError::TrustRootUnavailable)?;

        if !model_ok {
            return Err(LlmError::ModelNotAllowed);
        }

        let lookup = self
            .client
            .get_secret_ciphertext(owner, provider_id)
            .await
            .map_err(|_| LlmError::TrustRootUnavailable)?;

        let envelope = lookup.envelope.ok_or(LlmError::SecretNotFound)?;

        self.decryptor.decrypt(&envelope)
    }

    /// Emits the post-completion usage receipt. Never fails the caller;
    /// collaborator-side logging of emission failures is the client's job.
    pub(crate) async fn emit_usage_receipt(&self, receipt: UsageReceipt) {
        self.client.emit_usage_receipt(receipt).await;
    }
}

/// [`TrustRootClient`] backed by plain HTTP requests to a trust root
/// service. The on-chain/RPC protocol between the trust root and the
/// accounts it serves is out of scope here; this adapter only needs a
/// stable wire contract with the trust root's own API, so it speaks a
/// small JSON REST dialect over the configured base URL.
pub(crate) struct HttpTrustRootClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTrustRootClient {
    pub(crate) fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct PermittedResponse {
    permitted: bool,
}

#[derive(Deserialize)]
struct SecretLookupResponse {
    envelope: Option<SecretEnvelopeWire>,
    secret_version: u64,
    key_version: u64,
}

#[derive(Deserialize)]
struct SecretEnvelopeWire {
    format: u8,
    sender_public_key: String,
    nonce: String,
    ciphertext: String,
}

impl TryFrom<SecretEnvelopeWire> for SecretEnvelope {
    type Error = LlmError;

    fn try_from(wire: SecretEnvelopeWire) -> Result<Self, Self::Error> {
        use base64::Engine;

        let decode = |value: &str| base64::engine::general_purpose::STANDARD.decode(value).map_err(|_| LlmError::DecryptionFailed);

        let sender_public_key: [u8; 32] = decode(&wire.sender_public_key)?
            .try_into()
            .map_err(|_| LlmError::DecryptionFailed)?;
        let nonce: [u8; 12] = decode(&wire.nonce)?.try_into().map_err(|_| LlmError::DecryptionFailed)?;
        let ciphertext = decode(&wire.ciphertext)?;

        Ok(SecretEnvelope {
            format: wire.format,
            sender_public_key,
            nonce,
            ciphertext,
        })
    }
}

#[async_trait]
impl TrustRootClient for HttpTrustRootClient {
    async fn is_delegate_permitted(&self, owner: &str, delegate: &str) -> anyhow::Result<bool> {
        let response: PermittedResponse = self
            .http
            .post(format!("{}/v1/delegates/check", self.base_url))
            .json(&serde_json::json!({ "owner": owner, "delegate": delegate }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.permitted)
    }

    async fn is_model_permitted(&self, owner: &str, provider_id: &str, model_id: &str) -> anyhow::Result<bool> {
        let response: PermittedResponse = self
            .http
            .post(format!("{}/v1/models/check", self.base_url))
            .json(&serde_json::json!({ "owner": owner, "provider_id": provider_id, "model_id": model_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.permitted)
    }

    async fn get_secret_ciphertext(&self, owner: &str, provider_id: &str) -> anyhow::Result<SecretLookup> {
        let response: SecretLookupResponse = self
            .http
            .post(format!("{}/v1/secrets/lookup", self.base_url))
            .json(&serde_json::json!({ "owner": owner, "provider_id": provider_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let envelope = response.envelope.map(SecretEnvelope::try_from).transpose()?;

        Ok(SecretLookup {
            envelope,
            secret_version: response.secret_version,
            key_version: response.key_version,
        })
    }

    async fn emit_usage_receipt(&self, receipt: UsageReceipt) {
        let result = self
            .http
            .post(format!("{}/v1/usage/receipts", self.base_url))
            .json(&serde_json::json!({
                "request_hash": receipt.request_hash,
                "owner": receipt.owner,
                "delegate": receipt.delegate,
                "provider_id": receipt.provider_id,
                "model_id": receipt.model_id,
                "prompt_tokens": receipt.prompt_tokens,
                "completion_tokens": receipt.completion_tokens,
            }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        if let Err(error) = result {
            log::warn!("failed to emit usage receipt to trust root: {error}");
        }
    }
}

/// Decodes a hex-encoded 32-byte X25519 private key from configuration.
pub(crate) fn decode_private_key(key: &SecretString) -> crate::Result<StaticSecret> {
    let hex = key.expose_secret().trim();

    if hex.len() != 64 {
        return Err(LlmError::InternalError(Some(
            "authorization.decryption_key must be 64 hex characters (32 bytes)".to_string(),
        )));
    }

    let mut bytes = [0u8; 32];
    for (index, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk)
            .map_err(|_| LlmError::InternalError(Some("authorization.decryption_key is not valid hex".to_string())))?;
        bytes[index] =
            u8::from_str_radix(pair, 16).map_err(|_| LlmError::InternalError(Some("authorization.decryption_key is not valid hex".to_string())))?;
    }

    Ok(StaticSecret::from(bytes))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    /// Builds a deterministic test keypair from a single repeated byte, so
    /// the crypto round-trip tests don't need a system RNG.
    fn test_secret(seed: u8) -> StaticSecret {
        StaticSecret::from([seed; 32])
    }

    fn seal(our_public: &PublicKey, sender_secret: StaticSecret, plaintext: &[u8]) -> SecretEnvelope {
        let sender_public = PublicKey::from(&sender_secret);
        let shared = sender_secret.diffie_hellman(our_public);

        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut key_bytes = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key_bytes).unwrap();

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let nonce_bytes = [7u8; 12];
        let nonce = Nonce::<ChaCha20Poly1305>::from_slice(&nonce_bytes);
        let ciphertext = cipher.encrypt(nonce, plaintext).unwrap();

        SecretEnvelope {
            format: 1,
            sender_public_key: sender_public.to_bytes(),
            nonce: nonce_bytes,
            ciphertext,
        }
    }

    struct FakeTrustRoot {
        delegates: HashMap<(String, String), bool>,
        models: HashMap<(String, String, String), bool>,
        secrets: HashMap<(String, String), SecretEnvelope>,
        receipts: Mutex<Vec<UsageReceipt>>,
    }

    #[async_trait]
    impl TrustRootClient for FakeTrustRoot {
        async fn is_delegate_permitted(&self, owner: &str, delegate: &str) -> anyhow::Result<bool> {
            if owner == delegate {
                return Ok(true);
            }
            Ok(self
                .delegates
                .get(&(owner.to_string(), delegate.to_string()))
                .copied()
                .unwrap_or(false))
        }

        async fn is_model_permitted(&self, owner: &str, provider_id: &str, model_id: &str) -> anyhow::Result<bool> {
            Ok(self
                .models
                .get(&(owner.to_string(), provider_id.to_string(), model_id.to_string()))
                .copied()
                .unwrap_or(true))
        }

        async fn get_secret_ciphertext(&self, owner: &str, provider_id: &str) -> anyhow::Result<SecretLookup> {
            Ok(SecretLookup {
                envelope: self.secrets.get(&(owner.to_string(), provider_id.to_string())).cloned(),
                secret_version: 1,
                key_version: 1,
            })
        }

        async fn emit_usage_receipt(&self, receipt: UsageReceipt) {
            self.receipts.lock().unwrap().push(receipt);
        }
    }

    fn adapter_with(secrets: HashMap<(String, String), SecretEnvelope>, our_secret: StaticSecret) -> AuthorizationAdapter {
        let client = FakeTrustRoot {
            delegates: HashMap::new(),
            models: HashMap::new(),
            secrets,
            receipts: Mutex::new(Vec::new()),
        };

        AuthorizationAdapter::new(Box::new(client), our_secret)
    }

    #[tokio::test]
    async fn decrypts_a_well_formed_envelope() {
        let our_secret = test_secret(1);
        let our_public = PublicKey::from(&our_secret);
        let envelope = seal(&our_public, test_secret(2), b"sk-test-key-123");

        let mut secrets = HashMap::new();
        secrets.insert(("alice".to_string(), "openai".to_string()), envelope);

        let adapter = adapter_with(secrets, our_secret);
        let key = adapter.resolve_api_key("alice", "alice", "openai", "gpt-4o").await.unwrap();

        use secrecy::ExposeSecret;
        assert_eq!(key.expose_secret(), "sk-test-key-123");
    }

    #[tokio::test]
    async fn owner_equals_delegate_is_always_permitted() {
        let our_secret = test_secret(3);
        let our_public = PublicKey::from(&our_secret);
        let envelope = seal(&our_public, test_secret(4), b"sk-own-key");

        let mut secrets = HashMap::new();
        secrets.insert(("bob".to_string(), "anthropic".to_string()), envelope);

        let adapter = adapter_with(secrets, our_secret);

        adapter.resolve_api_key("bob", "bob", "anthropic", "claude-3").await.unwrap();
    }

    #[tokio::test]
    async fn unrelated_delegate_is_rejected() {
        let our_secret = test_secret(5);
        let adapter = adapter_with(HashMap::new(), our_secret);

        let error = adapter
            .resolve_api_key("alice", "mallory", "openai", "gpt-4o")
            .await
            .expect_err("mallory has no grant");

        assert_eq!(error.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_secret_is_not_found() {
        let our_secret = test_secret(6);
        let adapter = adapter_with(HashMap::new(), our_secret);

        let error = adapter
            .resolve_api_key("alice", "alice", "openai", "gpt-4o")
            .await
            .expect_err("no secret registered");

        assert_eq!(error.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_key_fails_decryption() {
        let our_secret = test_secret(7);
        let our_public = PublicKey::from(&our_secret);
        let envelope = seal(&our_public, test_secret(8), b"sk-test-key-123");

        let mut secrets = HashMap::new();
        secrets.insert(("alice".to_string(), "openai".to_string()), envelope);

        let wrong_secret = test_secret(9);
        let adapter = adapter_with(secrets, wrong_secret);

        let error = adapter
            .resolve_api_key("alice", "alice", "openai", "gpt-4o")
            .await
            .expect_err("AEAD tag should not verify under the wrong key");

        assert_eq!(error.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
