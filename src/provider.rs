//! # Providers
//!
//! The traits in this module are the seams to the wallet's external
//! collaborators: persistent key-value storage, the secure area holding the
//! credential's device key, and the prompt surfaces through which the user
//! responds. Implementors inject these into the flow entry points; the core
//! holds no global state.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for provider operations.
pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

use crate::consent::{ConsentDocument, ConsentField, ConsentRelyingParty};

/// Persistent key-value storage backing the pre-consent store.
pub trait StorageEngine: Send + Sync {
    /// List all stored keys.
    fn enumerate(&self) -> Result<Vec<String>>;

    /// Retrieve the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `data` under `key`, overwriting any existing value.
    fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Remove the value stored under `key`. Not an error if absent.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Constraints a passphrase-protected key declares for its passphrase.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PassphraseConstraints {
    /// Minimum passphrase length.
    pub min_length: usize,

    /// Maximum passphrase length.
    pub max_length: usize,

    /// Whether the passphrase is numeric-only (a PIN) rather than free text.
    pub require_numerical: bool,
}

/// How a secure area's key can be unlocked, by capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyProfile {
    /// Hardware-backed keystore: unlocked by a biometric challenge bound to
    /// a signing operation handle.
    Keystore,

    /// Software-backed key protected by a passphrase.
    Software {
        /// The passphrase constraints the key was created with.
        constraints: PassphraseConstraints,
    },

    /// Cloud-backed key: unlocked against a remote challenge token, by
    /// passphrase or by biometric depending on the lock reason.
    Cloud {
        /// The passphrase constraints configured for the cloud secure area.
        constraints: PassphraseConstraints,
    },

    /// A secure area the flow has no unlock handling for.
    Other(String),
}

/// Why a signing attempt found the key locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockReason {
    /// The key requires user authentication before use.
    UserAuthRequired,

    /// The key requires a passphrase before use.
    PassphraseRequired,

    /// The supplied passphrase was wrong.
    WrongPassphrase,

    /// The remote challenge requires the user to authenticate.
    UserNotAuthenticated,
}

/// Error returned by a signing attempt.
#[derive(Error, Debug)]
pub enum SignError {
    /// The key is locked; the flow must resolve the lock and retry.
    #[error("key is locked: {0:?}")]
    Locked(LockReason),

    /// Any other signing failure. Not retried.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Opaque handle binding a biometric challenge to a signing operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptoHandle(pub Vec<u8>);

/// The unlock token supplied to a signing attempt.
#[derive(Clone, Debug)]
pub enum KeyUnlock {
    /// Handle obtained from a completed biometric challenge.
    Biometric(CryptoHandle),

    /// A passphrase for a software-backed key.
    Passphrase(String),

    /// Unlock context for a cloud-backed key, scoped to a remote challenge
    /// token.
    Cloud {
        /// The remote challenge token the unlock is scoped to.
        token: Vec<u8>,

        /// The passphrase collected for the remote challenge, if any.
        passphrase: Option<String>,
    },
}

/// The secure area holding a credential's device key. Signing may fail with
/// a locked-key condition the flow then has to resolve.
pub trait SecureArea: Send + Sync {
    /// Describe how the key behind `alias` can be unlocked.
    fn profile(&self, alias: &str) -> Result<KeyProfile>;

    /// Create a handle binding a biometric challenge to a signing operation
    /// on the key behind `alias`.
    fn signing_handle(&self, alias: &str) -> Result<CryptoHandle>;

    /// Obtain a remote challenge token for a cloud-backed key.
    fn cloud_token(&self, alias: &str) -> Result<Vec<u8>>;

    /// Sign `data` with the key behind `alias`.
    fn sign(
        &self, alias: &str, data: &[u8], unlock: Option<&KeyUnlock>,
    ) -> Result<Vec<u8>, SignError>;
}

/// Everything the consent prompt needs to render a decision.
#[derive(Clone, Debug)]
pub struct ConsentRequest {
    /// The document whose fields are being shared.
    pub document: ConsentDocument,

    /// The relying party that will receive the fields.
    pub relying_party: ConsentRelyingParty,

    /// The full set of requested fields.
    pub consent_fields: Vec<ConsentField>,

    /// Whether the prompt should offer setting up (or extending) a
    /// pre-consent for this request.
    pub preconsent_eligible: bool,

    /// Fields not covered by an existing pre-consent, for highlighting.
    pub added_fields: Vec<ConsentField>,
}

/// The user's response to a consent prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsentResponse {
    /// Whether the user confirmed the disclosure.
    pub confirmed: bool,

    /// Whether the user opted in to pre-consent for this request. Ignored
    /// unless the request was pre-consent eligible.
    pub setup_preconsent: bool,
}

/// Prompt surface asking the user to confirm a disclosure. The call suspends
/// until the user responds.
pub trait ConsentPrompt: Send + Sync {
    /// Show the consent prompt and wait for the user's decision.
    fn consent(&self, request: ConsentRequest) -> impl Future<Output = ConsentResponse> + Send;
}

/// Prompt surface presenting a biometric challenge bound to a cryptographic
/// operation handle.
pub trait BiometricPrompt: Send + Sync {
    /// Present the challenge. Returns false if the user cancelled or could
    /// not authenticate.
    fn authenticate(&self, handle: &CryptoHandle) -> impl Future<Output = bool> + Send;
}

/// Prompt surface collecting a passphrase matching the key's constraints.
pub trait PassphrasePrompt: Send + Sync {
    /// Ask for a passphrase. Returns `None` if the user cancelled.
    fn passphrase(
        &self, constraints: &PassphraseConstraints,
    ) -> impl Future<Output = Option<String>> + Send;
}
