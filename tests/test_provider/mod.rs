//! Shared in-memory providers for integration tests: a storage engine, a
//! secure area with configurable key profiles, and scripted prompt surfaces.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use wallet_consent::catalog::{AttributeType, DocumentAttribute};
use wallet_consent::provider::{
    BiometricPrompt, ConsentPrompt, ConsentRequest, ConsentResponse, CryptoHandle, KeyProfile,
    KeyUnlock, LockReason, PassphraseConstraints, PassphrasePrompt, SecureArea, SignError,
    StorageEngine,
};
use wallet_consent::{ConsentDocument, ConsentField, ConsentRelyingParty, TrustPoint};

static INIT: Once = Once::new();

/// Route test logs through tracing, honouring `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// In-memory storage engine.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }
}

impl StorageEngine for MemoryStorage {
    fn enumerate(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.data.lock().unwrap().keys().cloned().collect())
    }

    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.data.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Test provider implementing the secure area and all prompt surfaces with
/// scripted responses. Prompts panic when invoked without a scripted
/// response, so tests catch unexpected prompting.
#[derive(Clone)]
pub struct TestProvider {
    pub storage: MemoryStorage,
    profile: KeyProfile,
    correct_passphrase: Option<String>,
    cloud_authenticated: Arc<Mutex<bool>>,
    signing_key: Arc<SigningKey>,
    pub consent_responses: Arc<Mutex<VecDeque<ConsentResponse>>>,
    pub consent_requests: Arc<Mutex<Vec<ConsentRequest>>>,
    pub passphrase_responses: Arc<Mutex<VecDeque<Option<String>>>>,
    pub passphrase_prompt_count: Arc<Mutex<u32>>,
    pub biometric_responses: Arc<Mutex<VecDeque<bool>>>,
}

impl TestProvider {
    fn with_profile(profile: KeyProfile, correct_passphrase: Option<&str>) -> Self {
        Self {
            storage: MemoryStorage::new(),
            profile,
            correct_passphrase: correct_passphrase.map(ToString::to_string),
            cloud_authenticated: Arc::new(Mutex::new(false)),
            signing_key: Arc::new(SigningKey::generate(&mut OsRng)),
            consent_responses: Arc::new(Mutex::new(VecDeque::new())),
            consent_requests: Arc::new(Mutex::new(Vec::new())),
            passphrase_responses: Arc::new(Mutex::new(VecDeque::new())),
            passphrase_prompt_count: Arc::new(Mutex::new(0)),
            biometric_responses: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn keystore() -> Self {
        Self::with_profile(KeyProfile::Keystore, None)
    }

    pub fn software(correct_passphrase: &str) -> Self {
        Self::with_profile(
            KeyProfile::Software { constraints: pin_constraints() },
            Some(correct_passphrase),
        )
    }

    pub fn cloud(correct_passphrase: &str) -> Self {
        Self::with_profile(
            KeyProfile::Cloud { constraints: pin_constraints() },
            Some(correct_passphrase),
        )
    }

    pub fn unsupported() -> Self {
        Self::with_profile(KeyProfile::Other("enclave".to_string()), None)
    }

    pub fn push_consent(&self, confirmed: bool, setup_preconsent: bool) {
        self.consent_responses
            .lock()
            .unwrap()
            .push_back(ConsentResponse { confirmed, setup_preconsent });
    }

    pub fn push_passphrase(&self, response: Option<&str>) {
        self.passphrase_responses
            .lock()
            .unwrap()
            .push_back(response.map(ToString::to_string));
    }

    pub fn push_biometric(&self, success: bool) {
        self.biometric_responses.lock().unwrap().push_back(success);
    }

    pub fn consent_prompt_count(&self) -> usize {
        self.consent_requests.lock().unwrap().len()
    }

    pub fn last_consent_request(&self) -> ConsentRequest {
        self.consent_requests.lock().unwrap().last().cloned().expect("no consent prompt shown")
    }
}

fn pin_constraints() -> PassphraseConstraints {
    PassphraseConstraints { min_length: 4, max_length: 8, require_numerical: true }
}

impl SecureArea for TestProvider {
    fn profile(&self, _alias: &str) -> anyhow::Result<KeyProfile> {
        Ok(self.profile.clone())
    }

    fn signing_handle(&self, _alias: &str) -> anyhow::Result<CryptoHandle> {
        Ok(CryptoHandle(vec![0x07]))
    }

    fn cloud_token(&self, _alias: &str) -> anyhow::Result<Vec<u8>> {
        Ok(vec![0x09])
    }

    fn sign(
        &self, _alias: &str, data: &[u8], unlock: Option<&KeyUnlock>,
    ) -> Result<Vec<u8>, SignError> {
        match &self.profile {
            KeyProfile::Keystore => match unlock {
                Some(KeyUnlock::Biometric(_)) => Ok(self.signing_key.sign(data).to_vec()),
                _ => Err(SignError::Locked(LockReason::UserAuthRequired)),
            },
            KeyProfile::Software { .. } => match unlock {
                Some(KeyUnlock::Passphrase(passphrase)) => {
                    if Some(passphrase) == self.correct_passphrase.as_ref() {
                        Ok(self.signing_key.sign(data).to_vec())
                    } else {
                        Err(SignError::Locked(LockReason::WrongPassphrase))
                    }
                }
                _ => Err(SignError::Locked(LockReason::PassphraseRequired)),
            },
            KeyProfile::Cloud { .. } => {
                if !*self.cloud_authenticated.lock().unwrap() {
                    return Err(SignError::Locked(LockReason::UserNotAuthenticated));
                }
                match unlock {
                    Some(KeyUnlock::Cloud { passphrase: Some(passphrase), .. })
                        if Some(passphrase) == self.correct_passphrase.as_ref() =>
                    {
                        Ok(self.signing_key.sign(data).to_vec())
                    }
                    _ => Err(SignError::Locked(LockReason::WrongPassphrase)),
                }
            }
            KeyProfile::Other(name) => {
                // locked so the flow reaches the unsupported-holder dispatch
                let _ = name;
                Err(SignError::Locked(LockReason::UserAuthRequired))
            }
        }
    }
}

impl ConsentPrompt for TestProvider {
    async fn consent(&self, request: ConsentRequest) -> ConsentResponse {
        self.consent_requests.lock().unwrap().push(request);
        self.consent_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected consent prompt")
    }
}

impl BiometricPrompt for TestProvider {
    async fn authenticate(&self, _handle: &CryptoHandle) -> bool {
        let success = self
            .biometric_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected biometric prompt");
        if success {
            *self.cloud_authenticated.lock().unwrap() = true;
        }
        success
    }
}

impl PassphrasePrompt for TestProvider {
    async fn passphrase(&self, _constraints: &PassphraseConstraints) -> Option<String> {
        *self.passphrase_prompt_count.lock().unwrap() += 1;
        self.passphrase_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected passphrase prompt")
    }
}

// ------------------------------------------------------------------------
// Sample data builders
// ------------------------------------------------------------------------

pub fn sample_document() -> ConsentDocument {
    ConsentDocument {
        name: "Erika's Driving License".to_string(),
        description: "Driving License".to_string(),
        card_art: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

pub fn trusted_party() -> ConsentRelyingParty {
    ConsentRelyingParty {
        trust_point: Some(TrustPoint {
            certificate: vec![0x30, 0x82, 0x01, 0x0a],
            display_name: Some("State of Utopia".to_string()),
            display_icon: None,
        }),
        website_origin: None,
    }
}

pub fn origin_only_party() -> ConsentRelyingParty {
    ConsentRelyingParty {
        trust_point: None,
        website_origin: Some("https://verifier.example.com".to_string()),
    }
}

/// A claim-backed consent field with a catalog attribute controlling
/// pre-consent eligibility.
pub fn claim_field(claim_name: &str, display_name: &str, preconsent_allowed: bool) -> ConsentField {
    ConsentField::Vc {
        display_name: display_name.to_string(),
        attribute: Some(DocumentAttribute {
            type_: AttributeType::String,
            identifier: claim_name.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            icon: None,
            mandatory: false,
            preconsent_allowed,
            sample_value: None,
        }),
        claim_name: claim_name.to_string(),
    }
}
