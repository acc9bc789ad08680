//! # Pre-consent Store
//!
//! A pre-consent records a prior consent decision so a trusted, repeat
//! verifier request can bypass interactive prompting. Records are persisted
//! under `PRECONSENT_<id>` keys as CBOR and mirrored in memory; every
//! mutation persists before touching the mirror, so a crash can leave the
//! mirror stale but never ahead of storage.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cbor;
use crate::consent::{ConsentDocument, ConsentField, ConsentRelyingParty};
use crate::error::{Error, Result};
use crate::provider::StorageEngine;

const STORAGE_KEY_PREFIX: &str = "PRECONSENT_";

/// A persisted consent decision for a (document, trusted relying party)
/// pair.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preconsent {
    /// Unique identifier, generated once at creation.
    pub id: String,

    /// The document whose fields are shared with the relying party.
    pub document: ConsentDocument,

    /// The relying party that receives the shared fields. Must carry a
    /// trust point: untrusted relying parties can never hold a pre-consent.
    pub relying_party: ConsentRelyingParty,

    /// The approved field set.
    pub consent_fields: Vec<ConsentField>,
}

impl Preconsent {
    /// Create a new record with a generated id.
    #[must_use]
    pub fn new(
        document: ConsentDocument, relying_party: ConsentRelyingParty,
        consent_fields: Vec<ConsentField>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document,
            relying_party,
            consent_fields,
        }
    }

    /// Serialize the record to CBOR bytes.
    ///
    /// # Errors
    /// Returns an error if CBOR encoding fails.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    /// Deserialize a record from bytes produced by [`Self::to_bytes`].
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid encoding, e.g. a stale
    /// schema after catalog changes.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        cbor::from_slice(bytes)
    }
}

/// Durable cache of pre-consent records backed by a [`StorageEngine`].
///
/// The store is an explicitly constructed service object: build it once and
/// pass it by reference to every consumer. Mutating operations serialize on
/// an internal lock, so concurrent flows against the same store cannot both
/// add a record with the same id. A lock poisoned by a panicking engine is
/// recovered on every path: the mirror may then lag storage, which the
/// persist-before-mirror ordering already permits.
#[derive(Debug)]
pub struct PreconsentStore<S: StorageEngine> {
    engine: S,
    cache: Mutex<Vec<Preconsent>>,
}

impl<S: StorageEngine> PreconsentStore<S> {
    /// Load all persisted records from the engine.
    ///
    /// A record that fails to deserialize is treated as corrupt: it is
    /// logged, deleted from storage and excluded from the cache. Corruption
    /// never fails initialization.
    ///
    /// # Errors
    /// Returns an error only if the engine itself fails to enumerate or
    /// read.
    pub fn new(engine: S) -> Result<Self> {
        let mut cache = Vec::new();

        for key in engine.enumerate()? {
            if !key.starts_with(STORAGE_KEY_PREFIX) {
                continue;
            }
            let Some(data) = engine.get(&key)? else {
                continue;
            };
            match Preconsent::from_bytes(&data) {
                Ok(preconsent) => cache.push(preconsent),
                Err(e) => {
                    tracing::error!("failed to load preconsent under key {key}: {e}");
                    engine.delete(&key)?;
                }
            }
        }

        Ok(Self { engine, cache: Mutex::new(cache) })
    }

    /// A snapshot of all cached records.
    #[must_use]
    pub fn preconsents(&self) -> Vec<Preconsent> {
        self.lock_cache().clone()
    }

    /// Add a new record: persist it, then append it to the cache.
    ///
    /// # Errors
    /// Fails with [`Error::InvalidState`] if the relying party carries no
    /// trust point or a record with the same id already exists.
    pub fn add(&self, preconsent: &Preconsent) -> Result<()> {
        if !preconsent.relying_party.is_trusted() {
            return Err(Error::InvalidState(
                "untrusted relying party is not allowed".to_string(),
            ));
        }

        let mut cache = self.lock_cache();

        let key = storage_key(&preconsent.id);
        if self.engine.get(&key)?.is_some() {
            return Err(Error::InvalidState("preconsent already exists".to_string()));
        }

        self.engine.put(&key, preconsent.to_bytes()?)?;
        cache.push(preconsent.clone());

        Ok(())
    }

    /// Replace the record with the same id: persist it, then swap the cache
    /// entry.
    ///
    /// # Errors
    /// Fails with [`Error::InvalidState`] if the relying party carries no
    /// trust point or no record with that id exists.
    pub fn update(&self, preconsent: &Preconsent) -> Result<()> {
        if !preconsent.relying_party.is_trusted() {
            return Err(Error::InvalidState(
                "untrusted relying party is not allowed".to_string(),
            ));
        }

        let mut cache = self.lock_cache();

        let key = storage_key(&preconsent.id);
        if self.engine.get(&key)?.is_none() {
            return Err(Error::InvalidState("preconsent does not exist".to_string()));
        }

        self.engine.put(&key, preconsent.to_bytes()?)?;
        for entry in cache.iter_mut() {
            if entry.id == preconsent.id {
                *entry = preconsent.clone();
            }
        }

        Ok(())
    }

    /// Remove the record with the given id from storage and cache.
    /// Idempotent: absent records are not an error.
    ///
    /// # Errors
    /// Returns an error only if the engine fails to delete.
    pub fn delete(&self, preconsent_id: &str) -> Result<()> {
        let mut cache = self.lock_cache();

        self.engine.delete(&storage_key(preconsent_id))?;
        cache.retain(|entry| entry.id != preconsent_id);

        Ok(())
    }

    /// Find the cached record matching the current request: document name
    /// and description equal, and the relying party's trust point carries
    /// the same certificate bytes. Exact equality, at most one match
    /// expected.
    ///
    /// Returns `None` for untrusted relying parties.
    #[must_use]
    pub fn find(
        &self, document: &ConsentDocument, relying_party: &ConsentRelyingParty,
    ) -> Option<Preconsent> {
        let trust_point = relying_party.trust_point.as_ref()?;

        self.lock_cache()
            .iter()
            .find(|entry| {
                entry.document.matches(document)
                    && entry
                        .relying_party
                        .trust_point
                        .as_ref()
                        .is_some_and(|tp| tp.matches(trust_point))
            })
            .cloned()
    }

    fn lock_cache(&self) -> MutexGuard<'_, Vec<Preconsent>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn storage_key(id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::TrustPoint;

    fn sample_preconsent() -> Preconsent {
        Preconsent::new(
            ConsentDocument {
                name: "Erika's Driving License".to_string(),
                description: "Driving License".to_string(),
                card_art: vec![1, 2, 3],
            },
            ConsentRelyingParty {
                trust_point: Some(TrustPoint {
                    certificate: vec![0xca, 0xfe],
                    display_name: Some("State of Utopia".to_string()),
                    display_icon: None,
                }),
                website_origin: None,
            },
            vec![ConsentField::Vc {
                display_name: "Date of Birth".to_string(),
                attribute: None,
                claim_name: "birthdate".to_string(),
            }],
        )
    }

    #[test]
    fn record_roundtrip() {
        let preconsent = sample_preconsent();
        let bytes = preconsent.to_bytes().expect("should encode");
        let decoded = Preconsent::from_bytes(&bytes).expect("should decode");
        assert_eq!(preconsent, decoded);
    }

    #[test]
    fn ids_are_unique() {
        let a = sample_preconsent();
        let b = sample_preconsent();
        assert_ne!(a.id, b.id);
    }
}
