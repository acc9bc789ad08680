//! # Presentation
//!
//! The presentation flow for a single credential: decide whether the user
//! must be prompted, obtain consent (or rely on a cached pre-consent), then
//! drive signing through the secure-area unlock loop and emit the final
//! selectively-disclosed presentation bytes.
//!
//! Either a complete signed disclosure is returned, or an error is raised
//! with no side effect beyond the consented cache mutation.

pub mod mdoc;
pub mod sd_jwt;
mod unlock;

use tracing::instrument;

pub use self::unlock::MAX_PASSPHRASE_ATTEMPTS;
use self::mdoc::{DataElements, DocumentGenerator, NameSpacedData};
use self::sd_jwt::SdJwt;
use crate::consent::{ConsentDocument, ConsentField, ConsentRelyingParty};
use crate::error::{Error, Result};
use crate::preconsent::{Preconsent, PreconsentStore};
use crate::provider::{
    BiometricPrompt, ConsentPrompt, ConsentRequest, PassphrasePrompt, SecureArea, StorageEngine,
};

/// A credential bound to a secure-area key.
#[derive(Clone, Debug)]
pub struct BoundCredential {
    /// The alias of the device key in the secure area.
    pub alias: String,

    /// The issuer-provided data: static auth data for mdoc credentials, the
    /// compact SD-JWT serialization for selectively-disclosable ones.
    pub issuer_data: Vec<u8>,

    usage_count: u32,
}

impl BoundCredential {
    /// Create a credential handle with a zero usage count.
    #[must_use]
    pub fn new(alias: impl Into<String>, issuer_data: Vec<u8>) -> Self {
        Self { alias: alias.into(), issuer_data, usage_count: 0 }
    }

    /// How many presentations this credential has signed.
    #[must_use]
    pub const fn usage_count(&self) -> u32 {
        self.usage_count
    }

    fn record_usage(&mut self) {
        self.usage_count += 1;
    }
}

/// The outcome of evaluating a request against the pre-consent cache.
#[derive(Clone, Debug)]
pub struct Decision {
    /// Whether the relying party carries a trust point.
    pub trusted: bool,

    /// The cached record matching this (document, relying party) pair.
    pub existing: Option<Preconsent>,

    /// Requested fields not covered by the existing record. Non-empty added
    /// fields always force re-prompting.
    pub added_fields: Vec<ConsentField>,

    /// Whether the prompt can be skipped entirely: trusted, cached, and no
    /// added fields.
    pub skip: bool,

    /// Whether the prompt may offer pre-consent setup: trusted and every
    /// requested field allows pre-consent. A single disallowed field
    /// disqualifies the whole request.
    pub eligible: bool,
}

/// Evaluate a request's consent fields against the pre-consent cache.
#[must_use]
pub fn decide<S: StorageEngine>(
    store: &PreconsentStore<S>, consent_fields: &[ConsentField], document: &ConsentDocument,
    relying_party: &ConsentRelyingParty,
) -> Decision {
    let trusted = relying_party.is_trusted();

    let existing = if trusted { store.find(document, relying_party) } else { None };

    let added_fields: Vec<ConsentField> = existing.as_ref().map_or_else(Vec::new, |existing| {
        consent_fields
            .iter()
            .filter(|field| !existing.consent_fields.iter().any(|known| known.same_field(field)))
            .cloned()
            .collect()
    });

    let skip = trusted && existing.is_some() && added_fields.is_empty();

    let eligible = trusted
        && consent_fields
            .iter()
            .all(|field| field.attribute().is_some_and(|a| a.preconsent_allowed));

    tracing::debug!(trusted, skip, eligible, added = added_fields.len(), "consent decision");

    Decision { trusted, existing, added_fields, skip, eligible }
}

/// Run the consent step: skip the prompt when a covering pre-consent exists,
/// otherwise show it and apply the post-confirmation cache mutation.
async fn run_consent<S, P>(
    store: &PreconsentStore<S>, prompts: &P, consent_fields: &[ConsentField],
    document: &ConsentDocument, relying_party: &ConsentRelyingParty,
) -> Result<()>
where
    S: StorageEngine,
    P: ConsentPrompt,
{
    let decision = decide(store, consent_fields, document, relying_party);

    if decision.skip {
        // trusted party, cached record, and the requested fields are a
        // subset of the previously approved set
        tracing::info!("skipping consent prompt");
        return Ok(());
    }

    let response = prompts
        .consent(ConsentRequest {
            document: document.clone(),
            relying_party: relying_party.clone(),
            consent_fields: consent_fields.to_vec(),
            preconsent_eligible: decision.eligible,
            added_fields: decision.added_fields.clone(),
        })
        .await;

    if !response.confirmed {
        return Err(Error::UserCancelled);
    }

    if decision.eligible {
        match (decision.existing, response.setup_preconsent) {
            (None, true) => {
                tracing::info!("creating a new preconsent");
                store.add(&Preconsent::new(
                    document.clone(),
                    relying_party.clone(),
                    consent_fields.to_vec(),
                ))?;
            }
            (None, false) => {
                tracing::info!("user opted out of preconsent");
            }
            (Some(existing), true) => {
                tracing::info!("extending the existing preconsent");
                // union of the previously approved set and the added fields
                let mut updated_fields = existing.consent_fields;
                updated_fields.extend(decision.added_fields);
                store.update(&Preconsent {
                    id: existing.id,
                    document: document.clone(),
                    relying_party: relying_party.clone(),
                    consent_fields: updated_fields,
                })?;
            }
            (Some(_), false) => {
                // kept as-is: other transactions with a smaller field set
                // may still rely on the existing record
                tracing::info!("user opted out of extending the preconsent");
            }
        }
    }

    Ok(())
}

/// Present an mdoc credential: consent, unlock-and-sign, then generate the
/// device response document with exactly the consented namespaces and
/// elements disclosed.
///
/// # Errors
/// Propagates consent and unlock errors unmodified; fails with a wrapped
/// error if the issuer-provided data cannot be parsed or fails its digest
/// check.
#[instrument(level = "debug", skip_all)]
pub async fn present_mdoc<S, A, P>(
    store: &PreconsentStore<S>, secure_area: &A, prompts: &P, credential: &mut BoundCredential,
    static_data: &NameSpacedData, consent_fields: &[ConsentField], document: &ConsentDocument,
    relying_party: &ConsentRelyingParty, session_transcript: &[u8],
) -> Result<Vec<u8>>
where
    S: StorageEngine,
    A: SecureArea,
    P: ConsentPrompt + BiometricPrompt + PassphrasePrompt,
{
    run_consent(store, prompts, consent_fields, document, relying_party).await?;

    let requested = requested_elements(consent_fields);
    let generator = DocumentGenerator::new(
        &credential.issuer_data,
        static_data,
        &requested,
        session_transcript,
    )?;

    let alias = credential.alias.clone();
    let bytes = unlock::unlock_and_sign(secure_area, prompts, &alias, |unlock| {
        generator.sign_and_generate(secure_area, &alias, unlock)
    })
    .await?;

    credential.record_usage();
    Ok(bytes)
}

/// Present a selectively-disclosable credential: consent, filter the
/// disclosure set down to exactly the consented claim names, then sign the
/// key-binding JWT through the unlock loop.
///
/// # Errors
/// Fails with [`Error::DeficientSubmission`] if no disclosures remain after
/// filtering; propagates consent and unlock errors unmodified.
#[instrument(level = "debug", skip_all)]
pub async fn present_sd_jwt<S, A, P>(
    store: &PreconsentStore<S>, secure_area: &A, prompts: &P, credential: &mut BoundCredential,
    consent_fields: &[ConsentField], document: &ConsentDocument,
    relying_party: &ConsentRelyingParty, nonce: &str, client_id: &str,
) -> Result<Vec<u8>>
where
    S: StorageEngine,
    A: SecureArea,
    P: ConsentPrompt + BiometricPrompt + PassphrasePrompt,
{
    run_consent(store, prompts, consent_fields, document, relying_party).await?;

    let compact = std::str::from_utf8(&credential.issuer_data)
        .map_err(|e| anyhow::anyhow!("credential is not valid UTF-8: {e}"))?;
    let sd_jwt = SdJwt::parse(compact)?;

    let claim_names: Vec<&str> = consent_fields
        .iter()
        .filter_map(|field| match field {
            ConsentField::Vc { claim_name, .. } => Some(claim_name.as_str()),
            ConsentField::Mdoc { .. } => None,
        })
        .collect();
    let filtered = sd_jwt.retain_claims(&claim_names);

    if filtered.disclosures.is_empty() {
        // none of the requested claims can be fulfilled: cancel rather than
        // send an empty disclosure set
        tracing::error!("no disclosures remaining after filtering");
        return Err(Error::DeficientSubmission);
    }

    let alias = credential.alias.clone();
    let bytes = unlock::unlock_and_sign(secure_area, prompts, &alias, |unlock| {
        filtered.present(secure_area, &alias, unlock, nonce, client_id)
    })
    .await?;

    credential.record_usage();
    Ok(bytes)
}

/// Group the mdoc consent fields into requested data elements by namespace,
/// preserving field order within each namespace.
#[must_use]
pub fn requested_elements(consent_fields: &[ConsentField]) -> DataElements {
    let mut requested = DataElements::new();
    for field in consent_fields {
        if let ConsentField::Mdoc { namespace_name, data_element_name, .. } = field {
            requested
                .entry(namespace_name.clone())
                .or_default()
                .push(data_element_name.clone());
        }
    }
    requested
}
