//! # Wallet Consent
//!
//! The trust-and-disclosure core of a digital identity wallet. Given a
//! verifier request against a stored credential, the crate decides exactly
//! which data elements may be revealed, obtains user consent (or relies on a
//! cached pre-consent), and produces a cryptographically signed,
//! selectively-disclosed presentation.
//!
//! The crate does not render prompts or talk to platform services. That is
//! the job of a wallet implementation, which injects those capabilities
//! through the traits in [`provider`].
//!
//! # Design
//!
//! ** Consent model **
//!
//! Requested attributes are normalised into [`ConsentField`]s regardless of
//! credential format (mdoc namespace/element or selectively-disclosable
//! claim), with display metadata resolved from a static
//! [`catalog::DocumentTypeCatalog`].
//!
//! ** Pre-consent **
//!
//! A [`PreconsentStore`] caches prior consent decisions per (document,
//! trusted relying party) pair. The presentation flow consults it to skip
//! prompting for repeat requests whose fields are covered by the cached set.
//!
//! ** Presentation **
//!
//! [`presentation::present_mdoc`] and [`presentation::present_sd_jwt`] run
//! the full flow: decision, prompt, secure-area unlock loop, and final
//! document generation disclosing exactly the consented fields.

pub mod catalog;
pub mod cbor;
pub mod consent;
pub mod error;
pub mod preconsent;
pub mod presentation;
pub mod provider;

pub use consent::{ConsentDocument, ConsentField, ConsentRelyingParty, TrustPoint};
pub use error::{Error, Result};
pub use preconsent::{Preconsent, PreconsentStore};
pub use presentation::{
    decide, present_mdoc, present_sd_jwt, BoundCredential, Decision, MAX_PASSPHRASE_ATTEMPTS,
};
