//! # Consent Document
//!
//! Describes the document being presented in a consent prompt.

use serde::{Deserialize, Serialize};

/// The document whose fields are being shared with a relying party.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsentDocument {
    /// The name of the document, e.g. "Erika's Driving License".
    pub name: String,

    /// The description, e.g. "Driving License" or "Government-Issued ID".
    pub description: String,

    /// The card art for the document, as opaque image bytes.
    #[serde(with = "crate::cbor::bytes")]
    pub card_art: Vec<u8>,
}

impl ConsentDocument {
    /// Whether two documents refer to the same identity for pre-consent
    /// matching. Card art is excluded: it may be re-rendered or recompressed
    /// without the document's identity changing.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.name == other.name && self.description == other.description
    }
}
