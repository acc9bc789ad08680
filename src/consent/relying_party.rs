//! # Relying Party
//!
//! Describes the verifier requesting data, and the trust point that anchors
//! it to a trust list when the verifier is known.

use serde::{Deserialize, Serialize};

/// A trusted CA certificate with optional display metadata.
///
/// Identity for pre-consent matching is the raw certificate bytes, not any
/// parsed subject field.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrustPoint {
    /// The X.509 certificate, DER-encoded.
    #[serde(with = "crate::cbor::bytes")]
    pub certificate: Vec<u8>,

    /// A name suitable for display of the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// An icon representing the certificate.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "crate::cbor::option_bytes"
    )]
    pub display_icon: Option<Vec<u8>>,
}

impl TrustPoint {
    /// Whether two trust points carry the same certificate.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.certificate == other.certificate
    }
}

/// The relying party requesting data: anchored to a trust list, identified
/// only by website origin, or fully unknown.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRelyingParty {
    /// Set if the verifier is in a trust list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_point: Option<TrustPoint>,

    /// Set if the verifier is a website, e.g. "https://gov.example.com".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_origin: Option<String>,
}

impl ConsentRelyingParty {
    /// Pre-consent is only permitted for trusted relying parties.
    #[must_use]
    pub const fn is_trusted(&self) -> bool {
        self.trust_point.is_some()
    }
}
