//! # Consent Model
//!
//! The consent field model normalises a requested data element, whether an
//! mdoc namespace/element or a selectively-disclosable claim, into a uniform
//! unit that can be displayed, compared and persisted independently of the
//! credential format.

mod document;
mod relying_party;

use serde::{Deserialize, Serialize};

pub use self::document::ConsentDocument;
pub use self::relying_party::{ConsentRelyingParty, TrustPoint};
use crate::catalog::{DocumentAttribute, DocumentTypeCatalog};
use crate::cbor;

/// A single element of a parsed device request: one data element within a
/// namespace, together with the verifier's intent to retain its value.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElementRequest {
    /// The data element identifier, e.g. "family_name".
    pub identifier: String,

    /// Whether the verifier declares it will persist the disclosed value.
    pub intent_to_retain: bool,
}

/// The data elements requested for one namespace, in request order.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRequest {
    /// The namespace name, e.g. "org.iso.18013.5.1".
    pub name: String,

    /// The requested data elements, in the order they appear in the request.
    pub elements: Vec<ElementRequest>,
}

/// A parsed device request for a single mdoc document.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    /// The requested document type, e.g. "org.iso.18013.5.1.mDL".
    pub doc_type: String,

    /// The requested namespaces, in the order they appear in the request.
    pub namespaces: Vec<NamespaceRequest>,
}

/// One requested attribute, normalised for display and comparison.
///
/// Both variants carry the display name shown in the consent prompt and the
/// catalog attribute metadata, if the element is well-known. Comparison for
/// pre-consent purposes is by display name only: within one request, display
/// names are unique per rendered field.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConsentField {
    /// An mdoc namespace-scoped data element.
    #[serde(rename_all = "camelCase")]
    Mdoc {
        /// The text to display for the requested field.
        display_name: String,

        /// Catalog metadata, if the data element is well-known.
        #[serde(skip_serializing_if = "Option::is_none")]
        attribute: Option<DocumentAttribute>,

        /// The namespace the data element belongs to.
        namespace_name: String,

        /// The data element identifier within the namespace.
        data_element_name: String,

        /// Whether the verifier declares it will persist the value.
        intent_to_retain: bool,
    },

    /// A selectively-disclosable claim of a verifiable credential.
    #[serde(rename_all = "camelCase")]
    Vc {
        /// The text to display for the requested field.
        display_name: String,

        /// Catalog metadata, if the claim is well-known.
        #[serde(skip_serializing_if = "Option::is_none")]
        attribute: Option<DocumentAttribute>,

        /// The selectively-disclosable claim key.
        claim_name: String,
    },
}

impl ConsentField {
    /// Build consent fields for every element of a parsed device request,
    /// resolving display metadata from the catalog. Elements the catalog has
    /// no entry for fall back to the raw identifier as display name.
    ///
    /// The returned order follows the request (and thereby the source
    /// catalog) order; it is a disclosure-rendering concern and is never
    /// re-sorted.
    #[must_use]
    pub fn for_mdoc_request(request: &DeviceRequest, catalog: &DocumentTypeCatalog) -> Vec<Self> {
        let mut fields = Vec::new();
        for namespace in &request.namespaces {
            for element in &namespace.elements {
                let attribute = catalog.mdoc_attribute(&namespace.name, &element.identifier);
                let display_name = attribute
                    .map_or_else(|| element.identifier.clone(), |a| a.display_name.clone());

                fields.push(Self::Mdoc {
                    display_name,
                    attribute: attribute.cloned(),
                    namespace_name: namespace.name.clone(),
                    data_element_name: element.identifier.clone(),
                    intent_to_retain: element.intent_to_retain,
                });
            }
        }
        fields
    }

    /// Build consent fields for the claims of a decoded selectively-
    /// disclosable credential, resolving display metadata by claim name.
    #[must_use]
    pub fn for_vc_claims(claims: &[String], catalog: &DocumentTypeCatalog) -> Vec<Self> {
        claims
            .iter()
            .map(|claim_name| {
                let attribute = catalog.claim_attribute(claim_name);
                let display_name =
                    attribute.map_or_else(|| claim_name.clone(), |a| a.display_name.clone());

                Self::Vc {
                    display_name,
                    attribute: attribute.cloned(),
                    claim_name: claim_name.clone(),
                }
            })
            .collect()
    }

    /// The text to display for the requested field.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Mdoc { display_name, .. } | Self::Vc { display_name, .. } => display_name,
        }
    }

    /// Catalog metadata, if the element is well-known.
    #[must_use]
    pub fn attribute(&self) -> Option<&DocumentAttribute> {
        match self {
            Self::Mdoc { attribute, .. } | Self::Vc { attribute, .. } => attribute.as_ref(),
        }
    }

    /// Whether the verifier will persist the disclosed value. Claims of
    /// selectively-disclosable credentials carry no retain flag and are
    /// treated as transient.
    #[must_use]
    pub const fn intent_to_retain(&self) -> bool {
        match self {
            Self::Mdoc { intent_to_retain, .. } => *intent_to_retain,
            Self::Vc { .. } => false,
        }
    }

    /// Whether two fields refer to the same requested attribute for
    /// pre-consent comparison purposes.
    #[must_use]
    pub fn same_field(&self, other: &Self) -> bool {
        self.display_name() == other.display_name()
    }

    /// Serialize the field to CBOR bytes.
    ///
    /// # Errors
    /// Returns an error if CBOR encoding fails.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    /// Deserialize a field from bytes produced by [`Self::to_bytes`].
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid encoding.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        cbor::from_slice(bytes)
    }
}

/// Partition fields into those the verifier will retain and those used
/// transiently, preserving the source order within each partition.
#[must_use]
pub fn partition_retained(fields: &[ConsentField]) -> (Vec<&ConsentField>, Vec<&ConsentField>) {
    fields.iter().partition(|field| field.intent_to_retain())
}
