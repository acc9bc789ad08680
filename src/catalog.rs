//! # Document-Type Catalog
//!
//! A catalog maps the namespace/element identifiers of an mdoc document type,
//! or the claim names of a selectively-disclosable credential, to display
//! metadata. Catalogs are static: they are assembled once from known document
//! type definitions and consulted read-only while building consent fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The data type of a catalog-defined attribute.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum AttributeType {
    /// A UTF-8 string.
    String,

    /// An integer or floating point number.
    Number,

    /// A full date, no time of day.
    Date,

    /// A date and time of day.
    DateTime,

    /// An image, e.g. a portrait.
    Picture,

    /// A boolean.
    Boolean,

    /// A composite value, e.g. a list of driving privileges.
    Complex,
}

/// Metadata for an attribute (data element or claim) of a document type.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAttribute {
    /// The data type of the attribute.
    #[serde(rename = "type")]
    pub type_: AttributeType,

    /// The element or claim identifier, e.g. "family_name".
    pub identifier: String,

    /// The name suitable for display, e.g. "Family Name".
    pub display_name: String,

    /// A description of the attribute.
    pub description: String,

    /// The name of an icon representing the attribute, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Whether a verifier must always request this attribute.
    pub mandatory: bool,

    /// Whether the user may grant a pre-consent covering this attribute.
    /// Sensitive attributes leave this unset so every disclosure is
    /// interactively confirmed.
    pub preconsent_allowed: bool,

    /// A sample value for the attribute, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_value: Option<ciborium::Value>,
}

/// Lookup table from namespace/element and claim identifiers to attribute
/// metadata.
#[derive(Clone, Debug, Default)]
pub struct DocumentTypeCatalog {
    mdoc: BTreeMap<(String, String), DocumentAttribute>,
    claims: BTreeMap<String, DocumentAttribute>,
}

impl DocumentTypeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for an mdoc data element.
    pub fn register_mdoc_attribute(&mut self, namespace: &str, attribute: DocumentAttribute) {
        self.mdoc
            .insert((namespace.to_string(), attribute.identifier.clone()), attribute);
    }

    /// Register metadata for a selectively-disclosable claim.
    pub fn register_claim_attribute(&mut self, attribute: DocumentAttribute) {
        self.claims.insert(attribute.identifier.clone(), attribute);
    }

    /// Look up metadata for an mdoc data element.
    #[must_use]
    pub fn mdoc_attribute(&self, namespace: &str, element: &str) -> Option<&DocumentAttribute> {
        self.mdoc.get(&(namespace.to_string(), element.to_string()))
    }

    /// Look up metadata for a claim by name.
    #[must_use]
    pub fn claim_attribute(&self, claim_name: &str) -> Option<&DocumentAttribute> {
        self.claims.get(claim_name)
    }
}
