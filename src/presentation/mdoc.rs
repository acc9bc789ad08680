//! # Mdoc Document Generation
//!
//! Merges the issuer-provided static authentication data with the subset of
//! namespaces and data elements the user consented to, then wraps the result
//! with a device-signed envelope. Only requested elements are disclosed; the
//! issuer signature is attached unchanged and never re-signed.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail};
use ciborium::Value;
use coset::iana;
use coset::{AsCborValue, CoseSign1Builder, HeaderBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cbor::{self, Tag24};
use crate::provider::{KeyUnlock, SecureArea, SignError};

/// An mdoc namespace name, e.g. "org.iso.18013.5.1".
pub type NameSpace = String;

/// Requested data element identifiers, grouped by namespace.
pub type DataElements = BTreeMap<NameSpace, Vec<String>>;

/// The credential's issuer-provided element values, grouped by namespace.
pub type NameSpacedData = BTreeMap<NameSpace, BTreeMap<String, Value>>;

/// An issuer-signed data element. Encodes as the `IssuerSignedItem` the MSO
/// digests were computed over.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSignedItem {
    /// Matches the item to its digest in the MSO `valueDigests` parameter.
    pub digest_id: i32,

    /// Random salt for issuer data authentication (min. 16 bytes).
    #[serde(with = "crate::cbor::bytes")]
    pub random: Vec<u8>,

    /// Data element identifier, e.g. "family_name".
    pub element_identifier: String,

    /// Data element value. A placeholder (null) in the static auth mapping;
    /// filled from the credential's static data during the merge.
    pub element_value: Value,
}

/// The issuer-provided static authentication data stored with a credential:
/// the per-namespace digest-id mapping and the issuer's COSE_Sign1 over the
/// MSO.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAuthData {
    /// Value-less issuer-signed items per namespace, carrying the digest ids
    /// and salts the MSO digests were computed with.
    pub digest_id_mapping: BTreeMap<NameSpace, Vec<Tag24<IssuerSignedItem>>>,

    /// The issuer's COSE_Sign1 with a payload of `MobileSecurityObjectBytes`.
    /// Kept opaque: it is attached to the generated document unchanged.
    pub issuer_auth: Value,
}

impl StaticAuthData {
    /// Serialize to CBOR bytes.
    ///
    /// # Errors
    /// Returns an error if CBOR encoding fails.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    /// Deserialize from bytes produced by [`Self::to_bytes`].
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid encoding.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        cbor::from_slice(bytes)
    }
}

/// The digest manifest signed by the issuer. Decoded from the issuer auth
/// payload; only the parameters the merge consults are modelled.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileSecurityObject {
    /// Version of the `MobileSecurityObject`. Must be "1.0".
    pub version: String,

    /// Message digest algorithm used, e.g. "SHA-256".
    pub digest_algorithm: String,

    /// Digests of all data elements, by namespace and digest id.
    pub value_digests: BTreeMap<NameSpace, BTreeMap<i32, Value>>,

    /// The document type, e.g. "org.iso.18013.5.1.mDL".
    pub doc_type: String,
}

/// Decode the MSO from an issuer auth COSE_Sign1 value.
///
/// # Errors
/// Returns an error if the value is not a COSE_Sign1 or carries no payload.
pub fn mso_from_issuer_auth(issuer_auth: &Value) -> anyhow::Result<MobileSecurityObject> {
    // accept both tagged and untagged COSE_Sign1
    let value = match issuer_auth {
        Value::Tag(18, inner) => (**inner).clone(),
        other => other.clone(),
    };
    let sign1 =
        coset::CoseSign1::from_cbor_value(value).map_err(|e| anyhow!("invalid issuer auth: {e}"))?;
    let payload = sign1.payload.ok_or_else(|| anyhow!("issuer auth has no payload"))?;

    let mso_bytes: Tag24<MobileSecurityObject> = cbor::from_slice(&payload)?;
    Ok(mso_bytes.0)
}

/// Generates the final device response document for one credential: merged
/// issuer-signed namespaces, unchanged issuer auth, and a device-signed
/// envelope over the session transcript.
#[derive(Debug)]
pub(crate) struct DocumentGenerator {
    doc_type: String,
    issuer_auth: Value,
    merged: BTreeMap<NameSpace, Vec<Tag24<IssuerSignedItem>>>,
    session_transcript: Value,
}

impl DocumentGenerator {
    /// Parse the issuer-provided data and merge the static element values
    /// into the digest-id mapping, filtered down to exactly the requested
    /// namespaces and elements. Every merged item's digest is checked
    /// against the MSO so the issuer signature still covers what is
    /// disclosed.
    pub fn new(
        issuer_data: &[u8], static_data: &NameSpacedData, requested: &DataElements,
        session_transcript: &[u8],
    ) -> anyhow::Result<Self> {
        let auth = StaticAuthData::from_bytes(issuer_data)?;
        let mso = mso_from_issuer_auth(&auth.issuer_auth)?;

        let mut merged: BTreeMap<NameSpace, Vec<Tag24<IssuerSignedItem>>> = BTreeMap::new();

        for (namespace, elements) in requested {
            let Some(items) = auth.digest_id_mapping.get(namespace) else {
                continue;
            };
            let Some(values) = static_data.get(namespace) else {
                continue;
            };

            let mut namespace_items = Vec::new();
            for element in elements {
                let Some(item) = items.iter().find(|i| &i.0.element_identifier == element) else {
                    continue;
                };
                let Some(value) = values.get(element) else {
                    continue;
                };

                let complete = Tag24(IssuerSignedItem {
                    element_value: value.clone(),
                    ..item.0.clone()
                });

                let digest = Sha256::digest(complete.to_vec()?).to_vec();
                let expected = mso
                    .value_digests
                    .get(namespace)
                    .and_then(|digests| digests.get(&complete.0.digest_id));
                if expected != Some(&Value::Bytes(digest)) {
                    bail!("digest mismatch for {namespace}/{element}");
                }

                namespace_items.push(complete);
            }

            if !namespace_items.is_empty() {
                merged.insert(namespace.clone(), namespace_items);
            }
        }

        Ok(Self {
            doc_type: mso.doc_type,
            issuer_auth: auth.issuer_auth,
            merged,
            session_transcript: cbor::from_slice(session_transcript)?,
        })
    }

    /// Sign the device authentication structure with the credential's key
    /// and emit the encoded document. A locked key surfaces as
    /// [`SignError::Locked`] for the unlock loop to resolve.
    pub fn sign_and_generate(
        &self, secure_area: &impl SecureArea, alias: &str, unlock: Option<&KeyUnlock>,
    ) -> Result<Vec<u8>, SignError> {
        // no device-provided data elements: an empty DeviceNameSpaces
        let device_namespaces = Tag24(BTreeMap::<String, Value>::new());

        let auth_structure = (
            "DeviceAuthentication",
            &self.session_transcript,
            &self.doc_type,
            &device_namespaces,
        );
        let payload = cbor::to_vec(&auth_structure)?;

        let signature = secure_area.sign(alias, &payload, unlock)?;

        let protected = HeaderBuilder::new().algorithm(iana::Algorithm::ES256).build();
        let device_signature = CoseSign1Builder::new()
            .protected(protected)
            .signature(signature)
            .build()
            .to_cbor_value()
            .map_err(|e| anyhow!("failed to encode device signature: {e}"))?;

        let document = Value::Map(vec![
            (Value::Text("docType".into()), Value::Text(self.doc_type.clone())),
            (
                Value::Text("issuerSigned".into()),
                Value::Map(vec![
                    (
                        Value::Text("nameSpaces".into()),
                        Value::serialized(&self.merged)
                            .map_err(|e| anyhow!("failed to encode namespaces: {e}"))?,
                    ),
                    (Value::Text("issuerAuth".into()), self.issuer_auth.clone()),
                ]),
            ),
            (
                Value::Text("deviceSigned".into()),
                Value::Map(vec![
                    (
                        Value::Text("nameSpaces".into()),
                        Value::serialized(&device_namespaces)
                            .map_err(|e| anyhow!("failed to encode device namespaces: {e}"))?,
                    ),
                    (
                        Value::Text("deviceAuth".into()),
                        Value::Map(vec![(
                            Value::Text("deviceSignature".into()),
                            device_signature,
                        )]),
                    ),
                ]),
            ),
        ]);

        Ok(cbor::to_vec(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use coset::CoseSign1Builder;

    use super::*;

    const DOC_TYPE: &str = "org.iso.18013.5.1.mDL";
    const NAMESPACE: &str = "org.iso.18013.5.1";

    fn sample_issuer_data() -> (Vec<u8>, NameSpacedData) {
        let mut static_data: NameSpacedData = BTreeMap::new();
        static_data.insert(
            NAMESPACE.to_string(),
            BTreeMap::from([
                ("family_name".to_string(), Value::Text("Mustermann".into())),
                ("given_name".to_string(), Value::Text("Erika".into())),
            ]),
        );

        let mut digests: BTreeMap<i32, Value> = BTreeMap::new();
        let mut mapping_items = Vec::new();
        for (digest_id, element) in ["family_name", "given_name"].iter().enumerate() {
            let digest_id = i32::try_from(digest_id).unwrap();
            let complete = Tag24(IssuerSignedItem {
                digest_id,
                random: vec![digest_id as u8; 16],
                element_identifier: (*element).to_string(),
                element_value: static_data[NAMESPACE][*element].clone(),
            });
            digests.insert(
                digest_id,
                Value::Bytes(Sha256::digest(complete.to_vec().unwrap()).to_vec()),
            );
            mapping_items.push(Tag24(IssuerSignedItem {
                element_value: Value::Null,
                ..complete.0
            }));
        }

        let mso = MobileSecurityObject {
            version: "1.0".to_string(),
            digest_algorithm: "SHA-256".to_string(),
            value_digests: BTreeMap::from([(NAMESPACE.to_string(), digests)]),
            doc_type: DOC_TYPE.to_string(),
        };
        let issuer_auth = CoseSign1Builder::new()
            .payload(Tag24(mso).to_vec().unwrap())
            .signature(vec![0xaa; 64])
            .build()
            .to_cbor_value()
            .unwrap();

        let auth = StaticAuthData {
            digest_id_mapping: BTreeMap::from([(NAMESPACE.to_string(), mapping_items)]),
            issuer_auth,
        };
        (auth.to_bytes().unwrap(), static_data)
    }

    fn session_transcript() -> Vec<u8> {
        cbor::to_vec(&Value::Array(vec![Value::Null, Value::Null, Value::Null])).unwrap()
    }

    #[test]
    fn merge_filters_to_requested_elements() {
        let (issuer_data, static_data) = sample_issuer_data();
        let requested: DataElements =
            BTreeMap::from([(NAMESPACE.to_string(), vec!["family_name".to_string()])]);

        let generator =
            DocumentGenerator::new(&issuer_data, &static_data, &requested, &session_transcript())
                .expect("should merge");

        assert_eq!(generator.doc_type, DOC_TYPE);
        let items = &generator.merged[NAMESPACE];
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0.element_identifier, "family_name");
        assert_eq!(items[0].0.element_value, Value::Text("Mustermann".into()));
    }

    #[test]
    fn merge_rejects_tampered_values() {
        let (issuer_data, mut static_data) = sample_issuer_data();
        static_data
            .get_mut(NAMESPACE)
            .unwrap()
            .insert("family_name".to_string(), Value::Text("Impostor".into()));
        let requested: DataElements =
            BTreeMap::from([(NAMESPACE.to_string(), vec!["family_name".to_string()])]);

        let result =
            DocumentGenerator::new(&issuer_data, &static_data, &requested, &session_transcript());
        assert!(result.is_err());
    }
}
