//! # SD-JWT Presentation
//!
//! Parses a selectively-disclosable credential in compact serialization,
//! filters its disclosures down to the consented claim names, and binds the
//! result to the verifier with a key-binding JWT signed by the credential's
//! device key.

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded as Base64, Encoding};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::provider::{KeyUnlock, SecureArea, SignError};

/// A single disclosure: the encoded token as issued, plus the claim name it
/// reveals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disclosure {
    /// The disclosure token, base64url as it appeared in the credential.
    pub encoded: String,

    /// The claim name the disclosure reveals.
    pub claim_name: String,
}

/// A decoded selectively-disclosable credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdJwt {
    /// The issuer-signed JWT, verbatim.
    pub issuer_jwt: String,

    /// The disclosures that accompanied the credential, in issued order.
    pub disclosures: Vec<Disclosure>,
}

impl SdJwt {
    /// Parse the compact serialization `<jwt>~<disclosure>~...~`.
    ///
    /// # Errors
    /// Returns an error if the serialization is malformed or a disclosure is
    /// not a base64url-encoded `[salt, claim name, value]` array.
    pub fn parse(compact: &str) -> anyhow::Result<Self> {
        let mut parts = compact.split('~');
        let issuer_jwt = parts.next().unwrap_or_default().to_string();
        if issuer_jwt.is_empty() {
            bail!("missing issuer-signed JWT");
        }

        let mut disclosures = Vec::new();
        for encoded in parts.filter(|part| !part.is_empty()) {
            let decoded = Base64::decode_vec(encoded)
                .map_err(|e| anyhow!("invalid disclosure encoding: {e}"))?;
            let array: Vec<serde_json::Value> = serde_json::from_slice(&decoded)?;
            let Some(claim_name) = array.get(1).and_then(serde_json::Value::as_str) else {
                bail!("disclosure has no claim name");
            };
            disclosures.push(Disclosure {
                encoded: encoded.to_string(),
                claim_name: claim_name.to_string(),
            });
        }

        Ok(Self { issuer_jwt, disclosures })
    }

    /// Keep only the disclosures whose claim name appears in `claim_names`,
    /// preserving issued order.
    #[must_use]
    pub fn retain_claims(&self, claim_names: &[&str]) -> Self {
        Self {
            issuer_jwt: self.issuer_jwt.clone(),
            disclosures: self
                .disclosures
                .iter()
                .filter(|disclosure| claim_names.contains(&disclosure.claim_name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// The presentation prefix: issuer JWT plus the kept disclosures, each
    /// followed by a `~` separator. The key-binding hash is computed over
    /// these exact bytes.
    fn prefix(&self) -> String {
        let mut prefix = format!("{}~", self.issuer_jwt);
        for disclosure in &self.disclosures {
            prefix.push_str(&disclosure.encoded);
            prefix.push('~');
        }
        prefix
    }

    /// Create the presented form: prefix plus a key-binding JWT over the
    /// verifier's nonce and client id, signed with the credential's device
    /// key. A locked key surfaces as [`SignError::Locked`] for the unlock
    /// loop to resolve.
    pub fn present(
        &self, secure_area: &impl SecureArea, alias: &str, unlock: Option<&KeyUnlock>,
        nonce: &str, client_id: &str,
    ) -> Result<Vec<u8>, SignError> {
        let prefix = self.prefix();
        let sd_hash = Base64::encode_string(&Sha256::digest(prefix.as_bytes()));

        let header = json!({ "typ": "kb+jwt", "alg": "ES256" });
        let claims = json!({
            "nonce": nonce,
            "aud": client_id,
            "iat": chrono::Utc::now().timestamp(),
            "sd_hash": sd_hash,
        });

        let signing_input = format!(
            "{}.{}",
            Base64::encode_string(header.to_string().as_bytes()),
            Base64::encode_string(claims.to_string().as_bytes()),
        );
        let signature = secure_area.sign(alias, signing_input.as_bytes(), unlock)?;
        let kb_jwt = format!("{signing_input}.{}", Base64::encode_string(&signature));

        Ok(format!("{prefix}{kb_jwt}").into_bytes())
    }
}
