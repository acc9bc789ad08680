//! # CBOR
//!
//! Helpers for the CBOR encodings used by persisted pre-consent records and
//! mdoc structures, including the tag 24 (`bstr .cbor`) wrapper.

use std::io::Cursor;

use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::{de, ser, Deserialize, Serialize};

/// Serialize a value to CBOR bytes.
pub fn to_vec<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes.
pub fn from_slice<T: DeserializeOwned>(slice: &[u8]) -> anyhow::Result<T> {
    ciborium::from_reader(Cursor::new(slice)).map_err(|e| anyhow!("failed to decode CBOR: {e}"))
}

/// Wraps a type whose encoding is `#6.24(bstr .cbor T)`: the inner value is
/// CBOR-encoded to a byte string and tagged with tag 24.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag24<T>(pub T);

impl<T: Serialize> Tag24<T> {
    /// CBOR-encode the wrapper, tag included.
    pub fn to_vec(&self) -> anyhow::Result<Vec<u8>> {
        to_vec(self)
    }
}

impl<T: Serialize> Serialize for Tag24<T> {
    fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let bytes = to_vec(&self.0).map_err(ser::Error::custom)?;
        ciborium::Value::Tag(24, Box::new(ciborium::Value::Bytes(bytes))).serialize(s)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Tag24<T> {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = ciborium::Value::deserialize(deserializer)?;
        let ciborium::Value::Tag(24, boxed) = value else {
            return Err(de::Error::custom("expected tag 24"));
        };
        let ciborium::Value::Bytes(bytes) = *boxed else {
            return Err(de::Error::custom("tag 24 content must be a byte string"));
        };
        let inner = from_slice(&bytes).map_err(de::Error::custom)?;
        Ok(Self(inner))
    }
}

/// Encode `Vec<u8>` fields as CBOR byte strings rather than integer arrays.
pub(crate) mod bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match ciborium::Value::deserialize(d)? {
            ciborium::Value::Bytes(bytes) => Ok(bytes),
            _ => Err(D::Error::custom("expected a byte string")),
        }
    }
}

/// As [`bytes`], for optional fields.
pub(crate) mod option_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_bytes(bytes),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<ciborium::Value>::deserialize(d)? {
            None | Some(ciborium::Value::Null) => Ok(None),
            Some(ciborium::Value::Bytes(bytes)) => Ok(Some(bytes)),
            Some(_) => Err(D::Error::custom("expected a byte string")),
        }
    }
}
