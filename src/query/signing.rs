//! Schema tokens: HMAC-SHA256 over the canonical body, hex encoded.
//!
//! Canonical form: the body converted to a `serde_json::Value` and written
//! compactly with object keys sorted at every depth, so a schema that went
//! through any JSON re-encoding still verifies. Key order is imposed here
//! and does not depend on how `serde_json::Map` is backed in the build.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::Value as Json;
use sha2::Sha256;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// JSON value written with object keys in sorted order.
struct Canonical<'a>(&'a Json);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Json::Object(map) => {
                let sorted: BTreeMap<&str, &Json> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
                let mut out = serializer.serialize_map(Some(sorted.len()))?;
                for (key, value) in sorted {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Json::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Bytes the token is computed over.
pub fn canonical_bytes<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(body)?;
    Ok(serde_json::to_vec(&Canonical(&value))?)
}

fn mac_over<T: Serialize>(secret: &[u8], body: &T) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| Error::Config(format!("unusable query secret: {e}")))?;
    mac.update(&canonical_bytes(body)?);
    Ok(mac)
}

pub fn sign<T: Serialize>(secret: &[u8], body: &T) -> Result<String> {
    Ok(hex::encode(mac_over(secret, body)?.finalize().into_bytes()))
}

/// Constant-time check of `token` against `body`. A token that is not
/// valid hex simply fails to verify.
pub fn verify<T: Serialize>(secret: &[u8], body: &T, token: &str) -> Result<bool> {
    let Ok(tag) = hex::decode(token) else {
        return Ok(false);
    };
    Ok(mac_over(secret, body)?.verify_slice(&tag).is_ok())
}
