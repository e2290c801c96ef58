//! Wire JSON for records.
//!
//! Reading never fails on content: a missing, mistyped or wrongly sized field
//! is simply absent, and the resulting record is rejected by the validity
//! pipeline instead of crashing the reader.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::WireError;
use crate::record::{Record, ServiceKey};
use crate::types::{RecordType, Subdomain, MASTER_KEY_LEN, MASTER_SIG_LEN, SERVICE_SIG_LEN};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct WireRecord {
    #[serde(rename = "type", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "pgp", alias = "contact", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    contact: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    subd: Option<Map<String, Value>>,
    #[serde(rename = "edKey", alias = "masterKey", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    master_key: Option<String>,
    #[serde(rename = "edSig", alias = "masterSig", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    master_sig: Option<String>,
    #[serde(rename = "rsaKey", alias = "serviceKey", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    service_key: Option<String>,
    #[serde(rename = "rsaSig", alias = "serviceSig", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    service_sig: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    rng: Option<u32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    nonce: Option<u32>,
}

/// Any value of the wrong JSON type reads as absent.
fn lenient<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(de)?;
    Ok(serde_json::from_value(value).ok())
}

fn fixed<const N: usize>(field: &'static str, b64: Option<&str>) -> Option<[u8; N]> {
    let bytes = STANDARD.decode(b64?).map_err(|e| debug!(field, %e, "bad base64")).ok()?;
    let len = bytes.len();
    <[u8; N]>::try_from(bytes)
        .map_err(|_| debug!(field, len, expected = N, "wrong length"))
        .ok()
}

impl Record {
    /// Build a record from its wire form. Never fails; see the module docs.
    #[must_use]
    pub fn from_wire(value: &Value) -> Self {
        let wire = WireRecord::deserialize(value).unwrap_or_else(|e| {
            warn!(%e, "unreadable record, treating every field as absent");
            WireRecord::default()
        });

        let subdomains = wire
            .subd
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(label, dest)| match dest {
                Value::String(d) => Some(Subdomain::new(label, d)),
                _ => None,
            })
            .collect();

        let service_key = wire.service_key.as_deref().and_then(|b64| {
            let der = STANDARD.decode(b64).ok()?;
            ServiceKey::from_der(&der)
                .map_err(|e| warn!(%e, "unusable service key"))
                .ok()
        });

        Self {
            kind: wire.kind.as_deref().map_or_else(
                || RecordType::Unrecognized(String::new()),
                RecordType::parse,
            ),
            name: wire.name.unwrap_or_default(),
            contact: wire.contact.unwrap_or_default(),
            subdomains,
            master_key: fixed::<MASTER_KEY_LEN>("edKey", wire.master_key.as_deref()).unwrap_or([0u8; MASTER_KEY_LEN]),
            master_sig: fixed::<MASTER_SIG_LEN>("edSig", wire.master_sig.as_deref()).unwrap_or([0u8; MASTER_SIG_LEN]),
            service_key,
            service_sig: fixed::<SERVICE_SIG_LEN>("rsaSig", wire.service_sig.as_deref()).unwrap_or([0u8; SERVICE_SIG_LEN]),
            rng: wire.rng.unwrap_or(0),
            nonce: wire.nonce.unwrap_or(0),
        }
    }

    /// # Errors
    ///
    /// Returns `WireError::Json` only when `s` is not JSON at all.
    pub fn from_wire_str(s: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(s)?;
        Ok(Self::from_wire(&value))
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        let subd: Map<String, Value> = self
            .subdomains
            .iter()
            .map(|s| (s.label.clone(), Value::String(s.destination.clone())))
            .collect();
        let wire = WireRecord {
            kind: Some(self.kind.as_str().to_owned()),
            name: Some(self.name.clone()),
            contact: (!self.contact.is_empty()).then(|| self.contact.clone()),
            subd: (!subd.is_empty()).then_some(subd),
            master_key: Some(STANDARD.encode(self.master_key)),
            master_sig: Some(STANDARD.encode(self.master_sig)),
            service_key: self.service_key.as_ref().map(|k| STANDARD.encode(k.der())),
            service_sig: Some(STANDARD.encode(self.service_sig)),
            rng: Some(self.rng),
            nonce: Some(self.nonce),
        };
        serde_json::to_value(wire).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn to_wire_string(&self) -> String {
        self.to_wire().to_string()
    }
}

/// serde adapter: a 32-byte digest as standard base64.
pub mod hash_b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::types::Hash256;

    /// # Errors
    ///
    /// Whatever the serializer reports.
    pub fn serialize<S: Serializer>(hash: &Hash256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(hash))
    }

    /// # Errors
    ///
    /// Invalid base64, or a decoded length other than 32.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hash256, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = STANDARD.decode(s).map_err(D::Error::custom)?;
        Hash256::try_from(bytes.as_slice())
            .map_err(|_| D::Error::invalid_length(bytes.len(), &"32 bytes"))
    }
}
