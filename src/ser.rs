use onions_primitives::le_bytes;

use crate::record::Record;
use crate::types::{MASTER_KEY_LEN, MASTER_SIG_LEN, NONCE_LEN, SERVICE_SIG_LEN};

#[inline]
#[must_use]
pub fn le32(x: u32) -> [u8; 4] {
    le_bytes::<4>(u128::from(x))
}

/// Canonical record bytes, the exact domain of the identity signature, the
/// record ID and the proof-of-work.
///
/// `service_sig? || master_sig? || service_key_der || master_key ||
///  Σ(label || destination) || type || name || contact || LE32(rng) || LE32(nonce)`
///
/// Order is fixed and there is no length framing. The nonce is always the
/// final `NONCE_LEN` bytes.
#[must_use]
pub fn canonical_bytes(rec: &Record, include_signatures: bool) -> Vec<u8> {
    let der = rec.service_key.as_ref().map_or(&[][..], |k| k.der());
    let strings: usize = rec
        .subdomains
        .iter()
        .map(|s| s.label.len() + s.destination.len())
        .sum::<usize>()
        + rec.kind.as_str().len()
        + rec.name.len()
        + rec.contact.len();
    let sigs = if include_signatures { SERVICE_SIG_LEN + MASTER_SIG_LEN } else { 0 };
    let mut v = Vec::with_capacity(sigs + der.len() + MASTER_KEY_LEN + strings + 4 + NONCE_LEN);

    if include_signatures {
        v.extend_from_slice(&rec.service_sig);                // 128
        v.extend_from_slice(&rec.master_sig);                 // 64
    }
    v.extend_from_slice(der);
    v.extend_from_slice(&rec.master_key);                     // 32
    for sub in &rec.subdomains {
        v.extend_from_slice(sub.label.as_bytes());
        v.extend_from_slice(sub.destination.as_bytes());
    }
    v.extend_from_slice(rec.kind.as_str().as_bytes());
    v.extend_from_slice(rec.name.as_bytes());
    v.extend_from_slice(rec.contact.as_bytes());
    v.extend_from_slice(&le32(rec.rng));                      // 4
    v.extend_from_slice(&le32(rec.nonce));                    // 4
    v
}

/// What the service key signs: `master_key || name || service_key_der`.
///
/// Binds the hidden-service key to one name under one owner, independent of
/// subdomains and contact, which may change later.
#[must_use]
pub fn service_scope(rec: &Record) -> Vec<u8> {
    let der = rec.service_key.as_ref().map_or(&[][..], |k| k.der());
    let mut v = Vec::with_capacity(MASTER_KEY_LEN + rec.name.len() + der.len());
    v.extend_from_slice(&rec.master_key);
    v.extend_from_slice(rec.name.as_bytes());
    v.extend_from_slice(der);
    v
}
