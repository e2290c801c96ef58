#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

//! OnioNS primitives: digests, fixed-width encodings, Merkle node hashing and
//! onion address derivation.
//
// Everything here is shared between the record engine and anything that has to
// verify its output without building it (light clients, mirrors):
//
// - SHA-256 for record IDs, proof-of-work and the Merkle tree
// - SHA-1 + base32 for Tor's v2 onion addresses
// - Binary Merkle (duplicate last when odd), plain `left || right` parents
// - Constant-time equality for 32-byte digests

use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 32-byte hash (SHA-256 output).
pub type Hash256 = [u8; 32];

/// 20-byte SHA-1 digest.
pub type Sha1Digest = [u8; 20];

/// 32-byte public key (Ed25519).
pub type Pk32 = [u8; 32];

/// 64-byte signature (Ed25519 canonical encoding).
pub type Sig64 = [u8; 64];

pub mod constants;
pub mod onion;

pub use onion::onion_address;

/// Convert an unsigned integer to fixed-width little-endian bytes.
///
/// The output is exactly `W` bytes (no overlong encodings).
#[must_use]
pub fn le_bytes<const W: usize>(mut x: u128) -> [u8; W] {
    let mut out = [0u8; W];
    let mut i = 0usize;
    while i < W {
        out[i] = (x & 0xFF) as u8;
        x >>= 8;
        i += 1;
    }
    out
}

/// Read a `u64` from the first 8 bytes of a big-endian byte slice.
/// Shorter inputs are treated as if right-padded with zeros.
#[must_use]
pub fn u64_from_be(b: &[u8]) -> u64 {
    let mut x: u64 = 0;
    let mut i = 0usize;
    while i < 8 {
        x <<= 8;
        if i < b.len() {
            x |= u64::from(b[i]);
        }
        i += 1;
    }
    x
}

#[must_use]
pub fn sha256(input: &[u8]) -> Hash256 {
    sha256_parts(&[input])
}

/// SHA-256 over the plain concatenation of `parts` (no length framing).
#[must_use]
pub fn sha256_parts(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[must_use]
pub fn sha1(input: &[u8]) -> Sha1Digest {
    let mut hasher = Sha1::new();
    hasher.update(input);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// Merkle leaf digest: `SHA-256(name || record_hash)`.
///
/// The record hash has a fixed width, so the concatenation is unambiguous.
#[must_use]
pub fn merkle_leaf(name: &str, record_hash: &Hash256) -> Hash256 {
    sha256_parts(&[name.as_bytes(), record_hash])
}

/// Merkle parent digest: `SHA-256(left || right)`.
#[must_use]
pub fn merkle_node(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut cat = [0u8; 64];
    cat[..32].copy_from_slice(left);
    cat[32..].copy_from_slice(right);
    sha256(&cat)
}

/// Root committed to by a tree with no leaves: `SHA-256("")`.
#[must_use]
pub fn empty_root() -> Hash256 {
    sha256(&[])
}

/// Compute the binary Merkle root over already-hashed leaves. When the number
/// of nodes at a level is odd, the last node is paired with itself.
#[must_use]
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return empty_root();
    }
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        let mut next: Vec<Hash256> = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0usize;
        while i < level.len() {
            let right = level.get(i + 1).unwrap_or(&level[i]);
            next.push(merkle_node(&level[i], right));
            i += 2;
        }
        level = next;
    }
    level[0]
}

/// Constant-time equality for two 32-byte hashes.
#[must_use]
pub fn ct_eq_hash(a: &Hash256, b: &Hash256) -> bool {
    a.ct_eq(b).into()
}
