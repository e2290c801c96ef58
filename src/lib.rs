#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! OnioNS core - self-certifying names for Tor hidden services
//!
//! A [`Record`] binds a human-readable `.tor` name to a hidden service. It is
//! owned by an Ed25519 identity key, authorised by the service's own RSA key,
//! and rate-limited by a memory-hard proof-of-work. Valid records are
//! committed into a [`MerkleTree`] whose root is the only value a quorum needs
//! to publish; any peer can then check inclusion and absence proofs against
//! that root.

// Fixed choices:
// - Identity: Ed25519 (strict verification)
// - Service key: RSA-1024, PKCS#1 v1.5 / SHA-384 signatures
// - Proof-of-work: scrypt (pi-digit salt) then SHA-256, numeric threshold
// - Merkle tree: binary SHA-256, duplicate-last, leaves sorted by name

pub mod types;
pub mod errors;
pub mod config;
pub mod ser;
pub mod hashers;
pub mod record;
pub mod wire;
pub mod miner;
pub mod merkle;
pub mod cache;
pub mod logging;

pub use types::*;
pub use errors::{
    CacheError, ConfigError, MiningError, PolicyViolation, PrimitiveError, ProofError, Rejection,
    ValidityError, WireError,
};
pub use config::{pow_threshold, Config, ScryptCost};
pub use record::{AnyQuorumTag, QuorumTagVerifier, Record, RecordKeys, ServiceKey};
pub use miner::{mine, NonceOdometer, Solution, WorkStatus};
pub use merkle::{
    verify_proof, verify_root, AbsenceProof, InclusionProof, MerkleProof, MerkleTree, NodeId,
    PathStep, ProofOutcome, Side,
};
pub use cache::RecordCache;
pub use logging::{LogContext, LogDestination, Verbosity};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
