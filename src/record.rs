//! The self-certifying name record.
//!
//! A record is owned by an Ed25519 identity key and points at a hidden
//! service whose RSA key signs `{identity key, name, service key}`. The
//! identity key signs every other field, and the unsigned canonical bytes
//! must carry a proof-of-work below the network threshold.

use core::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::CryptoRngCore;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::pkcs1v15;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Verifier as _};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha384;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{PolicyViolation, PrimitiveError, Rejection, ValidityError};
use crate::hashers::{pow_value, record_hash};
use crate::ser::{canonical_bytes, service_scope};
use crate::types::{
    Hash256, Pk32, RecordType, ServiceSig, Sig64, Subdomain, MASTER_SIG_LEN, MAX_CONTACT_LEN,
    MAX_DESTINATION_LEN, MAX_NAME_LEN, MAX_SUBDOMAINS, MAX_SUBDOMAIN_LABEL_LEN,
    MIN_NAME_LABEL_LEN, ONION_SUFFIX, SERVICE_KEY_BITS, SERVICE_SIG_LEN, TOR_SUFFIX,
};

/// Hidden-service public key together with its two encodings.
///
/// `der` is the SubjectPublicKeyInfo form that travels on the wire and is
/// signed; `onion` is derived from the PKCS#1 form the way Tor does it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceKey {
    key: RsaPublicKey,
    der: Vec<u8>,
    onion: String,
}

impl ServiceKey {
    /// # Errors
    ///
    /// Returns `PrimitiveError::KeyEncoding` if the key cannot be DER-encoded.
    pub fn new(key: RsaPublicKey) -> Result<Self, PrimitiveError> {
        let der = key
            .to_public_key_der()
            .map_err(|e| PrimitiveError::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();
        let pkcs1 = key
            .to_pkcs1_der()
            .map_err(|e| PrimitiveError::KeyEncoding(e.to_string()))?;
        let onion = onions_primitives::onion_address(pkcs1.as_bytes());
        Ok(Self { key, der, onion })
    }

    /// Parse a DER SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::KeyEncoding` if the bytes are not an RSA SPKI.
    pub fn from_der(der: &[u8]) -> Result<Self, PrimitiveError> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| PrimitiveError::KeyEncoding(e.to_string()))?;
        Self::new(key)
    }

    #[must_use]
    pub const fn key(&self) -> &RsaPublicKey {
        &self.key
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn onion(&self) -> &str {
        &self.onion
    }

    /// Modulus width in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.key.n().bits()
    }
}

/// Private halves of both key pairs, held only by the record's author.
#[derive(Clone)]
pub struct RecordKeys {
    pub master: SigningKey,
    pub service: RsaPrivateKey,
}

impl fmt::Debug for RecordKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordKeys")
            .field("master", &hex_prefix(self.master.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

impl RecordKeys {
    /// Fresh Ed25519 identity and 1024-bit RSA service keys.
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::KeyEncoding` if RSA key generation fails.
    pub fn generate<R: CryptoRngCore>(rng: &mut R) -> Result<Self, PrimitiveError> {
        let master = SigningKey::generate(rng);
        let service = RsaPrivateKey::new(rng, SERVICE_KEY_BITS)
            .map_err(|e| PrimitiveError::KeyEncoding(e.to_string()))?;
        Ok(Self { master, service })
    }

    #[must_use]
    pub fn master_public(&self) -> Pk32 {
        self.master.verifying_key().to_bytes()
    }

    /// # Errors
    ///
    /// Returns `PrimitiveError::KeyEncoding` if the public key cannot be encoded.
    pub fn service_public(&self) -> Result<ServiceKey, PrimitiveError> {
        ServiceKey::new(self.service.to_public_key())
    }

    pub(crate) fn sign_service(&self, scope: &[u8]) -> Result<ServiceSig, PrimitiveError> {
        let signer = pkcs1v15::SigningKey::<Sha384>::new(self.service.clone());
        let sig = signer
            .try_sign(scope)
            .map_err(|e| PrimitiveError::Signing(e.to_string()))?
            .to_vec();
        ServiceSig::try_from(sig.as_slice()).map_err(|_| {
            PrimitiveError::Signing(format!("service signature is {} bytes", sig.len()))
        })
    }

    pub(crate) fn sign_master(&self, scope: &[u8]) -> Sig64 {
        self.master.sign(scope).to_bytes()
    }
}

/// Accepts or refuses the `rng` tag a quorum stamped on a record.
pub trait QuorumTagVerifier {
    fn accepts(&self, rng: u32) -> bool;
}

/// No quorum randomness is enforced; every tag is acceptable.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyQuorumTag;

impl QuorumTagVerifier for AnyQuorumTag {
    fn accepts(&self, _rng: u32) -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordType,
    pub name: String,
    pub contact: String,
    pub subdomains: Vec<Subdomain>,
    pub master_key: Pk32,
    pub master_sig: Sig64,
    pub service_key: Option<ServiceKey>,
    pub service_sig: ServiceSig,
    pub rng: u32,
    pub nonce: u32,
}

impl Record {
    /// Record shell with no keys yet, for local creation prior to mining.
    pub fn new_draft(
        kind: RecordType,
        name: impl Into<String>,
        contact: impl Into<String>,
        subdomains: Vec<Subdomain>,
        rng: u32,
        nonce: u32,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            contact: contact.into(),
            subdomains,
            master_key: [0u8; 32],
            master_sig: [0u8; MASTER_SIG_LEN],
            service_key: None,
            service_sig: [0u8; SERVICE_SIG_LEN],
            rng,
            nonce,
        }
    }

    /// Install the public halves of `keys`. Signatures are left untouched
    /// until the record is mined.
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError::KeyEncoding` if the service key cannot be encoded.
    pub fn assign_keys(&mut self, keys: &RecordKeys) -> Result<(), PrimitiveError> {
        self.master_key = keys.master_public();
        self.service_key = Some(keys.service_public()?);
        Ok(())
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.service_key.is_some()
    }

    #[must_use]
    pub fn as_bytes(&self, include_signatures: bool) -> Vec<u8> {
        canonical_bytes(self, include_signatures)
    }

    /// Record ID.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        record_hash(&self.as_bytes(true))
    }

    #[must_use]
    pub fn onion_address(&self) -> Option<&str> {
        self.service_key.as_ref().map(ServiceKey::onion)
    }

    /// # Errors
    ///
    /// Returns `PrimitiveError` if the scrypt parameters are unusable.
    pub fn pow_value(&self, config: &Config) -> Result<u64, PrimitiveError> {
        pow_value(&self.as_bytes(false), &config.scrypt)
    }

    /// Resolve `query` against this record.
    ///
    /// The name itself maps to the onion address; `label.name` maps to
    /// `destination.name` for the first subdomain with that label.
    #[must_use]
    pub fn resolve(&self, query: &str) -> Option<String> {
        if query == self.name {
            return self.onion_address().map(str::to_owned);
        }
        let label = query.strip_suffix(self.name.as_str())?.strip_suffix('.')?;
        self.subdomains
            .iter()
            .find(|s| s.label == label)
            .map(|s| format!("{}.{}", s.destination, self.name))
    }

    // ---- validity ------------------------------------------------------

    /// Run the validity pipeline, cheapest check first, with no quorum tag
    /// policy.
    ///
    /// # Errors
    ///
    /// `ValidityError::Rejected` names the first failing check;
    /// `ValidityError::Primitive` means the check could not run at all.
    pub fn check_validity(&self, config: &Config) -> Result<(), ValidityError> {
        self.check_validity_with(config, &AnyQuorumTag)
    }

    /// # Errors
    ///
    /// As [`Record::check_validity`].
    pub fn check_validity_with<Q: QuorumTagVerifier + ?Sized>(
        &self,
        config: &Config,
        tags: &Q,
    ) -> Result<(), ValidityError> {
        let service = self.service_key.as_ref().ok_or(Rejection::Incomplete)?;
        self.verify_pow(config)?;
        self.verify_identity_sig()?;
        verify_service_key(service)?;
        self.verify_service_sig()?;
        self.verify_rng(tags)?;
        self.verify_subdomains()?;
        self.verify_strings()?;
        Ok(())
    }

    /// `true` iff every check passes. A rejection is logged with its reason.
    #[must_use]
    pub fn compute_validity(&self, config: &Config) -> bool {
        match self.check_validity(config) {
            Ok(()) => {
                debug!(name = %self.name, "record valid");
                true
            }
            Err(ValidityError::Rejected(reason)) => {
                warn!(name = %self.name, %reason, "record rejected");
                false
            }
            Err(ValidityError::Primitive(err)) => {
                tracing::error!(name = %self.name, %err, "cannot evaluate record");
                false
            }
        }
    }

    /// Every failing check, in pipeline order, without stopping at the first.
    /// Signature and key checks are skipped for an incomplete record.
    ///
    /// # Errors
    ///
    /// Returns `PrimitiveError` if the proof-of-work cannot be evaluated.
    pub fn audit(&self, config: &Config) -> Result<Vec<Rejection>, PrimitiveError> {
        let mut failed = Vec::new();
        let mut note = |r: Result<(), Rejection>| {
            if let Err(e) = r {
                failed.push(e);
            }
        };
        match &self.service_key {
            None => note(Err(Rejection::Incomplete)),
            Some(service) => {
                match self.verify_pow(config) {
                    Err(ValidityError::Primitive(e)) => return Err(e),
                    Err(ValidityError::Rejected(r)) => note(Err(r)),
                    Ok(()) => {}
                }
                note(self.verify_identity_sig());
                note(verify_service_key(service));
                note(self.verify_service_sig());
            }
        }
        note(self.verify_rng(&AnyQuorumTag));
        note(self.verify_subdomains());
        note(self.verify_strings());
        Ok(failed)
    }

    /// # Errors
    ///
    /// `Rejection::ProofOfWork` above the threshold, or `PrimitiveError` from scrypt.
    pub fn verify_pow(&self, config: &Config) -> Result<(), ValidityError> {
        let value = self.pow_value(config)?;
        let threshold = config.threshold();
        if value > threshold {
            return Err(Rejection::ProofOfWork { value, threshold }.into());
        }
        Ok(())
    }

    /// Ed25519 over `as_bytes(false)`, strict verification.
    ///
    /// # Errors
    ///
    /// `Rejection::IdentitySignature` if the key is not a valid point or the
    /// signature does not verify.
    pub fn verify_identity_sig(&self) -> Result<(), Rejection> {
        let key = VerifyingKey::from_bytes(&self.master_key)
            .map_err(|_| Rejection::IdentitySignature)?;
        let sig = Signature::from_bytes(&self.master_sig);
        key.verify_strict(&self.as_bytes(false), &sig)
            .map_err(|_| Rejection::IdentitySignature)
    }

    /// # Errors
    ///
    /// `Rejection::Incomplete` without a service key, else
    /// `Rejection::ServiceKeyShape` for the wrong modulus width.
    pub fn verify_service_key(&self) -> Result<(), Rejection> {
        verify_service_key(self.service_key.as_ref().ok_or(Rejection::Incomplete)?)
    }

    /// RSA PKCS#1 v1.5 / SHA-384 over `master_key || name || service_key_der`.
    ///
    /// # Errors
    ///
    /// `Rejection::ServiceSignature` if it does not verify.
    pub fn verify_service_sig(&self) -> Result<(), Rejection> {
        let service = self.service_key.as_ref().ok_or(Rejection::Incomplete)?;
        let verifier = pkcs1v15::VerifyingKey::<Sha384>::new(service.key().clone());
        let sig = pkcs1v15::Signature::try_from(self.service_sig.as_slice())
            .map_err(|_| Rejection::ServiceSignature)?;
        verifier
            .verify(&service_scope(self), &sig)
            .map_err(|_| Rejection::ServiceSignature)
    }

    /// # Errors
    ///
    /// `Rejection::QuorumTag` if `tags` refuses the record's `rng`.
    pub fn verify_rng<Q: QuorumTagVerifier + ?Sized>(&self, tags: &Q) -> Result<(), Rejection> {
        if tags.accepts(self.rng) {
            Ok(())
        } else {
            Err(Rejection::QuorumTag { rng: self.rng })
        }
    }

    /// # Errors
    ///
    /// `Rejection::Subdomains` naming the first broken rule.
    pub fn verify_subdomains(&self) -> Result<(), Rejection> {
        check_subdomains(&self.name, &self.subdomains).map_err(Rejection::Subdomains)
    }

    /// # Errors
    ///
    /// `Rejection::Strings` naming the first broken rule.
    pub fn verify_strings(&self) -> Result<(), Rejection> {
        check_strings(&self.kind, &self.name, &self.contact).map_err(Rejection::Strings)
    }
}

fn verify_service_key(service: &ServiceKey) -> Result<(), Rejection> {
    let bits = service.bits();
    if bits == SERVICE_KEY_BITS {
        Ok(())
    } else {
        Err(Rejection::ServiceKeyShape { bits })
    }
}

fn check_subdomains(name: &str, subdomains: &[Subdomain]) -> Result<(), PolicyViolation> {
    if subdomains.len() > MAX_SUBDOMAINS {
        return Err(PolicyViolation::TooManySubdomains {
            count: subdomains.len(),
            max: MAX_SUBDOMAINS,
        });
    }
    for (i, sub) in subdomains.iter().enumerate() {
        let label = || sub.label.clone();
        if sub.label.is_empty() || sub.label.len() > MAX_SUBDOMAIN_LABEL_LEN {
            return Err(PolicyViolation::LabelLength { label: label(), max: MAX_SUBDOMAIN_LABEL_LEN });
        }
        if sub.destination.is_empty() || sub.destination.len() > MAX_DESTINATION_LEN {
            return Err(PolicyViolation::DestinationLength { label: label(), max: MAX_DESTINATION_LEN });
        }
        if sub.label.ends_with(name) {
            return Err(PolicyViolation::LabelContainsName { label: label() });
        }
        if !(sub.destination.ends_with(TOR_SUFFIX) || sub.destination.ends_with(ONION_SUFFIX)) {
            return Err(PolicyViolation::DestinationOutsideTor { label: label() });
        }
        if subdomains[..i].iter().any(|prev| prev.label == sub.label) {
            return Err(PolicyViolation::DuplicateLabel { label: label() });
        }
    }
    Ok(())
}

fn check_strings(kind: &RecordType, name: &str, contact: &str) -> Result<(), PolicyViolation> {
    if name.len() > MAX_NAME_LEN {
        return Err(PolicyViolation::NameTooLong { len: name.len(), max: MAX_NAME_LEN });
    }
    let label = name.strip_suffix(TOR_SUFFIX).ok_or(PolicyViolation::NameSuffix)?;
    if label.len() < MIN_NAME_LABEL_LEN {
        return Err(PolicyViolation::NameLabelTooShort { len: label.len(), min: MIN_NAME_LABEL_LEN });
    }
    if contact.len() > MAX_CONTACT_LEN {
        return Err(PolicyViolation::ContactTooLong { len: contact.len(), max: MAX_CONTACT_LEN });
    }
    if !kind.is_recognized() {
        return Err(PolicyViolation::UnknownType(kind.as_str().to_owned()));
    }
    Ok(())
}

fn hex_prefix(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(8)])
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} -> {}",
            self.kind,
            self.name,
            self.onion_address().unwrap_or("(no service key)")
        )?;
        for sub in &self.subdomains {
            writeln!(f, "    {}.{} -> {}.{}", sub.label, self.name, sub.destination, self.name)?;
        }
        if !self.contact.is_empty() {
            writeln!(f, "  contact: {}", self.contact)?;
        }
        writeln!(f, "  identity key: {}..", hex_prefix(&self.master_key))?;
        writeln!(f, "  nonce: {}  quorum tag: {}", self.nonce, self.rng)?;
        write!(f, "  id: {}..", hex_prefix(&self.hash()))
    }
}
