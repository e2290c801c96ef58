use core::fmt;

pub use onions_primitives::{Hash256, Pk32, Sig64};

pub const TOR_SUFFIX: &str = ".tor";
pub use onions_primitives::constants::ONION_SUFFIX;

// Name policy: "<label>.tor", label at least 4 bytes, whole name at most 68 (64 + ".tor")
pub const MIN_NAME_LABEL_LEN: usize = 4;
pub const MAX_NAME_LEN: usize = 68;
pub const MAX_CONTACT_LEN: usize = 40; // hex PGP fingerprint

pub const MAX_SUBDOMAINS: usize = 32;
pub const MAX_SUBDOMAIN_LABEL_LEN: usize = 64;
pub const MAX_DESTINATION_LEN: usize = 64;

pub const SERVICE_KEY_BITS: usize = 1024;
pub const SERVICE_SIG_LEN: usize = SERVICE_KEY_BITS / 8; // 128
pub const MASTER_KEY_LEN: usize = 32;
pub const MASTER_SIG_LEN: usize = 64;

pub const NONCE_LEN: usize = 4;
pub const SCRYPTED_LEN: usize = 16;

/// Highest difficulty whose threshold is still non-zero.
pub const MAX_DIFFICULTY: u8 = 63;

/// RSA PKCS#1 v1.5 signature by a 1024-bit service key.
pub type ServiceSig = [u8; SERVICE_SIG_LEN];

/// Discriminates a fresh registration from a transfer of an existing name.
///
/// Anything else read off the wire is kept verbatim so it hashes and signs the
/// way its author produced it, and is then rejected by the string policy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum RecordType {
    #[default]
    Record,
    Ticket,
    Unrecognized(String),
}

impl RecordType {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "record" => Self::Record,
            "ticket" => Self::Ticket,
            other => Self::Unrecognized(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Record => "record",
            Self::Ticket => "ticket",
            Self::Unrecognized(s) => s,
        }
    }

    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `label -> destination` mapping; `label.name` resolves to `destination.name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subdomain {
    pub label: String,
    pub destination: String,
}

impl Subdomain {
    pub fn new(label: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            destination: destination.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_round_trips_through_str() {
        for s in ["record", "ticket", "Create"] {
            assert_eq!(RecordType::parse(s).as_str(), s);
        }
        assert!(!RecordType::parse("Create").is_recognized());
        assert!(RecordType::parse("ticket").is_recognized());
    }
}
