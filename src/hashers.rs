use onions_primitives::{constants::POW_SALT, sha256, sha256_parts, u64_from_be, Hash256};

use crate::{config::ScryptCost, errors::PrimitiveError, types::SCRYPTED_LEN};

/// Record ID = SHA-256( canonical bytes with signatures )
#[must_use]
pub fn record_hash(canonical: &[u8]) -> Hash256 {
    sha256(canonical)
}

/// S = scrypt( scope, salt = pi, N = 2^log_n, r, p, len = 16 )
///
/// # Errors
///
/// `Scrypt` if `params` do not produce a 16-byte output.
pub fn scrypt_digest(scope: &[u8], params: &scrypt::Params) -> Result<[u8; SCRYPTED_LEN], PrimitiveError> {
    let mut out = [0u8; SCRYPTED_LEN];
    scrypt::scrypt(scope, &POW_SALT, params, &mut out)
        .map_err(|_| PrimitiveError::Scrypt("invalid output length"))?;
    Ok(out)
}

/// PoW = BE64( SHA-256( scope || S )[0..8] )
///
/// # Errors
///
/// As [`scrypt_digest`].
pub fn pow_value_with(scope: &[u8], params: &scrypt::Params) -> Result<u64, PrimitiveError> {
    let scrypted = scrypt_digest(scope, params)?;
    let digest = sha256_parts(&[scope, &scrypted]);
    Ok(u64_from_be(&digest[..8]))
}

/// # Errors
///
/// `ScryptParams` for an unusable cost, otherwise as [`scrypt_digest`].
pub fn pow_value(scope: &[u8], cost: &ScryptCost) -> Result<u64, PrimitiveError> {
    pow_value_with(scope, &cost.params()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: ScryptCost = ScryptCost { log_n: 4, r: 1, p: 1 };

    #[test]
    fn pow_is_deterministic_and_scope_sensitive() {
        let a = pow_value(b"scope", &CHEAP).expect("pow");
        assert_eq!(a, pow_value(b"scope", &CHEAP).expect("pow"));
        assert_ne!(a, pow_value(b"scopf", &CHEAP).expect("pow"));
    }

    #[test]
    fn cost_changes_the_value() {
        let cheap = pow_value(b"scope", &CHEAP).expect("pow");
        let dearer = pow_value(b"scope", &ScryptCost { log_n: 5, r: 1, p: 1 }).expect("pow");
        assert_ne!(cheap, dearer);
    }

    #[test]
    fn invalid_cost_is_a_primitive_error() {
        let err = pow_value(b"scope", &ScryptCost { log_n: 16, r: 1, p: 1 }).unwrap_err();
        assert!(matches!(err, PrimitiveError::ScryptParams { log_n: 16, .. }));
    }
}
