use crate::constants::{ONION_LABEL_LEN, ONION_SUFFIX};
use crate::sha1;
use data_encoding::BASE32;

/// Derive the onion address Tor assigns to an RSA service key.
///
/// `pkcs1_der` is the DER encoding of the ASN.1 `RSAPublicKey` (PKCS#1), which is
/// what tor-spec calls "the hash of a public key":
/// `lower(base32(SHA-1(der)))[..16] || ".onion"`.
#[must_use]
pub fn onion_address(pkcs1_der: &[u8]) -> String {
    let digest = sha1(pkcs1_der);
    let mut addr = BASE32.encode(&digest).to_ascii_lowercase();
    addr.truncate(ONION_LABEL_LEN);
    addr.push_str(ONION_SUFFIX);
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_sixteen_lowercase_base32_chars() {
        let addr = onion_address(b"not really a key");
        assert_eq!(addr.len(), ONION_LABEL_LEN + ONION_SUFFIX.len());
        assert!(addr.ends_with(".onion"));
        assert!(addr[..ONION_LABEL_LEN]
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c)));
    }
}
