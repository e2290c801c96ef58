#![forbid(unsafe_code)]

pub const SHA256_LEN: usize = 32;
pub const SHA1_LEN: usize = 20;

/// Characters of the base32 digest kept in a v2 onion address.
pub const ONION_LABEL_LEN: usize = 16;
pub const ONION_SUFFIX: &str = ".onion";

/// Salt fed to scrypt for proof-of-work: the first 16 bytes of pi in hex.
pub const POW_SALT: [u8; 16] = [
    0x24, 0x3F, 0x6A, 0x88, 0x85, 0xA3, 0x08, 0xD3, 0x13, 0x19, 0x8A, 0x2E, 0x03, 0x70, 0x73, 0x44,
];
