#![allow(dead_code)]

use std::sync::OnceLock;

use onions_core::{Config, Record, RecordKeys, RecordType, ScryptCost, Subdomain};
use rand_core::OsRng;

/// scrypt small enough for a test loop; r = 1 keeps 2^log_n under 2^(16 r).
pub const CHEAP_SCRYPT: ScryptCost = ScryptCost { log_n: 4, r: 1, p: 1 };

pub fn cheap(difficulty: u8) -> Config {
    Config { difficulty, scrypt: CHEAP_SCRYPT, workers: 1 }
}

pub fn keys() -> &'static RecordKeys {
    static KEYS: OnceLock<RecordKeys> = OnceLock::new();
    KEYS.get_or_init(|| RecordKeys::generate(&mut OsRng).expect("key generation"))
}

pub fn other_keys() -> &'static RecordKeys {
    static KEYS: OnceLock<RecordKeys> = OnceLock::new();
    KEYS.get_or_init(|| RecordKeys::generate(&mut OsRng).expect("key generation"))
}

pub fn draft(name: &str, subdomains: Vec<Subdomain>) -> Record {
    let mut r = Record::new_draft(RecordType::Record, name, "AD97364FC20BEC80", subdomains, 7, 0);
    r.assign_keys(keys()).expect("assign keys");
    r
}

pub fn mined(name: &str, subdomains: Vec<Subdomain>) -> Record {
    let mut r = draft(name, subdomains);
    r.make_valid(keys(), &cheap(4), 2).expect("mining");
    r
}
