//! Network parameters shared by every party that mines or validates records.
//!
//! Loading the document from disk belongs to the process entry point; this
//! module only defines the values and their ranges.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, PrimitiveError};
use crate::types::{MAX_DIFFICULTY, SCRYPTED_LEN};

/// Cost of the memory-hard step. RAM load is `O(128 * r * 2^log_n)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScryptCost {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for ScryptCost {
    fn default() -> Self {
        Self { log_n: 14, r: 8, p: 1 }
    }
}

impl ScryptCost {
    /// Build the scrypt parameter set, producing `SCRYPTED_LEN` output bytes.
    ///
    /// # Errors
    ///
    /// `ScryptParams` when the scrypt crate refuses the cost.
    pub fn params(&self) -> Result<scrypt::Params, PrimitiveError> {
        scrypt::Params::new(self.log_n, self.r, self.p, SCRYPTED_LEN).map_err(|_| {
            PrimitiveError::ScryptParams {
                log_n: self.log_n,
                r: self.r,
                p: self.p,
            }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Acceptance threshold is `u64::MAX >> difficulty`.
    pub difficulty: u8,
    pub scrypt: ScryptCost,
    /// Default number of mining threads.
    pub workers: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: 7,
            scrypt: ScryptCost::default(),
            workers: 1,
        }
    }
}

impl Config {
    /// Parse a JSON config document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `Decode` for malformed JSON, otherwise as [`Config::validate`].
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ConfigError::Decode(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// `Difficulty` above 63, `Workers` for zero workers, `Scrypt` for an
    /// unusable cost.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Difficulty {
                difficulty: self.difficulty,
                max: MAX_DIFFICULTY,
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Workers);
        }
        self.scrypt.params()?;
        Ok(())
    }

    #[must_use]
    pub const fn threshold(&self) -> u64 {
        pow_threshold(self.difficulty)
    }
}

/// `MAX / 2^difficulty`, saturating to zero past the width of the value.
#[must_use]
pub const fn pow_threshold(difficulty: u8) -> u64 {
    match u64::MAX.checked_shr(difficulty as u32) {
        Some(t) => t,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.threshold(), u64::MAX >> 7);
    }

    #[test]
    fn difficulty_zero_accepts_everything() {
        assert_eq!(pow_threshold(0), u64::MAX);
        assert_eq!(pow_threshold(63), 1);
        assert_eq!(pow_threshold(64), 0);
    }

    #[test]
    fn out_of_range_difficulty_rejected() {
        let cfg = Config {
            difficulty: 64,
            ..Config::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Difficulty { difficulty: 64, max: 63 })
        );
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = Config {
            workers: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Workers));
    }

    #[test]
    fn bad_scrypt_cost_rejected() {
        let cfg = Config {
            scrypt: ScryptCost { log_n: 40, r: 1, p: 1 },
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Scrypt(_))));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg = Config::from_json_str(r#"{"difficulty": 3, "scrypt": {"log_n": 4}}"#)
            .expect("config");
        assert_eq!(cfg.difficulty, 3);
        assert_eq!(cfg.scrypt, ScryptCost { log_n: 4, r: 8, p: 1 });
        assert_eq!(cfg.workers, 1);
        assert!(Config::from_json_str("not json").is_err());
    }
}
