//! `{type, value}` messages, one JSON object per line.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SYN: &str = "SYN";
pub const SUCCESS: &str = "success";
pub const ACK: &str = "ACK";
pub const ERROR: &str = "error";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("stream I/O: {0}")]
    Io(#[from] io::Error),

    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self { kind: kind.into(), value: value.into() }
    }

    /// Liveness probe; a peer answers with [`Envelope::ack`].
    #[must_use]
    pub fn syn() -> Self {
        Self::new(SYN, "")
    }

    #[must_use]
    pub fn ack() -> Self {
        Self::new(SUCCESS, ACK)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR, message)
    }

    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.kind == SUCCESS && self.value == ACK
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == ERROR
    }
}

/// Write `env` as one line and flush.
pub fn write_envelope<W: Write + ?Sized>(w: &mut W, env: &Envelope) -> Result<(), EnvelopeError> {
    let mut line = serde_json::to_vec(env)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.flush()?;
    Ok(())
}

/// Read the next envelope, or `None` at end of stream.
pub fn read_envelope<R: BufRead + ?Sized>(r: &mut R) -> Result<Option<Envelope>, EnvelopeError> {
    let mut line = String::new();
    if r.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}
