#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! OnioNS IPC - the narrow edges the core talks to
//!
//! `control` speaks just enough of Tor's line-oriented control protocol to
//! authenticate, wait for bootstrap and read or write a setting. `envelope`
//! frames the `{type, value}` JSON messages exchanged with other nodes over an
//! already-established stream. Neither owns connection lifecycle.

pub mod control;
pub mod envelope;

pub use control::{
    read_reply, Command, ControlError, ControlPort, ControlSession, Credential, Reply, TcpDuplex,
};
pub use envelope::{read_envelope, write_envelope, Envelope, EnvelopeError};
