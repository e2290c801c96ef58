//! Parallel proof-of-work search.
//!
//! Worker `w` of `W` owns the residue class `w (mod W)` of the nonce's
//! low-order byte, so the workers cover the nonce space exactly once between
//! them. The only shared state is the abort flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, info, Dispatch};

use crate::config::Config;
use crate::errors::{MiningError, PrimitiveError};
use crate::hashers::pow_value_with;
use crate::record::{Record, RecordKeys};
use crate::ser::service_scope;
use crate::types::NONCE_LEN;

/// Little-endian byte odometer over one worker's share of an `N`-byte nonce.
#[derive(Clone, Debug)]
pub struct NonceOdometer<const N: usize> {
    bytes: [u8; N],
    start: u8,
    stride: u8,
    exhausted: bool,
}

impl<const N: usize> NonceOdometer<N> {
    /// Odometer for worker `worker` (0-based) of `workers`.
    ///
    /// A worker index outside `0..workers`, or zero workers, yields an empty
    /// sequence.
    #[must_use]
    pub fn new(worker: u8, workers: u8) -> Self {
        let mut bytes = [0u8; N];
        let exhausted = N == 0 || workers == 0 || worker >= workers;
        if !exhausted {
            bytes[0] = worker;
        }
        Self { bytes, start: worker, stride: workers, exhausted }
    }

    fn step(&mut self) {
        match self.bytes[0].checked_add(self.stride) {
            Some(low) => {
                self.bytes[0] = low;
                return;
            }
            None => self.bytes[0] = self.start,
        }
        for byte in &mut self.bytes[1..] {
            let (next, carry) = byte.overflowing_add(1);
            *byte = next;
            if !carry {
                return;
            }
        }
        self.exhausted = true;
    }
}

impl<const N: usize> Iterator for NonceOdometer<N> {
    type Item = [u8; N];

    fn next(&mut self) -> Option<[u8; N]> {
        if self.exhausted {
            return None;
        }
        let current = self.bytes;
        self.step();
        Some(current)
    }
}

/// The winning candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u32,
    pub pow: u64,
    pub worker: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    Success(Solution),
    NotFound,
    Aborted,
}

fn work<const N: usize>(
    mut scope: Vec<u8>,
    worker: u8,
    workers: u8,
    params: &scrypt::Params,
    threshold: u64,
    found: &AtomicBool,
) -> Result<WorkStatus, PrimitiveError> {
    let at = scope.len().saturating_sub(N);
    let mut tried = 0u64;

    for candidate in NonceOdometer::<N>::new(worker, workers) {
        if found.load(Ordering::Acquire) {
            debug!(worker, tried, "aborted");
            return Ok(WorkStatus::Aborted);
        }
        scope[at..].copy_from_slice(&candidate);
        let pow = match pow_value_with(&scope, params) {
            Ok(pow) => pow,
            Err(e) => {
                found.store(true, Ordering::Release);
                return Err(e);
            }
        };
        tried += 1;
        if pow <= threshold {
            if found
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Ok(WorkStatus::Aborted);
            }
            let mut nonce = [0u8; NONCE_LEN];
            let width = N.min(NONCE_LEN);
            nonce[..width].copy_from_slice(&candidate[..width]);
            let nonce = u32::from_le_bytes(nonce);
            return Ok(WorkStatus::Success(Solution { nonce, pow, worker }));
        }
    }
    debug!(worker, tried, "nonce range exhausted");
    Ok(WorkStatus::NotFound)
}

/// Run `workers` threads over the low `N` bytes of the nonce and collect
/// each worker's outcome in worker order.
fn search<const N: usize>(
    draft: &Record,
    params: &scrypt::Params,
    threshold: u64,
    workers: u8,
) -> Vec<Result<WorkStatus, MiningError>> {
    let found = AtomicBool::new(false);
    let dispatch = tracing::dispatcher::get_default(Dispatch::clone);

    thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let record = draft.clone();
                let (found, dispatch) = (&found, &dispatch);
                s.spawn(move || {
                    tracing::dispatcher::with_default(dispatch, || {
                        work::<N>(record.as_bytes(false), worker, workers, params, threshold, found)
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(status) => status.map_err(MiningError::from),
                Err(_) => Err(MiningError::WorkerPanicked),
            })
            .collect()
    })
}

/// The single winner, or `Exhausted` when every worker ran dry.
fn settle(outcomes: Vec<Result<WorkStatus, MiningError>>, workers: u8) -> Result<Solution, MiningError> {
    let mut winner = None;
    for outcome in outcomes {
        match outcome? {
            WorkStatus::Success(solution) => winner = Some(solution),
            WorkStatus::NotFound | WorkStatus::Aborted => {}
        }
    }
    winner.ok_or(MiningError::Exhausted { workers })
}

/// Search for a nonce whose proof-of-work meets `config`'s threshold.
///
/// `draft` is only read; each worker hashes its own copy of the canonical
/// bytes.
///
/// # Errors
///
/// `NoWorkers` for `workers == 0`, `Incomplete` without a service key,
/// `Config` for unusable parameters, `Primitive` if scrypt fails, and
/// `Exhausted` if no nonce in the whole space qualifies.
pub fn mine(draft: &Record, config: &Config, workers: u8) -> Result<Solution, MiningError> {
    if workers == 0 {
        return Err(MiningError::NoWorkers);
    }
    if !draft.is_complete() {
        return Err(MiningError::Incomplete);
    }
    config.validate()?;
    let params = config.scrypt.params()?;

    debug!(name = %draft.name, workers, difficulty = config.difficulty, "mining");
    let outcomes = search::<NONCE_LEN>(draft, &params, config.threshold(), workers);
    let solution = settle(outcomes, workers)?;
    info!(name = %draft.name, nonce = solution.nonce, worker = solution.worker, "proof-of-work found");
    Ok(solution)
}

impl Record {
    /// Mine a nonce, then sign the service scope and the identity scope.
    ///
    /// The record is mutated once, after every worker has been joined, and
    /// only on success.
    ///
    /// # Errors
    ///
    /// `KeyMismatch` if `keys` are not the record's keys; otherwise as [`mine`].
    pub fn make_valid(
        &mut self,
        keys: &RecordKeys,
        config: &Config,
        workers: u8,
    ) -> Result<Solution, MiningError> {
        let service = self.service_key.as_ref().ok_or(MiningError::Incomplete)?;
        if self.master_key != keys.master_public() || *service != keys.service_public()? {
            return Err(MiningError::KeyMismatch);
        }
        let solution = mine(self, config, workers)?;

        self.nonce = solution.nonce;
        self.service_sig = keys.sign_service(&service_scope(self))?;
        self.master_sig = keys.sign_master(&self.as_bytes(false));
        Ok(solution)
    }

    /// [`Record::make_valid`] with the worker count from `config`.
    ///
    /// # Errors
    ///
    /// As [`Record::make_valid`].
    pub fn make_valid_default(
        &mut self,
        keys: &RecordKeys,
        config: &Config,
    ) -> Result<Solution, MiningError> {
        self.make_valid(keys, config, config.workers)
    }
}
