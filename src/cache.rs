//! The set of admitted records, kept sorted by name.
//!
//! This is the snapshot a quorum commits to: every entry has passed the
//! validity pipeline and no two entries share a name, so the slice can be
//! handed straight to [`MerkleTree::build`].

use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::CacheError;
use crate::merkle::MerkleTree;
use crate::record::Record;

#[derive(Clone, Debug)]
pub struct RecordCache {
    config: Config,
    records: Vec<Record>,
}

impl RecordCache {
    /// Empty cache that admits records valid under `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, records: Vec::new() }
    }

    /// Admit one record.
    ///
    /// # Errors
    ///
    /// `Duplicate` if the name is already taken, `Invalid` if the record
    /// fails [`Record::check_validity`]. The cache is unchanged on error.
    pub fn add(&mut self, record: Record) -> Result<(), CacheError> {
        let slot = match self.position(&record.name) {
            Ok(_) => {
                warn!(name = %record.name, "duplicate name refused");
                return Err(CacheError::Duplicate { name: record.name });
            }
            Err(slot) => slot,
        };
        if let Err(reason) = record.check_validity(&self.config) {
            warn!(name = %record.name, %reason, "record refused");
            return Err(CacheError::Invalid { name: record.name, reason });
        }
        debug!(name = %record.name, cached = self.records.len() + 1, "record admitted");
        self.records.insert(slot, record);
        Ok(())
    }

    /// Admit every acceptable record of a batch; returns the refusals.
    pub fn add_all(&mut self, batch: impl IntoIterator<Item = Record>) -> Vec<CacheError> {
        batch.into_iter().filter_map(|r| self.add(r).err()).collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Record> {
        self.position(name).ok().map(|i| &self.records[i])
    }

    /// Admitted records, strictly sorted by name.
    #[must_use]
    pub fn sorted(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn tree(&self) -> MerkleTree {
        MerkleTree::build(&self.records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.records.binary_search_by(|r| r.name.as_str().cmp(name))
    }
}
