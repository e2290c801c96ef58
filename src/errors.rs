use thiserror::Error;

/// A specific string or subdomain rule a record broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("name is {len} bytes, must be at most {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("name label is {len} bytes, must be at least {min}")]
    NameLabelTooShort { len: usize, min: usize },

    #[error("name does not end in \".tor\"")]
    NameSuffix,

    #[error("contact is {len} bytes, must be at most {max}")]
    ContactTooLong { len: usize, max: usize },

    #[error("unknown record type {0:?}")]
    UnknownType(String),

    #[error("{count} subdomains, at most {max} allowed")]
    TooManySubdomains { count: usize, max: usize },

    #[error("subdomain label {label:?} must be 1..={max} bytes")]
    LabelLength { label: String, max: usize },

    #[error("subdomain destination for {label:?} must be 1..={max} bytes")]
    DestinationLength { label: String, max: usize },

    #[error("subdomain label {label:?} contains the record name")]
    LabelContainsName { label: String },

    #[error("subdomain label {label:?} appears more than once")]
    DuplicateLabel { label: String },

    #[error("subdomain {label:?} points outside Tor")]
    DestinationOutsideTor { label: String },
}

/// Why a record failed validity. Never carries signature bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("record is incomplete: no service key")]
    Incomplete,

    #[error("proof-of-work {value:#018x} above threshold {threshold:#018x}")]
    ProofOfWork { value: u64, threshold: u64 },

    #[error("bad identity signature")]
    IdentitySignature,

    #[error("service key is {bits}-bit, expected 1024-bit RSA")]
    ServiceKeyShape { bits: usize },

    #[error("bad service signature")]
    ServiceSignature,

    #[error("quorum tag {rng} not accepted")]
    QuorumTag { rng: u32 },

    #[error("subdomain policy: {0}")]
    Subdomains(PolicyViolation),

    #[error("string policy: {0}")]
    Strings(PolicyViolation),
}

/// A primitive could not run at all. Distinct from "the record is invalid":
/// this points at configuration or a library mismatch, not the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    #[error("invalid scrypt parameters: log_n={log_n} r={r} p={p}")]
    ScryptParams { log_n: u8, r: u32, p: u32 },

    #[error("scrypt failed: {0}")]
    Scrypt(&'static str),

    #[error("key encoding failed: {0}")]
    KeyEncoding(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidityError {
    #[error("record rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("cannot evaluate record: {0}")]
    Primitive(#[from] PrimitiveError),
}

#[derive(Debug, Error)]
pub enum MiningError {
    #[error("at least one worker is required")]
    NoWorkers,

    #[error("record is missing its service key")]
    Incomplete,

    #[error("signing keys do not match the record's public keys")]
    KeyMismatch,

    #[error("nonce space exhausted by {workers} workers; difficulty too high")]
    Exhausted { workers: u8 },

    #[error("a mining worker panicked")]
    WorkerPanicked,

    #[error("mining aborted: {0}")]
    Primitive(#[from] PrimitiveError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("record is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("difficulty {difficulty} out of range [0, {max}]")]
    Difficulty { difficulty: u8, max: u8 },

    #[error(transparent)]
    Scrypt(#[from] PrimitiveError),

    #[error("worker count must be at least 1")]
    Workers,

    #[error("config is not valid JSON: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("recomputed root does not match the published root")]
    RootMismatch,

    #[error("empty-tree proof offered against a non-empty root")]
    EmptyRootMismatch,

    #[error("proof is for {proved:?}, query was {query:?}")]
    NameMismatch { proved: String, query: String },

    #[error("record does not match the proved leaf")]
    RecordMismatch,

    #[error("absence proof carries no bounding leaf")]
    MissingBound,

    #[error("bounding leaves do not bracket the query")]
    NotBracketing,

    #[error("bounding leaves {left} and {right} are not adjacent")]
    NotAdjacent { left: u64, right: u64 },

    #[error("lower bound missing but upper bound is not the first leaf")]
    NotLeftmost,

    #[error("upper bound missing but lower bound is not the last leaf")]
    NotRightmost,

    #[error("bounding paths disagree on their shared ancestors")]
    SharedAncestorMismatch,

    #[error("path is too deep: {0} steps")]
    PathTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("a record for {name:?} is already cached")]
    Duplicate { name: String },

    #[error("record for {name:?} not admitted: {reason}")]
    Invalid { name: String, reason: ValidityError },
}
