//! Binary SHA-256 Merkle tree over a sorted snapshot of valid records.
//!
//! Nodes live in one arena and refer to each other by [`NodeId`]. Leaves sit
//! at a single depth: every level pairs its nodes left to right and a trailing
//! unpaired node is paired with itself. A tree is never modified after it is
//! built.
//!
//! Proof verification is a pure function of the published root, the proof and
//! the query, so any peer can check a proof without the tree.

use onions_primitives::{ct_eq_hash, empty_root, merkle_leaf, merkle_node};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ProofError;
use crate::record::Record;
use crate::types::Hash256;
use crate::wire::hash_b64;

/// Longest path a verifier will walk; also bounds leaf positions to `u64`.
pub const MAX_PROOF_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub hash: Hash256,
    pub parent: Option<NodeId>,
    /// `None` for leaves. For a self-paired node both children are equal.
    pub children: Option<(NodeId, NodeId)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub name: String,
    pub record_hash: Hash256,
    pub node: NodeId,
}

#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
    root: Option<NodeId>,
}

/// Which side of the running hash the sibling goes on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    #[serde(with = "hash_b64")]
    pub sibling: Hash256,
    pub side: Side,
}

/// A leaf and its authentication path, bottom-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub name: String,
    #[serde(rename = "recordHash", with = "hash_b64")]
    pub record_hash: Hash256,
    pub path: Vec<PathStep>,
}

/// The sorted neighbours a missing name would sit between.
///
/// A name below the first leaf has only `right`; above the last, only `left`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceProof {
    pub left: Option<InclusionProof>,
    pub right: Option<InclusionProof>,
    /// Ancestors common to both bounds, root included; 0 with one bound.
    #[serde(rename = "sharedAncestors")]
    pub shared_ancestors: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MerkleProof {
    /// The tree holds no records.
    Empty,
    Inclusion(InclusionProof),
    Absence(AbsenceProof),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofOutcome {
    Present,
    Absent,
    NoRecords,
}

impl MerkleTree {
    /// Tree over `records`, which must already be validated and sorted by name.
    #[must_use]
    pub fn build(records: &[Record]) -> Self {
        Self::from_leaves(records.iter().map(|r| (r.name.clone(), r.hash())).collect())
    }

    /// Tree over `(name, record_hash)` pairs, strictly sorted by name.
    #[must_use]
    pub fn from_leaves(leaves: Vec<(String, Hash256)>) -> Self {
        debug_assert!(
            leaves.windows(2).all(|w| w[0].0 < w[1].0),
            "leaves must be strictly sorted by name"
        );
        let mut nodes = Vec::with_capacity(leaves.len().saturating_mul(2));
        let leaves: Vec<Leaf> = leaves
            .into_iter()
            .map(|(name, record_hash)| {
                let node = NodeId(nodes.len());
                nodes.push(Node {
                    hash: merkle_leaf(&name, &record_hash),
                    parent: None,
                    children: None,
                });
                Leaf { name, record_hash, node }
            })
            .collect();

        let mut level: Vec<NodeId> = leaves.iter().map(|l| l.node).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let parent = NodeId(nodes.len());
                let hash = merkle_node(&nodes[left.0].hash, &nodes[right.0].hash);
                nodes.push(Node {
                    hash,
                    parent: None,
                    children: Some((left, right)),
                });
                nodes[left.0].parent = Some(parent);
                nodes[right.0].parent = Some(parent);
                next.push(parent);
            }
            level = next;
        }

        let tree = Self { root: level.first().copied(), nodes, leaves };
        info!(leaves = tree.leaves.len(), nodes = tree.nodes.len(), "built Merkle tree");
        tree
    }

    #[must_use]
    pub fn root(&self) -> Hash256 {
        self.root.map_or_else(empty_root, |id| self.nodes[id.0].hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    #[must_use]
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn inclusion(&self, leaf: &Leaf) -> InclusionProof {
        let mut path = Vec::new();
        let mut current = leaf.node;
        while let Some(parent) = self.nodes[current.0].parent {
            if let Some((left, right)) = self.nodes[parent.0].children {
                let step = if left == current {
                    PathStep { sibling: self.nodes[right.0].hash, side: Side::Right }
                } else {
                    PathStep { sibling: self.nodes[left.0].hash, side: Side::Left }
                };
                path.push(step);
            }
            current = parent;
        }
        InclusionProof {
            name: leaf.name.clone(),
            record_hash: leaf.record_hash,
            path,
        }
    }

    /// Ancestors shared by two leaves, counted down from the root.
    fn shared_ancestors(&self, a: NodeId, b: NodeId) -> usize {
        let chain = |mut id: NodeId| {
            let mut up = Vec::new();
            while let Some(p) = self.nodes[id.0].parent {
                up.push(p);
                id = p;
            }
            up
        };
        let (a, b) = (chain(a), chain(b));
        a.iter()
            .rev()
            .zip(b.iter().rev())
            .take_while(|(x, y)| x == y)
            .count()
    }

    /// Inclusion proof when `name` is a leaf, otherwise an absence proof from
    /// its sorted neighbours.
    #[must_use]
    pub fn proof_for(&self, name: &str) -> MerkleProof {
        if self.leaves.is_empty() {
            return MerkleProof::Empty;
        }
        let pos = self.leaves.partition_point(|l| l.name.as_str() < name);
        if let Some(leaf) = self.leaves.get(pos).filter(|l| l.name == name) {
            debug!(name, position = pos, "inclusion proof");
            return MerkleProof::Inclusion(self.inclusion(leaf));
        }
        let left = pos.checked_sub(1).and_then(|i| self.leaves.get(i));
        let right = self.leaves.get(pos);
        let shared_ancestors = match (left, right) {
            (Some(l), Some(r)) => self.shared_ancestors(l.node, r.node),
            _ => 0,
        };
        debug!(name, position = pos, shared_ancestors, "absence proof");
        MerkleProof::Absence(AbsenceProof {
            left: left.map(|l| self.inclusion(l)),
            right: right.map(|r| self.inclusion(r)),
            shared_ancestors,
        })
    }
}

/// A bound recomputed from its proof alone.
struct Walk {
    root: Hash256,
    index: u64,
    ancestors: Vec<Hash256>,
    rightmost: bool,
}

fn walk(proof: &InclusionProof) -> Result<Walk, ProofError> {
    if proof.path.len() > MAX_PROOF_DEPTH {
        return Err(ProofError::PathTooLong(proof.path.len()));
    }
    let mut acc = merkle_leaf(&proof.name, &proof.record_hash);
    let mut index = 0u64;
    let mut rightmost = true;
    let mut ancestors = Vec::with_capacity(proof.path.len());
    for (height, step) in proof.path.iter().enumerate() {
        acc = match step.side {
            Side::Right => {
                // only a self-paired node has itself as its right sibling
                rightmost &= step.sibling == acc;
                merkle_node(&acc, &step.sibling)
            }
            Side::Left => {
                index |= 1u64 << height;
                merkle_node(&step.sibling, &acc)
            }
        };
        ancestors.push(acc);
    }
    Ok(Walk { root: acc, index, ancestors, rightmost })
}

fn walk_to(root: &Hash256, proof: &InclusionProof) -> Result<Walk, ProofError> {
    let w = walk(proof)?;
    if ct_eq_hash(&w.root, root) {
        Ok(w)
    } else {
        Err(ProofError::RootMismatch)
    }
}

fn check_shared(left: &Walk, right: &Walk, claimed: usize) -> Result<(), ProofError> {
    let depth = left.ancestors.len();
    if right.ancestors.len() != depth || claimed == 0 || claimed > depth {
        return Err(ProofError::SharedAncestorMismatch);
    }
    // lowest common ancestor height from the two positions
    let lca = (1..=depth)
        .find(|&h| u128::from(left.index) >> h == u128::from(right.index) >> h)
        .unwrap_or(depth);
    if claimed != depth - lca + 1 {
        return Err(ProofError::SharedAncestorMismatch);
    }
    let tail = depth - claimed;
    if left.ancestors[tail..] != right.ancestors[tail..] {
        return Err(ProofError::SharedAncestorMismatch);
    }
    Ok(())
}

/// Check `proof` for `query` against a published `root`.
///
/// With `record`, an inclusion proof must also commit to that exact record.
///
/// # Errors
///
/// Returns the first `ProofError` found; a proof that fails never yields an
/// outcome.
pub fn verify_proof(
    root: &Hash256,
    proof: &MerkleProof,
    query: &str,
    record: Option<&Record>,
) -> Result<ProofOutcome, ProofError> {
    match proof {
        MerkleProof::Empty => {
            if ct_eq_hash(root, &empty_root()) {
                Ok(ProofOutcome::NoRecords)
            } else {
                Err(ProofError::EmptyRootMismatch)
            }
        }
        MerkleProof::Inclusion(p) => {
            if p.name != query {
                return Err(ProofError::NameMismatch {
                    proved: p.name.clone(),
                    query: query.to_owned(),
                });
            }
            if let Some(r) = record {
                if r.name != p.name || r.hash() != p.record_hash {
                    return Err(ProofError::RecordMismatch);
                }
            }
            walk_to(root, p)?;
            Ok(ProofOutcome::Present)
        }
        MerkleProof::Absence(a) => {
            let left = a.left.as_ref().map(|p| walk_to(root, p)).transpose()?;
            let right = a.right.as_ref().map(|p| walk_to(root, p)).transpose()?;
            if let Some(p) = &a.left {
                if p.name.as_str() >= query {
                    return Err(ProofError::NotBracketing);
                }
            }
            if let Some(p) = &a.right {
                if p.name.as_str() <= query {
                    return Err(ProofError::NotBracketing);
                }
            }
            match (left, right) {
                (None, None) => Err(ProofError::MissingBound),
                (Some(l), None) if !l.rightmost => Err(ProofError::NotRightmost),
                (None, Some(r)) if r.index != 0 => Err(ProofError::NotLeftmost),
                (Some(l), Some(r)) => {
                    if l.index.checked_add(1) != Some(r.index) {
                        return Err(ProofError::NotAdjacent { left: l.index, right: r.index });
                    }
                    check_shared(&l, &r, a.shared_ancestors)?;
                    Ok(ProofOutcome::Absent)
                }
                _ => Ok(ProofOutcome::Absent),
            }
        }
    }
}

/// Whether every path in `proof` recomputes `root`. Says nothing about which
/// name the proof answers.
#[must_use]
pub fn verify_root(root: &Hash256, proof: &MerkleProof) -> bool {
    let reaches = |p: &InclusionProof| walk_to(root, p).is_ok();
    match proof {
        MerkleProof::Empty => ct_eq_hash(root, &empty_root()),
        MerkleProof::Inclusion(p) => reaches(p),
        MerkleProof::Absence(a) => {
            (a.left.is_some() || a.right.is_some())
                && a.left.as_ref().map_or(true, reaches)
                && a.right.as_ref().map_or(true, reaches)
        }
    }
}
