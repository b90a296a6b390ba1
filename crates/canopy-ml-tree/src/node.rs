use canopy_ml_core::Float;
use serde::{Deserialize, Serialize};

/// Arena index of a node within its tree.
pub type NodeId = usize;

/// One decision point or leaf in a fitted tree.
///
/// Immutable once the growing call that created it returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Node<T: Float> {
    pub depth: usize,
    pub n_samples: usize,
    pub impurity: T,
    pub kind: NodeKind<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub enum NodeKind<T: Float> {
    /// Internal node: rows with `x[:, feature_index] < threshold` go left.
    Split {
        feature_index: usize,
        threshold: T,
        left: NodeId,
        right: NodeId,
    },
    /// Terminal node. `leaf_id`s are dense `0..n_leaves` in finalize order;
    /// `value` holds class frequencies, per-output means, or a Newton step.
    Leaf { leaf_id: usize, value: Vec<T> },
}

impl<T: Float> Node<T> {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}
