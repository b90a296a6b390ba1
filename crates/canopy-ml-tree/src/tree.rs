use crate::node::{Node, NodeId, NodeKind};

use canopy_ml_core::error::TensorResult;
use canopy_ml_core::{Float, Tensor};
use serde::{Deserialize, Serialize};

/// A fitted binary decision tree stored as a flat node arena.
///
/// The root is node 0. `leaf_nodes` is the leaf-value table: it maps each
/// dense `leaf_id` to the arena slot of the leaf that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tree<T: Float> {
    pub(crate) nodes: Vec<Node<T>>,
    pub(crate) leaf_nodes: Vec<NodeId>,
    pub(crate) feature_importances: Vec<T>,
    pub(crate) n_features: usize,
    pub(crate) n_outputs: usize,
}

impl<T: Float> Tree<T> {
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.leaf_nodes.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Depth of the deepest node.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id]
    }

    /// Normalized impurity-decrease credit per feature. All zeros when the
    /// tree is a single leaf.
    pub fn feature_importances(&self) -> &[T] {
        &self.feature_importances
    }

    /// Output vector of the leaf with the given `leaf_id`.
    pub fn leaf_value(&self, leaf_id: usize) -> Option<&[T]> {
        self.leaf_nodes.get(leaf_id).and_then(|&id| match &self.nodes[id].kind {
            NodeKind::Leaf { value, .. } => Some(value.as_slice()),
            NodeKind::Split { .. } => None,
        })
    }

    /// Route one row down the tree. `x` must carry `n_features` columns.
    fn walk(&self, x: &Tensor<T>, row: usize) -> (usize, &[T]) {
        let data = x.data();
        let mut id: NodeId = 0;
        loop {
            match &self.nodes[id].kind {
                NodeKind::Leaf { leaf_id, value } => return (*leaf_id, value),
                NodeKind::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let v = data[row * self.n_features + feature_index];
                    id = if v < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Leaf output vector for one row.
    pub fn predict_row(&self, x: &Tensor<T>, row: usize) -> &[T] {
        self.walk(x, row).1
    }

    /// Index of the largest leaf-output entry for one row; ties keep the
    /// first index.
    pub fn predict_index(&self, x: &Tensor<T>, row: usize) -> usize {
        let value = self.predict_row(x, row);
        let mut best = 0;
        for (i, &v) in value.iter().enumerate() {
            if v > value[best] {
                best = i;
            }
        }
        best
    }

    /// `leaf_id` reached by one row.
    pub fn apply_row(&self, x: &Tensor<T>, row: usize) -> usize {
        self.walk(x, row).0
    }

    /// `leaf_id` reached by every row.
    pub fn apply(&self, x: &Tensor<T>) -> Vec<usize> {
        let n = x.shape().dims()[0];
        (0..n).map(|row| self.apply_row(x, row)).collect()
    }

    /// Leaf outputs for every row as an `[n, n_outputs]` tensor.
    pub fn predict_matrix(&self, x: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let n = x.shape().dims()[0];
        let mut flat = Vec::with_capacity(n * self.n_outputs);
        for row in 0..n {
            flat.extend_from_slice(self.predict_row(x, row));
        }
        Tensor::new(flat, vec![n, self.n_outputs])
    }
}
