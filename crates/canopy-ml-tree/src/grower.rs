//! The shared tree grower.
//!
//! One growing call turns a sample matrix, a [`GrowTarget`] and a
//! [`GrowConfig`] into an arena-backed [`Tree`]. Growth is depth-first until
//! stopping conditions unless `max_leaf_nodes` bounds the leaf count, in
//! which case the frontier node with the largest pending gain is expanded
//! first (best-first growth).

use crate::node::{Node, NodeId, NodeKind};
use crate::split::{GrowTarget, SplitCandidate, SplitStrategy};
use crate::tree::Tree;

use canopy_ml_core::{Float, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Structural limits for one growing call.
#[derive(Debug, Clone)]
pub struct GrowConfig {
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Number of features evaluated per split search; `None` means all.
    pub max_features: Option<usize>,
    pub max_leaf_nodes: Option<usize>,
    pub strategy: SplitStrategy,
}

/// Grow a tree over the given sample indices.
///
/// `indices` may contain repeats (bootstrap or weighted resampling); each
/// occurrence counts separately in every node statistic. The caller owns the
/// RNG so one seed drives the whole fit reproducibly.
pub fn grow<T: Float>(
    x: &Tensor<T>,
    target: &GrowTarget<'_, T>,
    indices: Vec<usize>,
    config: &GrowConfig,
    rng: &mut StdRng,
) -> Tree<T> {
    let n_features = x.shape().dims()[1];
    let mut grower = Grower {
        x,
        target,
        config,
        rng,
        n_features,
        nodes: Vec::new(),
        leaf_nodes: Vec::new(),
        importances: vec![T::ZERO; n_features],
        feature_order: (0..n_features).collect(),
    };

    match config.max_leaf_nodes {
        None => grower.grow_depth_first(indices),
        Some(max_leaf_nodes) => grower.grow_best_first(indices, max_leaf_nodes),
    }

    let mut importances = grower.importances;
    if grower.leaf_nodes.len() > 1 {
        let total: T = importances.iter().copied().sum();
        if total > T::ZERO {
            for v in importances.iter_mut() {
                *v /= total;
            }
        }
    }

    Tree {
        nodes: grower.nodes,
        leaf_nodes: grower.leaf_nodes,
        feature_importances: importances,
        n_features,
        n_outputs: target.n_outputs(),
    }
}

enum Decision<T: Float> {
    Leaf,
    Split(SplitCandidate<T>),
}

/// Heap entry for best-first growth: a frontier node whose best split is
/// already known. Ordered by gain, ties by earliest creation.
struct Frontier<T: Float> {
    gain: T,
    seq: usize,
    slot: NodeId,
    indices: Vec<usize>,
    depth: usize,
    impurity: T,
    split: SplitCandidate<T>,
}

impl<T: Float> PartialEq for Frontier<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T: Float> Eq for Frontier<T> {}

impl<T: Float> PartialOrd for Frontier<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Float> Ord for Frontier<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .partial_cmp(&other.gain)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Grower<'a, T: Float> {
    x: &'a Tensor<T>,
    target: &'a GrowTarget<'a, T>,
    config: &'a GrowConfig,
    rng: &'a mut StdRng,
    n_features: usize,
    nodes: Vec<Node<T>>,
    leaf_nodes: Vec<NodeId>,
    importances: Vec<T>,
    feature_order: Vec<usize>,
}

impl<'a, T: Float> Grower<'a, T> {
    fn grow_depth_first(&mut self, indices: Vec<usize>) {
        let root = self.alloc();
        let mut stack = vec![(root, indices, 0usize)];
        while let Some((slot, indices, depth)) = stack.pop() {
            let impurity = self.target.node_impurity(&indices);
            match self.evaluate(&indices, depth, impurity) {
                Decision::Leaf => self.finalize_leaf(slot, &indices, depth, impurity),
                Decision::Split(split) => {
                    let (left_idx, right_idx) = self.partition(&indices, &split);
                    let (left, right) = self.record_split(slot, &indices, depth, impurity, &split);
                    // push right first so the left subtree is grown first
                    stack.push((right, right_idx, depth + 1));
                    stack.push((left, left_idx, depth + 1));
                }
            }
        }
    }

    fn grow_best_first(&mut self, indices: Vec<usize>, max_leaf_nodes: usize) {
        let mut splits_left = max_leaf_nodes.saturating_sub(1);
        let mut heap: BinaryHeap<Frontier<T>> = BinaryHeap::new();
        let mut seq = 0usize;

        let root = self.alloc();
        let may_split = splits_left > 0;
        self.offer(root, indices, 0, may_split, &mut heap, &mut seq);

        while splits_left > 0 {
            let Some(frontier) = heap.pop() else {
                break;
            };
            let (left_idx, right_idx) = self.partition(&frontier.indices, &frontier.split);
            let (left, right) = self.record_split(
                frontier.slot,
                &frontier.indices,
                frontier.depth,
                frontier.impurity,
                &frontier.split,
            );
            splits_left -= 1;
            let may_split = splits_left > 0;
            self.offer(left, left_idx, frontier.depth + 1, may_split, &mut heap, &mut seq);
            self.offer(right, right_idx, frontier.depth + 1, may_split, &mut heap, &mut seq);
        }

        // Leaf budget exhausted: pending frontier nodes become leaves in
        // creation order.
        let mut pending = heap.into_vec();
        pending.sort_by_key(|f| f.seq);
        for f in pending {
            self.finalize_leaf(f.slot, &f.indices, f.depth, f.impurity);
        }
    }

    /// Evaluate a node in best-first mode: finalize it as a leaf or place it
    /// on the frontier with its precomputed best split.
    fn offer(
        &mut self,
        slot: NodeId,
        indices: Vec<usize>,
        depth: usize,
        may_split: bool,
        heap: &mut BinaryHeap<Frontier<T>>,
        seq: &mut usize,
    ) {
        let impurity = self.target.node_impurity(&indices);
        if !may_split {
            self.finalize_leaf(slot, &indices, depth, impurity);
            return;
        }
        match self.evaluate(&indices, depth, impurity) {
            Decision::Leaf => self.finalize_leaf(slot, &indices, depth, impurity),
            Decision::Split(split) => {
                heap.push(Frontier {
                    gain: split.gain,
                    seq: *seq,
                    slot,
                    indices,
                    depth,
                    impurity,
                    split,
                });
                *seq += 1;
            }
        }
    }

    /// Decide whether a node splits and on what. Features are searched in a
    /// fresh random permutation, at most `max_features` of them; ties keep
    /// the first-encountered candidate.
    fn evaluate(&mut self, indices: &[usize], depth: usize, impurity: T) -> Decision<T> {
        let n = indices.len();
        if let Some(max_depth) = self.config.max_depth {
            if depth >= max_depth {
                return Decision::Leaf;
            }
        }
        if n < 2 * self.config.min_samples_leaf {
            return Decision::Leaf;
        }
        if self.target.purity_stop(impurity) {
            return Decision::Leaf;
        }

        self.feature_order.shuffle(self.rng);
        let n_search = self
            .config
            .max_features
            .unwrap_or(self.n_features)
            .min(self.n_features);

        let data = self.x.data();
        let mut best: Option<SplitCandidate<T>> = None;
        for fi in 0..n_search {
            let feature = self.feature_order[fi];
            let mut column: Vec<(T, usize)> = indices
                .iter()
                .map(|&i| (data[i * self.n_features + feature], i))
                .collect();
            column.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let found = match self.config.strategy {
                SplitStrategy::Standard => {
                    self.target
                        .best_threshold(&column, impurity, self.config.min_samples_leaf)
                }
                SplitStrategy::ExtremelyRandomized => {
                    let lo = column[0].0;
                    let hi = column[n - 1].0;
                    if hi <= lo {
                        None
                    } else {
                        let t = lo + T::from_f64(self.rng.gen::<f64>()) * (hi - lo);
                        self.target
                            .threshold_gain(&column, t, impurity, self.config.min_samples_leaf)
                            .map(|gain| (t, gain))
                    }
                }
            };

            if let Some((threshold, gain)) = found {
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_index: feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        match best {
            Some(split) => Decision::Split(split),
            None => Decision::Leaf,
        }
    }

    /// Reserve an arena slot; overwritten when the slot's task is processed.
    fn alloc(&mut self) -> NodeId {
        self.nodes.push(Node {
            depth: 0,
            n_samples: 0,
            impurity: T::ZERO,
            kind: NodeKind::Leaf {
                leaf_id: 0,
                value: Vec::new(),
            },
        });
        self.nodes.len() - 1
    }

    fn finalize_leaf(&mut self, slot: NodeId, indices: &[usize], depth: usize, impurity: T) {
        let leaf_id = self.leaf_nodes.len();
        self.nodes[slot] = Node {
            depth,
            n_samples: indices.len(),
            impurity,
            kind: NodeKind::Leaf {
                leaf_id,
                value: self.target.leaf_value(indices),
            },
        };
        self.leaf_nodes.push(slot);
    }

    fn record_split(
        &mut self,
        slot: NodeId,
        indices: &[usize],
        depth: usize,
        impurity: T,
        split: &SplitCandidate<T>,
    ) -> (NodeId, NodeId) {
        self.importances[split.feature_index] += T::from_usize(indices.len()) * split.gain;
        let left = self.alloc();
        let right = self.alloc();
        self.nodes[slot] = Node {
            depth,
            n_samples: indices.len(),
            impurity,
            kind: NodeKind::Split {
                feature_index: split.feature_index,
                threshold: split.threshold,
                left,
                right,
            },
        };
        (left, right)
    }

    fn partition(&self, indices: &[usize], split: &SplitCandidate<T>) -> (Vec<usize>, Vec<usize>) {
        let data = self.x.data();
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &i in indices {
            if data[i * self.n_features + split.feature_index] < split.threshold {
                left.push(i);
            } else {
                right.push(i);
            }
        }
        (left, right)
    }
}
