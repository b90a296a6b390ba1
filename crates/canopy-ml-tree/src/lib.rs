//! Decision tree estimators for CanopyML.
//!
//! All four concrete tree estimators (standard and extremely-randomized split
//! search, for classification and regression) plus the gradient-statistics
//! tree used inside gradient boosting are thin configurations of one shared
//! grower ([`grower::grow`]) producing an arena-backed [`tree::Tree`].

pub mod decision_tree;
pub mod extra_tree;
pub mod gradient_tree;
pub mod grower;
pub mod node;
pub mod split;
pub mod tree;

pub use decision_tree::*;
pub use extra_tree::*;
pub use gradient_tree::*;
pub use grower::*;
pub use node::*;
pub use split::*;
pub use tree::*;
