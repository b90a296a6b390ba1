//! Model persistence via JSON snapshots.
//!
//! A fitted estimator serializes to a self-contained [`Snapshot`] string and
//! restores from it without refitting. The resolved RNG seed is part of every
//! estimator's state, so a restored model also refits reproducibly.

use crate::error::{EstimatorError, EstimatorResult};

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// A serialized estimator. Wraps the JSON text so snapshots are not confused
/// with arbitrary strings at API boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Snapshot {
    fn from(json: String) -> Self {
        Snapshot(json)
    }
}

/// Snapshot/restore for estimators. All methods are provided; implementors
/// only opt in with an empty `impl`.
pub trait Persist: Serialize + DeserializeOwned + Sized {
    /// Serialize the full estimator state to a JSON snapshot.
    fn to_snapshot(&self) -> EstimatorResult<Snapshot> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EstimatorError::Snapshot(format!("serialization failed: {}", e)))?;
        Ok(Snapshot(json))
    }

    /// Rebuild an estimator from a snapshot.
    fn from_snapshot(snapshot: &Snapshot) -> EstimatorResult<Self> {
        serde_json::from_str(&snapshot.0)
            .map_err(|e| EstimatorError::Snapshot(format!("deserialization failed: {}", e)))
    }

    /// Write a snapshot to disk.
    fn save<P: AsRef<Path>>(&self, path: P) -> EstimatorResult<()> {
        let snapshot = self.to_snapshot()?;
        std::fs::write(path, snapshot.as_str())
            .map_err(|e| EstimatorError::Snapshot(format!("write failed: {}", e)))
    }

    /// Read a snapshot from disk and rebuild the estimator.
    fn load<P: AsRef<Path>>(path: P) -> EstimatorResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| EstimatorError::Snapshot(format!("read failed: {}", e)))?;
        Self::from_snapshot(&Snapshot(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stub {
        seed: u64,
        weights: Vec<f64>,
    }

    impl Persist for Stub {}

    #[test]
    fn test_snapshot_round_trip() {
        let model = Stub {
            seed: 42,
            weights: vec![0.25, -1.5, 3.0],
        };
        let snapshot = model.to_snapshot().unwrap();
        let restored = Stub::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        let bad = Snapshot::from("not json".to_string());
        let res = Stub::from_snapshot(&bad);
        assert!(matches!(res, Err(EstimatorError::Snapshot(_))));
    }
}
