//! Explicit seed derivation and run fingerprints.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Derives independent, deterministic seeds for each random component from a
/// single global seed. Stateless, so parallel consumers never share a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedManager {
    global_seed: u64,
}

impl SeedManager {
    pub fn new(global_seed: u64) -> Self {
        Self { global_seed }
    }

    pub fn seed_for(&self, component: &str) -> u64 {
        self.derive(component, None)
    }

    /// Seed for the `index`-th instance of a component (e.g. one fold).
    pub fn seed_for_indexed(&self, component: &str, index: usize) -> u64 {
        self.derive(component, Some(index as u64))
    }

    fn derive(&self, component: &str, index: Option<u64>) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.global_seed.to_le_bytes());
        hasher.update(component.as_bytes());
        if let Some(i) = index {
            hasher.update(b"#");
            hasher.update(i.to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

/// SHA-256 digests of everything a run derives from its inputs. Two runs with
/// the same seed on the same dataset produce equal fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub split: String,
    pub folds: String,
    pub recipe: String,
    pub metrics: String,
}

impl RunFingerprint {
    pub fn compute(
        split: &impl Serialize,
        folds: &impl Serialize,
        recipe: &impl Serialize,
        metrics: &impl Serialize,
    ) -> Result<Self> {
        Ok(Self {
            split: digest(split)?,
            folds: digest(folds)?,
            recipe: digest(recipe)?,
            metrics: digest(metrics)?,
        })
    }
}

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn digest(value: &impl Serialize) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}
