#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;

/// Identifier of one execution unit (a goroutine, for a Go target). Unique
/// within one snapshot only: the backend may reuse ids across halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub i64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Content-derived identifier of a profile function: FNV-1a of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(pub u64);

impl FunctionId {
    pub fn of(name: &str) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(name.as_bytes());
        Self(hasher.finish())
    }
}

/// Content-derived identifier of a profile location: FNV-1a of the function
/// name followed by the little-endian pc offset.
///
/// Two distinct `(name, offset)` pairs hashing to the same id are not
/// detected; the first one inserted wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub u64);

impl LocationId {
    pub fn of(function: &str, pc_offset: u64) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(function.as_bytes());
        hasher.write(&pc_offset.to_le_bytes());
        Self(hasher.finish())
    }
}
