//! Identifier types for models and individuals, plus id generation.
//!
//! Models are named `gomodel:<hex>`; individuals live under their model's
//! namespace as `<model>/<hex>`. The [`IdAllocator`] hands out fresh
//! suffixes from a clock-seeded atomic counter so ids stay unique across
//! process restarts. [`new_packet_id`] produces correlation ids for batch
//! responses.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Prefix shared by all generated model ids.
pub const MODEL_ID_PREFIX: &str = "gomodel:";

/// Identifier of a molecular model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of an individual inside a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndividualId(String);

impl IndividualId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndividualId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Thread-safe generator for model and individual ids.
///
/// The counter starts at the current unix time shifted into the upper
/// 32 bits, so a restarted process never reissues ids of a previous run.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator seeded from the wall clock.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::starting_from((secs & 0xffff_ffff) << 32)
    }

    /// Create an allocator that resumes from a given raw value.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a fresh model id.
    pub fn model_id(&self) -> ModelId {
        ModelId(format!("{MODEL_ID_PREFIX}{:016x}", self.next_raw()))
    }

    /// Allocate a fresh individual id inside `model`.
    pub fn individual_id(&self, model: &ModelId) -> IndividualId {
        IndividualId(format!("{model}/{:016x}", self.next_raw()))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

static PACKET_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a correlation id for a batch response.
///
/// Combines a process-wide counter with a nanosecond clock sample, so ids
/// are unique within the process and unlikely to collide across processes.
pub fn new_packet_id() -> String {
    let count = PACKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    format!("{nanos:x}{count:04x}")
}
