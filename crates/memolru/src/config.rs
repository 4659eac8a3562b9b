//! Cache configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What concurrent callers do when they miss on the same fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Every missing caller computes; the last stored result wins
    #[default]
    Concurrent,
    /// One caller computes per fingerprint, the others wait for its result
    SingleFlight,
}

/// Settings for a memoized function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of stored results
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Behaviour of concurrent misses on one fingerprint
    #[serde(default)]
    pub miss_policy: MissPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            miss_policy: MissPolicy::default(),
        }
    }
}

fn default_capacity() -> usize {
    128
}

impl CacheConfig {
    /// Config with the given capacity and default policy
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Builder-style policy override
    pub fn miss_policy(mut self, policy: MissPolicy) -> Self {
        self.miss_policy = policy;
        self
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Reject settings no cache can be built from
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::config("capacity must be greater than 0"));
        }
        Ok(())
    }
}
