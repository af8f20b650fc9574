//! Instance selection policies
//!
//! The registry can return several instances for one service. The policy
//! decides which one a resolve call hands back.

use crate::types::{ServiceName, ServiceRecord};
use anyhow::{anyhow, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// How to pick one record out of a registry answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Always the first record
    #[default]
    First,
    /// Uniformly random record
    Random,
    /// Cycle through records, tracked per service
    RoundRobin,
}

impl FromStr for SelectionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "first" => Ok(SelectionPolicy::First),
            "random" => Ok(SelectionPolicy::Random),
            "round-robin" | "round_robin" | "roundrobin" => Ok(SelectionPolicy::RoundRobin),
            _ => Err(anyhow!(
                "Invalid selection policy '{}'. Use 'first', 'random' or 'round-robin'",
                s
            )),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::First => write!(f, "first"),
            SelectionPolicy::Random => write!(f, "random"),
            SelectionPolicy::RoundRobin => write!(f, "round-robin"),
        }
    }
}

/// Applies a selection policy, keeping round-robin cursors per service
#[derive(Debug)]
pub struct InstanceSelector {
    policy: SelectionPolicy,
    cursors: Mutex<HashMap<ServiceName, usize>>,
}

impl InstanceSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Pick one record. Returns `None` only for an empty slice.
    pub fn select<'a>(
        &self,
        service: &ServiceName,
        records: &'a [ServiceRecord],
    ) -> Option<&'a ServiceRecord> {
        if records.is_empty() {
            return None;
        }

        let index = match self.policy {
            SelectionPolicy::First => 0,
            SelectionPolicy::Random => rand::thread_rng().gen_range(0..records.len()),
            SelectionPolicy::RoundRobin => self.next_cursor(service, records.len()),
        };

        records.get(index)
    }

    fn next_cursor(&self, service: &ServiceName, len: usize) -> usize {
        // Counters stay valid after a poisoning panic
        let mut cursors = match self.cursors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let cursor = cursors.entry(service.clone()).or_insert(0);
        let index = *cursor % len;
        *cursor = cursor.wrapping_add(1);
        index
    }
}

impl Default for InstanceSelector {
    fn default() -> Self {
        Self::new(SelectionPolicy::First)
    }
}
