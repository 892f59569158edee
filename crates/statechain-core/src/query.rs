//! Read-side projections over the recorded snapshots, genesis to tail.

use crate::{Chain, State};
use serde_json::Value;

impl Chain {
    /// Every snapshot in chain order.
    pub fn states(&self) -> Vec<&State> {
        self.iter().map(|block| &block.state).collect()
    }

    /// The tail's snapshot. Earlier snapshots are not merged in.
    pub fn current_state(&self) -> &State {
        &self.tip().state
    }

    /// Values recorded under `key`, oldest first, skipping blocks without it.
    pub fn states_of(&self, key: &str) -> Vec<&Value> {
        self.iter().filter_map(|block| block.state.get(key)).collect()
    }

    /// Value of `key` in the block closest to the tail that recorded it.
    pub fn current_state_of(&self, key: &str) -> Option<&Value> {
        self.iter().rev().find_map(|block| block.state.get(key))
    }
}
