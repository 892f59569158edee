#![allow(dead_code)]

use serde_json::Value;
use statechain_core::{state_from_value, Chain, ProofOfWork, State};

pub fn snapshot(value: Value) -> State {
    state_from_value(value).expect("test snapshots are objects")
}

/// Builds a chain from a list of JSON object snapshots, genesis first.
pub fn build_chain(snapshots: &[Value]) -> Chain {
    let (first, rest) = snapshots.split_first().expect("at least a genesis snapshot");
    let mut chain = Chain::new(snapshot(first.clone()));
    for value in rest {
        chain.push(snapshot(value.clone()));
    }
    chain
}

/// The three-block chain used throughout: {abc:123}, {aaa:321}, {xyz:999}.
pub fn sample_chain() -> Chain {
    build_chain(&[
        serde_json::json!({"abc": 123}),
        serde_json::json!({"aaa": 321}),
        serde_json::json!({"xyz": 999}),
    ])
}

/// Clears and re-mines the block at `position`, then relinks and re-mines every
/// block after it, leaving a self-consistent chain.
pub fn remine_from(chain: &mut Chain, position: usize) {
    let pow: ProofOfWork = chain.pow().clone();
    let mut previous_hash = match position {
        0 => None,
        _ => chain.get(position - 1).and_then(|b| b.hash),
    };
    for at in position..chain.len() {
        let block = chain.block_mut(at).expect("position within chain");
        if at > 0 {
            block.previous_hash = previous_hash;
        }
        block.clear_hash();
        previous_hash = Some(pow.mine(block));
    }
}
