//! Chain validation.
//!
//! A chain is valid when every block from the start position to the tail is
//! internally consistent with its predecessor. This is self-consistency, not
//! immutability: rewriting a block and then re-mining it and every block after
//! it produces a chain that validates again.

use crate::{Block, Chain};
use thiserror::Error;
use tracing::debug;

/// The first check a chain failed, with the position of the offending block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("block at position {position} holds no hash")]
    Unmined { position: usize },

    #[error("block at position {position} does not meet the proof-of-work prefix")]
    InsufficientWork { position: usize },

    #[error("block at position {position} does not match its stored hash")]
    HashMismatch { position: usize },

    #[error("block at position {position} has no link to a predecessor")]
    MissingBackLink { position: usize },

    #[error("predecessor of position {position} does not match its stored hash")]
    PredecessorHashMismatch { position: usize },

    #[error("block at position {position} does not link to its predecessor's hash")]
    BrokenLink { position: usize },

    #[error("predecessor of position {position} holds the last possible index")]
    IndexOverflow { position: usize },

    #[error("block at position {position} has index {found}, expected {expected}")]
    IndexMismatch {
        position: usize,
        expected: u64,
        found: u64,
    },
}

impl Chain {
    pub fn is_valid(&self) -> bool {
        self.is_valid_from(0)
    }

    /// Validates the sub-chain from `position` to the tail. Past the tail is valid.
    pub fn is_valid_from(&self, position: usize) -> bool {
        self.find_violation_from(position).is_none()
    }

    pub fn find_violation(&self) -> Option<Violation> {
        self.find_violation_from(0)
    }

    pub fn find_violation_from(&self, start: usize) -> Option<Violation> {
        for (position, block) in self.blocks().iter().enumerate().skip(start) {
            if let Err(violation) = self.check_block(position, block) {
                debug!(%violation, "chain failed validation");
                return Some(violation);
            }
        }
        None
    }

    fn check_block(&self, position: usize, block: &Block) -> Result<(), Violation> {
        let stored = block.hash.ok_or(Violation::Unmined { position })?;
        if !self.pow().is_satisfied_by(&stored) {
            return Err(Violation::InsufficientWork { position });
        }
        if stored != block.compute_hash() {
            return Err(Violation::HashMismatch { position });
        }

        if position == 0 {
            return if block.is_genesis() {
                Ok(())
            } else {
                Err(Violation::MissingBackLink { position })
            };
        }

        let previous_hash = match (block.previous, block.previous_hash) {
            (Some(back), Some(previous_hash)) if back == position - 1 => previous_hash,
            _ => return Err(Violation::MissingBackLink { position }),
        };
        let prev = &self.blocks()[position - 1];

        let recomputed = prev.compute_hash();
        if prev.hash != Some(recomputed) {
            return Err(Violation::PredecessorHashMismatch { position });
        }
        if previous_hash != recomputed {
            return Err(Violation::BrokenLink { position });
        }
        match prev.index.checked_add(1) {
            Some(expected) if expected == block.index => {}
            Some(expected) => {
                return Err(Violation::IndexMismatch {
                    position,
                    expected,
                    found: block.index,
                })
            }
            None => return Err(Violation::IndexOverflow { position }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state_from_value, State};
    use serde_json::json;

    fn three_blocks() -> Chain {
        let mut chain = Chain::new(state_from_value(json!({"abc": 123})).unwrap());
        chain
            .push(state_from_value(json!({"aaa": 321})).unwrap())
            .push(state_from_value(json!({"xyz": 999})).unwrap());
        chain
    }

    #[test]
    fn fresh_chain_is_valid() {
        let chain = three_blocks();
        assert!(chain.is_valid());
        assert_eq!(chain.find_violation(), None);
        for position in 0..=chain.len() {
            assert!(chain.is_valid_from(position));
        }
    }

    #[test]
    fn past_the_tail_is_valid() {
        let chain = three_blocks();
        assert!(chain.is_valid_from(3));
        assert!(chain.is_valid_from(usize::MAX));
    }

    #[test]
    fn cleared_hash_is_unmined() {
        let mut chain = three_blocks();
        chain.block_mut(2).unwrap().clear_hash();
        assert_eq!(
            chain.find_violation(),
            Some(Violation::Unmined { position: 2 })
        );
    }

    #[test]
    fn stored_hash_without_work_is_rejected() {
        let mut chain = three_blocks();
        chain.block_mut(1).unwrap().hash = Some([0xffu8; 32]);
        assert_eq!(
            chain.find_violation(),
            Some(Violation::InsufficientWork { position: 1 })
        );
    }

    #[test]
    fn state_edit_is_a_hash_mismatch() {
        let mut chain = three_blocks();
        chain
            .block_mut(1)
            .unwrap()
            .state
            .insert("aaa".into(), json!(100));
        assert_eq!(
            chain.find_violation(),
            Some(Violation::HashMismatch { position: 1 })
        );
    }

    #[test]
    fn severed_back_link() {
        let mut chain = three_blocks();
        chain.block_mut(2).unwrap().previous = None;
        assert_eq!(
            chain.find_violation(),
            Some(Violation::MissingBackLink { position: 2 })
        );

        let mut chain = three_blocks();
        chain.block_mut(2).unwrap().previous = Some(0);
        assert_eq!(
            chain.find_violation(),
            Some(Violation::MissingBackLink { position: 2 })
        );
    }

    #[test]
    fn genesis_shape_is_required_at_position_zero() {
        let pow = crate::ProofOfWork::default();
        let mut chain = three_blocks();
        let genesis = chain.block_mut(0).unwrap();
        genesis.previous_hash = Some([1u8; 32]);
        genesis.clear_hash();
        pow.mine(genesis);
        assert_eq!(
            chain.find_violation(),
            Some(Violation::MissingBackLink { position: 0 })
        );
    }

    #[test]
    fn sub_chain_checks_its_first_predecessor() {
        let mut chain = three_blocks();
        chain.block_mut(0).unwrap().timestamp += 100;
        assert!(!chain.is_valid_from(1));
        assert_eq!(
            chain.find_violation_from(1),
            Some(Violation::PredecessorHashMismatch { position: 1 })
        );
        assert!(chain.is_valid_from(2));
    }

    #[test]
    fn re_mined_predecessor_breaks_the_link() {
        let pow = crate::ProofOfWork::default();
        let mut chain = three_blocks();
        let middle = chain.block_mut(1).unwrap();
        middle.state = State::new();
        middle.clear_hash();
        pow.mine(middle);
        assert_eq!(
            chain.find_violation(),
            Some(Violation::BrokenLink { position: 2 })
        );
    }

    #[test]
    fn relinked_index_gap_is_rejected() {
        let pow = crate::ProofOfWork::default();
        let mut chain = three_blocks();
        let tail = chain.block_mut(2).unwrap();
        tail.index = 100;
        tail.clear_hash();
        pow.mine(tail);
        assert_eq!(
            chain.find_violation(),
            Some(Violation::IndexMismatch {
                position: 2,
                expected: 2,
                found: 100
            })
        );
    }

    #[test]
    fn violations_render() {
        let violation = Violation::IndexMismatch {
            position: 2,
            expected: 2,
            found: 100,
        };
        assert_eq!(
            violation.to_string(),
            "block at position 2 has index 100, expected 2"
        );
    }
}
