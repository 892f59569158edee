use crate::{now_millis, state_from_value, Block, ProofOfWork, Result, State};
use serde_json::Value;
use tracing::info;

/// Append-only sequence of mined blocks, genesis first.
///
/// Blocks are owned in storage order, so the forward link of a block is the
/// next position and its back-reference (`Block::previous`) is a plain index.
/// There is no internal locking: concurrent embedders should wrap the chain
/// in a `Mutex` and hold it across appends, mutation and validation.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    pow: ProofOfWork,
}

impl Chain {
    pub fn new(state: State) -> Self {
        Self::with_pow(state, ProofOfWork::default())
    }

    pub fn with_pow(state: State, pow: ProofOfWork) -> Self {
        Self::with_timestamp(state, now_millis(), pow)
    }

    pub fn with_timestamp(state: State, timestamp: u64, pow: ProofOfWork) -> Self {
        let genesis = Block::new_at(state, None, timestamp, None, &pow);
        info!(hash = %hex::encode(genesis.hash.unwrap_or_default()), "created genesis block");
        Self {
            blocks: vec![genesis],
            pow,
        }
    }

    /// Like `new`, but for payloads whose shape is not known to be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(state_from_value(value)?))
    }

    /// Mines a new block holding `state` after the current tail.
    pub fn push(&mut self, state: State) -> &mut Self {
        self.push_at(state, now_millis())
    }

    pub fn push_at(&mut self, state: State, timestamp: u64) -> &mut Self {
        let position = self.blocks.len() - 1;
        let block = Block::new_at(
            state,
            None,
            timestamp,
            Some((position, self.tip())),
            &self.pow,
        );
        info!(
            index = block.index,
            position = position + 1,
            "appended block"
        );
        self.blocks.push(block);
        self
    }

    pub fn push_value(&mut self, value: Value) -> Result<&mut Self> {
        let state = state_from_value(value)?;
        Ok(self.push(state))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get(&self, position: usize) -> Option<&Block> {
        self.blocks.get(position)
    }

    pub fn next(&self, position: usize) -> Option<&Block> {
        self.blocks.get(position.checked_add(1)?)
    }

    pub fn previous(&self, position: usize) -> Option<&Block> {
        let back = self.blocks.get(position)?.previous?;
        self.blocks.get(back)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Direct mutable access. Nothing is re-mined or re-linked: any edit that
    /// does not recompute the affected hashes makes the chain invalid.
    pub fn block_mut(&mut self, position: usize) -> Option<&mut Block> {
        self.blocks.get_mut(position)
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
