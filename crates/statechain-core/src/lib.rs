pub mod chain;
pub mod constants;
pub mod error;
pub mod query;
pub mod validate;

use constants::HASH_SIZE;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::Chain;
pub use error::{ChainError, Result};
pub use pow::ProofOfWork;
pub use validate::Violation;

pub type Hash = [u8; HASH_SIZE];

/// A snapshot of application data. Keys are kept sorted, nested objects included.
pub type State = serde_json::Map<String, Value>;

/// Milliseconds since the Unix epoch, saturating at zero for clocks set before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Shape check for untyped payloads. `null` reads as an empty snapshot.
pub fn state_from_value(value: Value) -> Result<State> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(State::new()),
        Value::Bool(_) => Err(ChainError::InvalidState { kind: "boolean" }),
        Value::Number(_) => Err(ChainError::InvalidState { kind: "number" }),
        Value::String(_) => Err(ChainError::InvalidState { kind: "string" }),
        Value::Array(_) => Err(ChainError::InvalidState { kind: "array" }),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub index: u64,
    pub state: State,
    pub timestamp: u64,
    pub nonce: u64,
    /// Proof-of-work hash; `None` once cleared, which re-enables mining.
    pub hash: Option<Hash>,
    pub previous_hash: Option<Hash>,
    /// Position of the predecessor in the owning chain.
    pub previous: Option<usize>,
}

impl Block {
    pub fn unmined(index: u64, state: State, timestamp: u64, previous_hash: Option<Hash>) -> Self {
        Self {
            index,
            state,
            timestamp,
            nonce: 0,
            hash: None,
            previous_hash,
            previous: None,
        }
    }

    /// Builds and mines a block on top of `previous` (given with its chain position),
    /// or a genesis block when there is none. `index` defaults to one past the
    /// predecessor's, or 0.
    pub fn new(
        state: State,
        index: Option<u64>,
        previous: Option<(usize, &Block)>,
        pow: &ProofOfWork,
    ) -> Self {
        Self::new_at(state, index, now_millis(), previous, pow)
    }

    pub fn new_at(
        state: State,
        index: Option<u64>,
        timestamp: u64,
        previous: Option<(usize, &Block)>,
        pow: &ProofOfWork,
    ) -> Self {
        let mut block = match previous {
            Some((position, prev)) => {
                let prev_hash = prev.hash.unwrap_or_else(|| prev.compute_hash());
                // saturates on a tampered u64::MAX predecessor; validation rejects it
                let index = index.unwrap_or_else(|| prev.index.saturating_add(1));
                let mut block = Self::unmined(index, state, timestamp, Some(prev_hash));
                block.previous = Some(position);
                block
            }
            None => Self::unmined(index.unwrap_or(0), state, timestamp, None),
        };
        pow.mine(&mut block);
        block
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        let state = state_bytes(&self.state);
        let mut bytes = Vec::with_capacity(8 + state.len() + 8 + 1 + HASH_SIZE + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&state);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        match &self.previous_hash {
            Some(prev) => {
                bytes.push(1);
                bytes.extend_from_slice(prev);
            }
            None => bytes.push(0),
        }
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Recomputes the content hash from the current field values.
    pub fn compute_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.hash_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(&digest[..]);
        out
    }

    pub fn hash_hex(&self) -> Option<String> {
        self.hash.map(hex::encode)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous.is_none() && self.previous_hash.is_none()
    }

    pub fn clear_hash(&mut self) {
        self.hash = None;
    }
}

// Entry count, then length-prefixed key and compact JSON value per entry.
fn state_bytes(state: &State) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(state.len() as u64).to_le_bytes());
    for (key, value) in state {
        let rendered = value.to_string();
        out.extend_from_slice(&(key.len() as u64).to_le_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&(rendered.len() as u64).to_le_bytes());
        out.extend_from_slice(rendered.as_bytes());
    }
    out
}

pub mod pow {
    use super::{Block, ChainError, Hash, Result};
    use crate::constants::{HASH_HEX_SIZE, POW_PREFIX};
    use tracing::{info, trace};

    /// Fixed-prefix proof-of-work predicate over the lowercase hex digest.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct ProofOfWork {
        prefix: String,
    }

    impl Default for ProofOfWork {
        fn default() -> Self {
            Self {
                prefix: POW_PREFIX.to_string(),
            }
        }
    }

    impl ProofOfWork {
        pub fn new(prefix: impl Into<String>) -> Result<Self> {
            let prefix = prefix.into();
            let hex_digits = prefix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
            if !hex_digits || prefix.len() > HASH_HEX_SIZE {
                return Err(ChainError::InvalidPrefix { prefix });
            }
            Ok(Self { prefix })
        }

        /// `n` leading `'0'` characters.
        pub fn leading_zeros(n: usize) -> Result<Self> {
            Self::new("0".repeat(n))
        }

        pub fn prefix(&self) -> &str {
            &self.prefix
        }

        pub fn is_satisfied_by(&self, hash: &Hash) -> bool {
            hex::encode(hash).starts_with(&self.prefix)
        }

        /// Searches nonces, starting at the block's current one, until the hash
        /// satisfies the prefix. A block already holding a qualifying hash is
        /// returned untouched, even if its fields changed since it was mined.
        pub fn mine(&self, block: &mut Block) -> Hash {
            if let Some(hash) = block.hash {
                if self.is_satisfied_by(&hash) {
                    trace!(index = block.index, "block already mined");
                    return hash;
                }
            }
            loop {
                let hash = block.compute_hash();
                if self.is_satisfied_by(&hash) {
                    block.hash = Some(hash);
                    info!(
                        index = block.index,
                        nonce = block.nonce,
                        hash = %hex::encode(hash),
                        "mined block"
                    );
                    return hash;
                }
                block.nonce = block.nonce.wrapping_add(1);
            }
        }
    }
}
