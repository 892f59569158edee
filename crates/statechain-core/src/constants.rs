pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Leading hex characters every mined block hash must start with.
pub const POW_PREFIX: &str = "0";
