pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Upper bound on difficulty: one leading zero per hex character of the digest.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const PROGRESS_INTERVAL: u64 = 10_000;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
pub const SENTINEL_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
