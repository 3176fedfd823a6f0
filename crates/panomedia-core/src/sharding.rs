//! Short random keys that namespace every object path derived for a record.

use rand::RngCore;

pub const DEFAULT_SHARDING_KEY_LENGTH: usize = 4;

/// Generates `length` random bytes from the thread-local CSPRNG, hex encoded
/// (`2 * length` characters).
pub fn generate_sharding_key(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone, Copy)]
pub struct ShardingKeyGenerator {
    length: usize,
}

impl Default for ShardingKeyGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_SHARDING_KEY_LENGTH,
        }
    }
}

impl ShardingKeyGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn generate(&self) -> String {
        generate_sharding_key(self.length)
    }
}
