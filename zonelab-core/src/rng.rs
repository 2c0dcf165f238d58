//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each `(symbol, run)`
//! pair. Sub-seeds are derived via BLAKE3 hashing, independently of the order
//! symbols are optimized in, so a sweep gives identical results whether it
//! runs sequentially or on a thread pool.

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for `(symbol, run)`.
    pub fn sub_seed(&self, symbol: &str, run: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(&run.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}
