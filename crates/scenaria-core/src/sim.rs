//! Tick outcome and state-hash types.

use crate::clock::Ticks;

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// What a single `tick()` call left the storyboard in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stories were walked; at least one is not complete yet.
    Running,
    /// Every story has completed.
    Completed,
    /// The storyboard is stopped (end conditions fired, or `stop()` was
    /// called). No stories were walked.
    Stopped,
}

/// Result of an `advance()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Number of fixed steps actually executed.
    pub steps_run: u64,
    /// Outcome of the last step run, or `Running` if none ran.
    pub outcome: TickOutcome,
    /// Clock tick after the call.
    pub tick: Ticks,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of scenario state for replay checks.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an f64 by its bit pattern.
    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_f64(20.0);
        h1.write_str("Ego");

        let mut h2 = StateHash::new();
        h2.write_f64(20.0);
        h2.write_str("Ego");

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_i32(1);
        h1.write_i32(2);

        let mut h2 = StateHash::new();
        h2.write_i32(2);
        h2.write_i32(1);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn length_prefix_separates_strings() {
        let mut h1 = StateHash::new();
        h1.write_str("ab");
        h1.write_str("c");

        let mut h2 = StateHash::new();
        h2.write_str("a");
        h2.write_str("bc");

        assert_ne!(h1.finish(), h2.finish());
    }
}
