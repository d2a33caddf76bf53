//! ---
//! oee_section: "11-simulation"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Deterministic random sources for replays and tests."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use rand::{Error, RngCore, SeedableRng};
use rand::rngs::StdRng;

const F64_MANTISSA_BITS: u32 = 53;

/// Per-cell RNG derived from the plant seed so cells never share a stream.
pub fn cell_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_add(index as u64))
}

/// Random source replaying a fixed list of uniform draws in `[0, 1)`, cycling at the end.
///
/// `rng.gen::<f64>()` returns exactly the scripted value (up to 2^-53 truncation).
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    pub fn new(draws: impl Into<Vec<f64>>) -> Self {
        let draws = draws.into();
        assert!(!draws.is_empty(), "scripted rng needs at least one draw");
        Self { draws, cursor: 0 }
    }

    /// Every draw returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    pub fn consumed(&self) -> usize {
        self.cursor
    }

    fn next_draw(&mut self) -> f64 {
        let value = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        value
    }
}

fn encode_unit(value: f64) -> u64 {
    let scale = (1u64 << F64_MANTISSA_BITS) as f64;
    let clamped = value.clamp(0.0, 1.0 - 1.0 / scale);
    ((clamped * scale) as u64) << (64 - F64_MANTISSA_BITS)
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        encode_unit(self.next_draw())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn replays_scripted_draws_in_order() {
        let mut rng = ScriptedRng::new(vec![0.25, 0.5, 0.75]);
        assert_eq!(rng.gen::<f64>(), 0.25);
        assert_eq!(rng.gen::<f64>(), 0.5);
        assert_eq!(rng.gen::<f64>(), 0.75);
        assert_eq!(rng.gen::<f64>(), 0.25);
        assert_eq!(rng.consumed(), 4);
    }

    #[test]
    fn clamps_values_into_unit_interval() {
        let mut rng = ScriptedRng::new(vec![1.5, -2.0]);
        let high = rng.gen::<f64>();
        assert!(high < 1.0 && high > 0.999_999);
        assert_eq!(rng.gen::<f64>(), 0.0);
    }

    #[test]
    fn cell_streams_differ() {
        let mut a = cell_rng(7, 0);
        let mut b = cell_rng(7, 1);
        assert_ne!(a.next_u64(), b.next_u64());
    }
}
