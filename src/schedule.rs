//! Per-track cadence scheduling.
//!
//! While the motion gate is ACTIVE, each inference track runs only on
//! frames whose sequence index is a multiple of the track's cadence;
//! all other frames reuse the track's cached result. The decision is a
//! pure function of (index, cadence) with no hidden state.

use anyhow::{anyhow, Result};

/// Whether a track executes its detector this frame or reuses its cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Run,
    Reuse,
}

/// Fixed frame-count interval at which a track executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cadence(u32);

impl Cadence {
    pub fn new(interval: u32) -> Result<Self> {
        if interval == 0 {
            return Err(anyhow!("cadence interval must be >= 1"));
        }
        Ok(Self(interval))
    }

    pub fn every_frame() -> Self {
        Self(1)
    }

    /// Default interval for the object track.
    pub fn default_object() -> Self {
        Self(2)
    }

    /// Default interval for the face track.
    pub fn default_face() -> Self {
        Self(5)
    }

    pub fn interval(&self) -> u32 {
        self.0
    }

    pub fn decide(&self, seq: u64) -> Decision {
        if seq % self.0 as u64 == 0 {
            Decision::Run
        } else {
            Decision::Reuse
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cadence::new(0).is_err());
    }

    #[test]
    fn runs_exactly_on_multiples() {
        let cadence = Cadence::new(5).unwrap();
        for seq in 0..50u64 {
            let expected = if seq % 5 == 0 {
                Decision::Run
            } else {
                Decision::Reuse
            };
            assert_eq!(cadence.decide(seq), expected, "seq {}", seq);
        }
    }

    #[test]
    fn every_frame_always_runs() {
        let cadence = Cadence::every_frame();
        for seq in 1..20u64 {
            assert_eq!(cadence.decide(seq), Decision::Run);
        }
    }
}
