use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::operator::OperatorIo;

/// White-noise source. Each state slot carries its own seeded generator so
/// replaying the same event sequence reproduces the same blocks.
pub struct Noise {
    pub gain: f32,
}

#[derive(Clone, Debug)]
pub struct NoiseState {
    rng: SmallRng,
}

impl NoiseState {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Noise {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn operate(&self, io: &mut OperatorIo<'_>, state: &mut NoiseState) {
        for sample in io.output.iter_mut() {
            *sample = (state.rng.random::<f32>() * 2.0 - 1.0) * self.gain;
        }
    }
}
