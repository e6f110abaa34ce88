use core::f32::consts::PI;

use super::operator::{OperatorIo, RenderContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    BandPass,
    HighPass,
}

/// Two-integrator state-variable filter with per-sample cutoff modulation
/// from an envelope input, an LFO input and keyboard tracking.
pub struct Filter {
    pub mode: FilterMode,
    /// Base cutoff in Hz before modulation.
    pub cutoff: f32,
    /// 0..1, higher is more resonant.
    pub resonance: f32,
    /// Cutoff excursion in Hz at full envelope. The sign carries the
    /// envelope polarity; the controller re-signs it when polarity flips.
    pub env_depth: f32,
    /// 0..1 blend of the reference key's frequency into the cutoff.
    pub key_track: f32,
}

#[derive(Clone, Debug, Default)]
pub struct FilterState {
    low: f32,
    band: f32,
}

const MIN_CUTOFF: f32 = 10.0;

impl Filter {
    pub fn new(mode: FilterMode, cutoff: f32, resonance: f32) -> Self {
        Self {
            mode,
            cutoff,
            resonance,
            env_depth: 0.0,
            key_track: 0.0,
        }
    }

    pub fn operate(&self, io: &mut OperatorIo<'_>, state: &mut FilterState, ctx: &RenderContext) {
        let sample_rate = ctx.sample_rate.max(1.0);
        let max_cutoff = sample_rate * 0.45;
        // Joint bound with the frequency coefficient below keeps the
        // two-integrator loop inside the unit circle (f^2 + 2fd < 4).
        let damping = (2.0 * (1.0 - self.resonance.clamp(0.0, 0.98))).min(1.8);
        let tracked = self.cutoff + self.key_track.clamp(0.0, 1.0) * ctx.key_frequency;

        for (i, sample) in io.output.iter_mut().enumerate() {
            let input = io.source.map_or(0.0, |source| source[i]);
            let env = io.envelope.map_or(0.0, |envelope| envelope[i]);
            let sweep = io.modulation.map_or(0.0, |modulation| modulation[i]) * ctx.filter_sweep;

            let hz = (tracked + self.env_depth * env + sweep).clamp(MIN_CUTOFF, max_cutoff);
            let f = (2.0 * (PI * hz / sample_rate).sin()).clamp(0.0, 0.8);

            state.low += f * state.band;
            let high = input - state.low - damping * state.band;
            state.band += f * high;

            *sample = match self.mode {
                FilterMode::LowPass => state.low,
                FilterMode::BandPass => state.band,
                FilterMode::HighPass => high,
            };
        }
    }
}
