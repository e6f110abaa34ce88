use super::operator::{OperatorIo, RenderContext};
use super::waveform::Waveform;

/// Low-frequency oscillator with a delay-before-onset timer and a short
/// linear ramp once the delay expires.
pub struct Lfo {
    pub waveform: Waveform,
    pub rate: f32,
    /// Samples of silence after the (re)trigger before the ramp starts.
    pub delay: f32,
    /// Samples over which the output fades from 0 to full after the delay.
    pub ramp: f32,
}

#[derive(Clone, Debug, Default)]
pub struct LfoState {
    phase: f32,
    /// Samples elapsed since the owning trigger (voice onset, or the first
    /// voice of a legato group in shared mode).
    age: f32,
}

impl Lfo {
    pub fn new(waveform: Waveform, rate: f32) -> Self {
        Self {
            waveform,
            rate,
            delay: 0.0,
            ramp: 1024.0,
        }
    }

    pub fn operate(&self, io: &mut OperatorIo<'_>, state: &mut LfoState, ctx: &RenderContext) {
        let step = (self.rate / ctx.sample_rate.max(1.0)).clamp(0.0, 0.5);
        let ramp = self.ramp.max(1.0);
        for sample in io.output.iter_mut() {
            let gain = if state.age < self.delay {
                0.0
            } else {
                ((state.age - self.delay) / ramp).min(1.0)
            };
            *sample = self.waveform.evaluate(state.phase, 0.5) * gain;
            state.phase += step;
            if state.phase >= 1.0 {
                state.phase -= 1.0;
            }
            state.age += 1.0;
        }
    }
}
