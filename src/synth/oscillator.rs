use super::operator::{OperatorIo, RenderContext};
use super::waveform::Waveform;

/// Numerically-controlled oscillator driven by a per-sample frequency
/// buffer. Optionally re-synchronized by a pulse train from another
/// oscillator and able to emit its own wrap pulses for the same purpose.
pub struct Oscillator {
    pub waveform: Waveform,
    /// Semitone offset applied on top of the incoming frequency.
    pub transpose: f32,
    /// Cents offset, applied with `transpose`.
    pub detune: f32,
    pub gain: f32,
}

#[derive(Clone, Debug, Default)]
pub struct OscillatorState {
    /// Normalized phase in [0, 1).
    pub phase: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            transpose: 0.0,
            detune: 0.0,
            gain: 1.0,
        }
    }

    fn frequency_ratio(&self) -> f32 {
        ((self.transpose + self.detune / 100.0) / 12.0).exp2()
    }

    pub fn operate(&self, io: &mut OperatorIo<'_>, state: &mut OscillatorState, ctx: &RenderContext) {
        let Some(frequency) = io.frequency else {
            // An oscillator without a pitch source renders silence.
            io.output.fill(0.0);
            return;
        };

        let ratio = self.frequency_ratio();
        let sample_rate = ctx.sample_rate.max(1.0);

        for (i, sample) in io.output.iter_mut().enumerate() {
            // Sync pulses reset the phase before this sample is evaluated,
            // so a reset lands on the same sample as the source's wrap.
            if let Some(sync) = io.sync_in {
                if sync[i] > 0.5 {
                    state.phase = 0.0;
                }
            }

            // Negative or absurd frequencies clamp; the render path never
            // rejects a parameter.
            let step = (frequency[i] * ratio / sample_rate).clamp(0.0, 0.5);
            state.phase += step;
            let mut wrapped = false;
            if state.phase >= 1.0 {
                state.phase -= 1.0;
                wrapped = true;
            }
            if let Some(sync_out) = io.sync_out.as_deref_mut() {
                sync_out[i] = if wrapped { 1.0 } else { 0.0 };
            }

            let pulse_width = io.pulse_width.map_or(0.5, |pw| pw[i]);
            *sample = self.waveform.evaluate(state.phase, pulse_width) * self.gain;
        }
    }
}
