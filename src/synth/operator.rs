use super::amp::{Amplifier, AmplifierState};
use super::envelope::{EnvelopeGenerator, EnvelopeState};
use super::filter::{Filter, FilterState};
use super::lfo::{Lfo, LfoState};
use super::noise::{Noise, NoiseState};
use super::oscillator::{Oscillator, OscillatorState};

/// Per-invocation facts every operator may need.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext {
    pub sample_rate: f32,
    /// Unmodulated frequency of the key this pass is referenced to. For a
    /// per-voice pass that is the voice's own key; for the shared filter
    /// pass it is the highest currently-held key.
    pub key_frequency: f32,
    /// 0..1 note velocity applied by the amplifier.
    pub velocity: f32,
    /// Cutoff sweep in Hz applied per unit of the modulation slot.
    pub filter_sweep: f32,
}

impl RenderContext {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            key_frequency: 0.0,
            velocity: 1.0,
            filter_sweep: 0.0,
        }
    }
}

/// Buffer slots for one `operate` call.
///
/// Every slot except `output` is optional; an operator treats a missing
/// slot as silence (or its neutral value) rather than failing. Slots an
/// operator does not declare are simply ignored.
pub struct OperatorIo<'a> {
    pub output: &'a mut [f32],
    /// Audio input (filter, amplifier).
    pub source: Option<&'a [f32]>,
    /// Per-sample frequency in Hz (oscillator).
    pub frequency: Option<&'a [f32]>,
    /// Envelope level input (amplifier, filter cutoff).
    pub envelope: Option<&'a [f32]>,
    /// Per-sample pulse width (oscillator PWM).
    pub pulse_width: Option<&'a [f32]>,
    /// Low-frequency modulation input (filter sweep).
    pub modulation: Option<&'a [f32]>,
    pub sync_in: Option<&'a [f32]>,
    pub sync_out: Option<&'a mut [f32]>,
}

impl<'a> OperatorIo<'a> {
    pub fn new(output: &'a mut [f32]) -> Self {
        Self {
            output,
            source: None,
            frequency: None,
            envelope: None,
            pulse_width: None,
            modulation: None,
            sync_in: None,
            sync_out: None,
        }
    }
}

/// One signal-processing unit of the instrument algorithm.
///
/// The parameter side is shared per instrument; continuous state lives in a
/// matching `OperatorState` addressed by (voice, module).
pub enum Operator {
    Oscillator(Oscillator),
    Envelope(EnvelopeGenerator),
    Filter(Filter),
    Noise(Noise),
    Amplifier(Amplifier),
    Lfo(Lfo),
}

#[derive(Clone, Debug)]
pub enum OperatorState {
    Oscillator(OscillatorState),
    Envelope(EnvelopeState),
    Filter(FilterState),
    Noise(NoiseState),
    Amplifier(AmplifierState),
    Lfo(LfoState),
}

impl Operator {
    /// Build the matching zeroed state slot for one voice.
    ///
    /// `seed` keeps stochastic state (noise) reproducible per slot.
    pub fn default_state(&self, seed: u64) -> OperatorState {
        match self {
            Operator::Oscillator(_) => OperatorState::Oscillator(OscillatorState::default()),
            Operator::Envelope(_) => OperatorState::Envelope(EnvelopeState::default()),
            Operator::Filter(_) => OperatorState::Filter(FilterState::default()),
            Operator::Noise(_) => OperatorState::Noise(NoiseState::with_seed(seed)),
            Operator::Amplifier(_) => OperatorState::Amplifier(AmplifierState),
            Operator::Lfo(_) => OperatorState::Lfo(LfoState::default()),
        }
    }

    /// Render one block. A state slot of the wrong kind means the caller
    /// wired the algorithm wrong; the output degrades to silence instead of
    /// taking down the render thread.
    pub fn operate(&self, io: &mut OperatorIo<'_>, state: &mut OperatorState, ctx: &RenderContext) {
        match (self, state) {
            (Operator::Oscillator(params), OperatorState::Oscillator(state)) => {
                params.operate(io, state, ctx)
            }
            (Operator::Envelope(params), OperatorState::Envelope(state)) => {
                params.operate(io, state)
            }
            (Operator::Filter(params), OperatorState::Filter(state)) => {
                params.operate(io, state, ctx)
            }
            (Operator::Noise(params), OperatorState::Noise(state)) => params.operate(io, state),
            (Operator::Amplifier(params), OperatorState::Amplifier(_)) => params.operate(io, ctx),
            (Operator::Lfo(params), OperatorState::Lfo(state)) => params.operate(io, state, ctx),
            _ => io.output.fill(0.0),
        }
    }
}
