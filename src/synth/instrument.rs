use tracing::debug;

use super::amp::Amplifier;
use super::buffer::{BufferId, BufferPool};
use super::envelope::{EnvelopeGenerator, EnvelopeState};
use super::filter::{Filter, FilterMode, FilterState};
use super::lfo::{Lfo, LfoState};
use super::noise::{Noise, NoiseState};
use super::operator::{Operator, OperatorIo, OperatorState, RenderContext};
use super::oscillator::Oscillator;
use super::voice::Voice;
use super::waveform::Waveform;

// Module slots of the instrument algorithm, fixed at load time. Parameter
// messages address modules by these indices.
pub const OP_OSC_A: usize = 0;
pub const OP_OSC_B: usize = 1;
pub const OP_ENV_A: usize = 2;
pub const OP_ENV_B: usize = 3;
pub const OP_AMP: usize = 4;
pub const OP_FILTER_ENV: usize = 5;
pub const OP_FILTER: usize = 6;
pub const OP_LFO: usize = 7;
pub const OP_NOISE: usize = 8;
pub const OPERATOR_COUNT: usize = 9;

/// LFO-to-pitch excursion at full depth, as a fraction of the carrier
/// frequency (one semitone).
const VCO_MOD_SPAN: f32 = 0.059_46;
/// LFO-to-cutoff excursion at full depth, in Hz.
const VCF_MOD_SPAN: f32 = 3000.0;

/// Discrete behavioral switches. Read every block by the render pipeline,
/// written rarely by the controller; a mid-note flip settles within one
/// block.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeFlags {
    pub double_oscillator: bool,
    pub shared_lfo: bool,
    pub shared_filter: bool,
    pub hard_sync: bool,
    /// Inverted envelope-to-filter polarity.
    pub inverted_envelope: bool,
}

/// Continuous instrument-wide controllers.
#[derive(Clone, Copy, Debug)]
pub struct GlobalParams {
    /// Portamento time in seconds.
    pub glide: f32,
    /// Master tuning as a frequency ratio around 1.0.
    pub tuning: f32,
    pub volume: f32,
    /// Pitch-bend range in semitones.
    pub bend_depth: f32,
    /// Current bend position, -1..1.
    pub bend: f32,
    /// Pulse-width excursion driven by the LFO.
    pub pwm_depth: f32,
    /// Overall LFO modulation amount.
    pub mod_depth: f32,
    /// -1..1; the negative share routes the LFO to pitch, the positive
    /// share to filter cutoff.
    pub mod_routing: f32,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            glide: 0.0,
            tuning: 1.0,
            volume: 0.7,
            bend_depth: 2.0,
            bend: 0.0,
            pwm_depth: 0.0,
            mod_depth: 0.0,
            mod_routing: 0.0,
        }
    }
}

/// Modulation snapshot taken once per block in pre-ops and used by every
/// voice in that cycle.
#[derive(Clone, Copy, Debug)]
pub struct ModScalars {
    pub bend_ratio: f32,
    pub lfo_to_vco: f32,
    pub lfo_to_vcf: f32,
}

impl ModScalars {
    fn compute(params: &GlobalParams) -> Self {
        Self {
            bend_ratio: (params.bend.clamp(-1.0, 1.0) * params.bend_depth / 12.0).exp2(),
            lfo_to_vco: params.mod_depth * (-params.mod_routing).max(0.0) * VCO_MOD_SPAN,
            lfo_to_vcf: params.mod_depth * params.mod_routing.max(0.0) * VCF_MOD_SPAN,
        }
    }
}

impl Default for ModScalars {
    fn default() -> Self {
        Self {
            bend_ratio: 1.0,
            lfo_to_vco: 0.0,
            lfo_to_vcf: 0.0,
        }
    }
}

/// The one deliberate exception to per-voice state ownership: when the
/// instrument runs a single LFO or filter, its continuous state lives here
/// and is advanced exactly once per block, guarded only by the
/// single-threaded block boundary.
pub struct SharedState {
    pub lfo: LfoState,
    pub noise: NoiseState,
    pub filter: FilterState,
    pub filter_env: EnvelopeState,
    /// Held-key count at the end of the previous block; the 0-to-some edge
    /// marks the start of a legato group.
    held_keys: usize,
}

/// Everything one loaded instrument owns: the operator list, the
/// per-(voice, module) state slots, the buffer pool, the output
/// accumulators, mode flags and global parameters.
pub struct Instrument {
    pub modes: ModeFlags,
    pub params: GlobalParams,
    pub(crate) operators: Vec<Operator>,
    pub(crate) voice_states: Vec<Vec<OperatorState>>,
    pub(crate) shared: SharedState,
    pub(crate) scalars: ModScalars,
    pub(crate) pool: BufferPool,
    /// Mono pre-filter mix used by the shared-filter pass.
    pub(crate) bus: Vec<f32>,
    pub(crate) out_left: Vec<f32>,
    pub(crate) out_right: Vec<f32>,
    freq_table: [f32; 128],
    sample_rate: f32,
    max_voices: usize,
    effective_voices: usize,
    /// (voice index, key) of the highest currently-held key; first voice
    /// in scan order wins a tie.
    reference: Option<(usize, u8)>,
}

fn build_operators() -> Vec<Operator> {
    let mut operators = Vec::with_capacity(OPERATOR_COUNT);
    operators.push(Operator::Oscillator(Oscillator::new(Waveform::Sawtooth)));
    operators.push(Operator::Oscillator(Oscillator::new(Waveform::Sawtooth)));
    operators.push(Operator::Envelope(EnvelopeGenerator::default()));
    operators.push(Operator::Envelope(EnvelopeGenerator::default()));
    operators.push(Operator::Amplifier(Amplifier::new(0.5)));
    operators.push(Operator::Envelope(EnvelopeGenerator::default()));
    operators.push(Operator::Filter(Filter::new(FilterMode::LowPass, 2400.0, 0.2)));
    operators.push(Operator::Lfo(Lfo::new(Waveform::Triangle, 5.0)));
    operators.push(Operator::Noise(Noise::new(0.0)));
    operators
}

impl Instrument {
    pub fn new(sample_rate: f32, block_len: usize, max_voices: usize, seed: u64) -> Self {
        let operators = build_operators();
        let voice_states = (0..max_voices)
            .map(|voice| {
                operators
                    .iter()
                    .enumerate()
                    .map(|(module, operator)| {
                        let slot = (voice * OPERATOR_COUNT + module) as u64;
                        operator.default_state(seed.wrapping_add(slot.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
                    })
                    .collect()
            })
            .collect();

        let mut instrument = Self {
            modes: ModeFlags::default(),
            params: GlobalParams::default(),
            operators,
            voice_states,
            shared: SharedState {
                lfo: LfoState::default(),
                noise: NoiseState::with_seed(seed),
                filter: FilterState::default(),
                filter_env: EnvelopeState::default(),
                held_keys: 0,
            },
            scalars: ModScalars::default(),
            pool: BufferPool::new(block_len),
            bus: vec![0.0; block_len],
            out_left: vec![0.0; block_len],
            out_right: vec![0.0; block_len],
            freq_table: [0.0; 128],
            sample_rate,
            max_voices,
            effective_voices: max_voices,
            reference: None,
        };
        instrument.rebuild_freq_table();
        instrument
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_len(&self) -> usize {
        self.pool.block_len()
    }

    pub fn effective_voices(&self) -> usize {
        self.effective_voices
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Key currently steering the shared filter, if any.
    pub fn reference_key(&self) -> Option<u8> {
        self.reference.map(|(_, key)| key)
    }

    pub fn note_frequency(&self, note: u8) -> f32 {
        self.freq_table[(note & 0x7F) as usize]
    }

    fn rebuild_freq_table(&mut self) {
        for (note, slot) in self.freq_table.iter_mut().enumerate() {
            *slot = 440.0 * ((note as f32 - 69.0) / 12.0).exp2() * self.params.tuning;
        }
    }

    /// Change master tuning and re-apply it to every sounding voice so held
    /// notes re-tune through their glide state instead of waiting for the
    /// next key-on.
    pub fn set_tuning(&mut self, ratio: f32, voices: &mut [Voice]) {
        self.params.tuning = ratio.clamp(0.25, 4.0);
        self.rebuild_freq_table();
        self.alter_all_notes(voices);
    }

    pub fn alter_all_notes(&self, voices: &mut [Voice]) {
        for voice in voices.iter_mut() {
            if voice.active {
                voice.target_freq = self.note_frequency(voice.note);
            }
        }
    }

    /// Dual-oscillator voices cost two layers, so "double" halves the
    /// polyphony immediately.
    pub fn set_double(&mut self, on: bool) {
        self.modes.double_oscillator = on;
        self.effective_voices = if on {
            (self.max_voices / 2).max(1)
        } else {
            self.max_voices
        };
        debug!(double = on, voices = self.effective_voices, "double mode");
    }

    /// Flipping polarity re-signs the stored envelope-to-filter depth so
    /// the very next block renders with the new sense.
    pub fn set_envelope_polarity(&mut self, inverted: bool) {
        self.modes.inverted_envelope = inverted;
        if let Some(Operator::Filter(filter)) = self.operators.get_mut(OP_FILTER) {
            filter.env_depth = if inverted {
                -filter.env_depth.abs()
            } else {
                filter.env_depth.abs()
            };
        }
    }

    pub(crate) fn envelope_idle(&self, voice: usize, module: usize) -> bool {
        match self.voice_states[voice].get(module) {
            Some(OperatorState::Envelope(state)) => state.is_idle(),
            _ => true,
        }
    }

    pub(crate) fn env_key_on(&mut self, voice: usize, module: usize) {
        if let Some(OperatorState::Envelope(state)) = self.voice_states[voice].get_mut(module) {
            state.key_on();
        }
    }

    pub(crate) fn env_key_off(&mut self, voice: usize, module: usize) {
        if let Some(OperatorState::Envelope(state)) = self.voice_states[voice].get_mut(module) {
            state.key_off();
        }
    }

    /// Fresh (non-legato) onset: oscillator phases and the per-voice LFO
    /// restart; envelopes are keyed separately.
    pub(crate) fn reset_voice_trigger_state(&mut self, voice: usize) {
        for module in [OP_OSC_A, OP_OSC_B] {
            if let Some(OperatorState::Oscillator(state)) = self.voice_states[voice].get_mut(module)
            {
                *state = Default::default();
            }
        }
        if let Some(OperatorState::Lfo(state)) = self.voice_states[voice].get_mut(OP_LFO) {
            *state = LfoState::default();
        }
    }

    /// Once-per-block work that must happen before any voice renders:
    /// clear the accumulators, snapshot the modulation scalars, scan for
    /// the highest held key, and run the shared LFO and gate the shared
    /// filter envelope off the legato-group edges.
    pub fn pre_ops(&mut self, voices: &[Voice]) {
        self.bus.fill(0.0);
        self.out_left.fill(0.0);
        self.out_right.fill(0.0);
        self.scalars = ModScalars::compute(&self.params);

        self.reference = None;
        for voice in voices {
            if !voice.held {
                continue;
            }
            let replace = match self.reference {
                None => true,
                Some((_, key)) => voice.note > key,
            };
            if replace {
                self.reference = Some((voice.index, voice.note));
            }
        }

        let held = voices.iter().filter(|voice| voice.held).count();

        if self.modes.shared_lfo {
            if held > 0 && self.shared.held_keys == 0 {
                // First voice of a legato group restarts the delay timer;
                // overlapping notes do not.
                self.shared.lfo = LfoState::default();
            }
            let ctx = RenderContext::new(self.sample_rate);
            let [lfo_buf] = self.pool.checkout([BufferId::Lfo]);
            let mut io = OperatorIo::new(lfo_buf);
            match &self.operators[OP_LFO] {
                Operator::Lfo(params) => params.operate(&mut io, &mut self.shared.lfo, &ctx),
                _ => io.output.fill(0.0),
            }
        }

        if self.modes.shared_filter {
            if held > 0 && self.shared.held_keys == 0 {
                self.shared.filter_env.key_on();
            } else if held == 0 && self.shared.held_keys > 0 {
                self.shared.filter_env.key_off();
            }
        }
        self.shared.held_keys = held;
    }

    /// Once-per-block work after the voices: the shared filter pass over
    /// the mono bus (referenced to the highest held key) and master gain.
    pub fn post_ops(&mut self) {
        if self.modes.shared_filter {
            let mut ctx = RenderContext::new(self.sample_rate);
            ctx.key_frequency = self
                .reference
                .map_or(0.0, |(_, key)| self.note_frequency(key));
            // With a per-voice LFO there is no single sweep signal that is
            // honest for the whole mix, so the shared pass takes none.
            ctx.filter_sweep = if self.modes.shared_lfo {
                self.scalars.lfo_to_vcf
            } else {
                0.0
            };

            {
                let [noise_buf] = self.pool.checkout([BufferId::Noise]);
                let mut io = OperatorIo::new(noise_buf);
                match &self.operators[OP_NOISE] {
                    Operator::Noise(params) => params.operate(&mut io, &mut self.shared.noise),
                    _ => io.output.fill(0.0),
                }
            }
            {
                let [noise_buf] = self.pool.checkout([BufferId::Noise]);
                for (bus, noise) in self.bus.iter_mut().zip(noise_buf.iter()) {
                    *bus += *noise;
                }
            }
            {
                let [env_buf] = self.pool.checkout([BufferId::Envelope]);
                let mut io = OperatorIo::new(env_buf);
                match &self.operators[OP_FILTER_ENV] {
                    Operator::Envelope(params) => {
                        params.operate(&mut io, &mut self.shared.filter_env)
                    }
                    _ => io.output.fill(0.0),
                }
            }
            {
                let [scratch, env_buf, lfo_buf] =
                    self.pool
                        .checkout([BufferId::Scratch, BufferId::Envelope, BufferId::Lfo]);
                let mut io = OperatorIo::new(scratch);
                io.source = Some(self.bus.as_slice());
                io.envelope = Some(&*env_buf);
                io.modulation = if ctx.filter_sweep != 0.0 {
                    Some(&*lfo_buf)
                } else {
                    None
                };
                match &self.operators[OP_FILTER] {
                    Operator::Filter(params) => {
                        params.operate(&mut io, &mut self.shared.filter, &ctx)
                    }
                    _ => io.output.fill(0.0),
                }
            }
            {
                let [scratch] = self.pool.checkout([BufferId::Scratch]);
                for (i, sample) in scratch.iter().enumerate() {
                    self.out_left[i] += *sample;
                    self.out_right[i] += *sample;
                }
            }
        }

        let volume = self.params.volume;
        for sample in self.out_left.iter_mut() {
            *sample *= volume;
        }
        for sample in self.out_right.iter_mut() {
            *sample *= volume;
        }
    }

    pub(crate) fn stereo_out_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.out_left, &mut self.out_right)
    }
}
