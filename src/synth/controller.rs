use tracing::debug;

use super::effect::EffectStage;
use super::events::ControlMessage;
use super::filter::FilterMode;
use super::instrument::{Instrument, OPERATOR_COUNT, OP_LFO};
use super::operator::Operator;
use super::voice::Voice;
use super::waveform::Waveform;

pub const OPERATOR_REVERB: u8 = 99;
pub const OPERATOR_CHORUS: u8 = 100;
pub const OPERATOR_GLOBAL: u8 = 126;

/// Controller numbers understood by the instrument-global operator (126).
pub mod global {
    pub const GLIDE: u8 = 0;
    pub const TUNING: u8 = 1;
    pub const VOLUME: u8 = 2;
    pub const BEND_DEPTH: u8 = 3;
    pub const BEND: u8 = 4;
    pub const PWM_DEPTH: u8 = 5;
    pub const MOD_DEPTH: u8 = 6;
    pub const MOD_ROUTING: u8 = 7;
    pub const LFO_RATE: u8 = 8;
    pub const LFO_DELAY: u8 = 9;
    pub const DOUBLE: u8 = 10;
    pub const SHARED_LFO: u8 = 11;
    pub const SHARED_FILTER: u8 = 12;
    pub const HARD_SYNC: u8 = 13;
    pub const ENV_POLARITY: u8 = 14;
}

// Full-scale spans for scaled controllers.
const GLIDE_MAX_S: f32 = 10.0;
const TUNING_SPAN_SEMIS: f32 = 2.0;
const BEND_SPAN_SEMIS: f32 = 12.0;
const PWM_SPAN: f32 = 0.45;
const LFO_RATE_MAX_HZ: f32 = 20.0;
const LFO_DELAY_MAX_S: f32 = 2.0;
const OSC_TRANSPOSE_SPAN_SEMIS: f32 = 24.0;
const OSC_DETUNE_SPAN_CENTS: f32 = 100.0;
const ENV_ATTACK_MAX_S: f32 = 2.0;
const ENV_DECAY_MAX_S: f32 = 5.0;
const ENV_RELEASE_MAX_S: f32 = 5.0;
const FILTER_CUTOFF_MIN_HZ: f32 = 20.0;
const FILTER_CUTOFF_SPAN_HZ: f32 = 8000.0;
const FILTER_ENV_SPAN_HZ: f32 = 6000.0;

/// Pure state mutation: map one `(operator, controller, value)` triple onto
/// instrument, module or effect parameters. No audio is rendered here and
/// nothing is ever rejected for range; values clamp.
pub(crate) fn apply(
    inst: &mut Instrument,
    voices: &mut [Voice],
    effects: &mut EffectStage,
    msg: ControlMessage,
) {
    match msg.operator {
        OPERATOR_REVERB => effects.reverb_control(msg.controller, msg.normalized()),
        OPERATOR_CHORUS => effects.chorus_control(msg.controller, msg.normalized()),
        OPERATOR_GLOBAL => apply_global(inst, voices, msg),
        operator if (operator as usize) < OPERATOR_COUNT => {
            apply_module(inst, operator as usize, msg)
        }
        operator => debug!(operator, "message for unknown operator dropped"),
    }
}

fn apply_global(inst: &mut Instrument, voices: &mut [Voice], msg: ControlMessage) {
    let n = msg.normalized();
    let sample_rate = inst.sample_rate();
    match msg.controller {
        global::GLIDE => inst.params.glide = n * GLIDE_MAX_S,
        global::TUNING => {
            let ratio = (msg.bipolar() * TUNING_SPAN_SEMIS / 12.0).exp2();
            inst.set_tuning(ratio, voices);
        }
        global::VOLUME => inst.params.volume = n,
        global::BEND_DEPTH => inst.params.bend_depth = n * BEND_SPAN_SEMIS,
        global::BEND => inst.params.bend = msg.bipolar(),
        global::PWM_DEPTH => inst.params.pwm_depth = n * PWM_SPAN,
        global::MOD_DEPTH => inst.params.mod_depth = n,
        global::MOD_ROUTING => inst.params.mod_routing = msg.bipolar(),
        global::LFO_RATE => {
            if let Some(Operator::Lfo(lfo)) = inst.operators.get_mut(OP_LFO) {
                lfo.rate = n * LFO_RATE_MAX_HZ;
            }
        }
        global::LFO_DELAY => {
            if let Some(Operator::Lfo(lfo)) = inst.operators.get_mut(OP_LFO) {
                lfo.delay = n * LFO_DELAY_MAX_S * sample_rate;
            }
        }
        global::DOUBLE => inst.set_double(msg.is_on()),
        global::SHARED_LFO => inst.modes.shared_lfo = msg.is_on(),
        global::SHARED_FILTER => inst.modes.shared_filter = msg.is_on(),
        global::HARD_SYNC => inst.modes.hard_sync = msg.is_on(),
        global::ENV_POLARITY => inst.set_envelope_polarity(msg.is_on()),
        controller => debug!(controller, "unknown global controller dropped"),
    }
}

fn apply_module(inst: &mut Instrument, module: usize, msg: ControlMessage) {
    let n = msg.normalized();
    let sample_rate = inst.sample_rate();
    let inverted = inst.modes.inverted_envelope;
    match inst.operators.get_mut(module) {
        Some(Operator::Oscillator(osc)) => match msg.controller {
            0 => osc.waveform = Waveform::from_normalized(n),
            1 => osc.transpose = msg.bipolar() * OSC_TRANSPOSE_SPAN_SEMIS,
            2 => osc.detune = msg.bipolar() * OSC_DETUNE_SPAN_CENTS,
            3 => osc.gain = n,
            controller => debug!(module, controller, "unknown oscillator controller"),
        },
        Some(Operator::Envelope(env)) => match msg.controller {
            0 => env.attack = (n * ENV_ATTACK_MAX_S * sample_rate).max(1.0),
            1 => env.decay = (n * ENV_DECAY_MAX_S * sample_rate).max(1.0),
            2 => env.sustain = n,
            3 => env.release = (n * ENV_RELEASE_MAX_S * sample_rate).max(1.0),
            controller => debug!(module, controller, "unknown envelope controller"),
        },
        Some(Operator::Filter(filter)) => match msg.controller {
            0 => {
                filter.mode = match (n * 2.0).round() as u32 {
                    0 => FilterMode::LowPass,
                    1 => FilterMode::BandPass,
                    _ => FilterMode::HighPass,
                }
            }
            1 => filter.cutoff = FILTER_CUTOFF_MIN_HZ + n * FILTER_CUTOFF_SPAN_HZ,
            2 => filter.resonance = n,
            3 => {
                // The stored depth carries the polarity sign so a later
                // polarity flip can re-sign it without re-touching this
                // controller.
                let sign = if inverted { -1.0 } else { 1.0 };
                filter.env_depth = sign * n * FILTER_ENV_SPAN_HZ;
            }
            4 => filter.key_track = n,
            controller => debug!(module, controller, "unknown filter controller"),
        },
        Some(Operator::Amplifier(amp)) => match msg.controller {
            0 => amp.gain = n,
            controller => debug!(module, controller, "unknown amplifier controller"),
        },
        Some(Operator::Noise(noise)) => match msg.controller {
            0 => noise.gain = n,
            controller => debug!(module, controller, "unknown noise controller"),
        },
        Some(Operator::Lfo(lfo)) => match msg.controller {
            0 => lfo.waveform = Waveform::from_normalized(n),
            1 => lfo.rate = n * LFO_RATE_MAX_HZ,
            2 => lfo.delay = n * LFO_DELAY_MAX_S * sample_rate,
            controller => debug!(module, controller, "unknown LFO controller"),
        },
        None => debug!(module, "message for missing module dropped"),
    }
}
