use serde::{Deserialize, Serialize};
use tracing::warn;

use super::controller::{global, OPERATOR_CHORUS, OPERATOR_GLOBAL, OPERATOR_REVERB};
use super::events::{ControlMessage, FULL_SCALE};
use super::instrument::{
    OP_AMP, OP_ENV_A, OP_ENV_B, OP_FILTER, OP_FILTER_ENV, OP_LFO, OP_NOISE, OP_OSC_A, OP_OSC_B,
};

/// A patch is a flat list of named float parameters on the 0..1 scale.
/// The engine never reads files itself; whoever loads the patch pushes it
/// through the parameter controller as plain messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patch {
    pub name: String,
    pub params: Vec<PatchParam>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchParam {
    pub name: String,
    pub value: f32,
}

impl Patch {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Translate the named parameters into controller messages. Unknown
    /// names are skipped with a warning; a patch never fails to apply.
    pub fn messages(&self) -> Vec<ControlMessage> {
        let mut messages = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match address_of(&param.name) {
                Some((operator, controller)) => {
                    let value = (param.value.clamp(0.0, 1.0) * FULL_SCALE as f32).round() as u16;
                    messages.push(ControlMessage::new(operator, controller, value));
                }
                None => warn!(name = %param.name, "unknown patch parameter skipped"),
            }
        }
        messages
    }

    /// The representative dual-oscillator instrument: two saws, a gentle
    /// filter sweep and a shared LFO.
    pub fn default_dual_osc() -> Self {
        let params = [
            ("osc_a.waveform", 0.5),
            ("osc_a.gain", 1.0),
            ("osc_b.waveform", 0.5),
            ("osc_b.gain", 1.0),
            ("env_a.attack", 0.01),
            ("env_a.decay", 0.06),
            ("env_a.sustain", 0.7),
            ("env_a.release", 0.08),
            ("env_b.attack", 0.01),
            ("env_b.decay", 0.06),
            ("env_b.sustain", 0.7),
            ("env_b.release", 0.08),
            ("amp.gain", 0.5),
            ("filter_env.attack", 0.02),
            ("filter_env.decay", 0.12),
            ("filter_env.sustain", 0.35),
            ("filter_env.release", 0.1),
            ("filter.mode", 0.0),
            ("filter.cutoff", 0.28),
            ("filter.resonance", 0.25),
            ("filter.env_depth", 0.5),
            ("filter.key_track", 0.3),
            ("lfo.waveform", 0.25),
            ("noise.gain", 0.0),
            ("global.volume", 0.7),
            ("global.bend_depth", 0.1667),
            ("global.lfo_rate", 0.25),
            ("global.shared_lfo", 1.0),
            ("reverb.wet", 0.0),
            ("chorus.mix", 0.0),
        ];
        Self {
            name: "dual saw".to_string(),
            params: params
                .into_iter()
                .map(|(name, value)| PatchParam {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }
}

fn address_of(name: &str) -> Option<(u8, u8)> {
    let module_address = |module: usize, controller: u8| Some((module as u8, controller));
    match name {
        "osc_a.waveform" => module_address(OP_OSC_A, 0),
        "osc_a.transpose" => module_address(OP_OSC_A, 1),
        "osc_a.detune" => module_address(OP_OSC_A, 2),
        "osc_a.gain" => module_address(OP_OSC_A, 3),
        "osc_b.waveform" => module_address(OP_OSC_B, 0),
        "osc_b.transpose" => module_address(OP_OSC_B, 1),
        "osc_b.detune" => module_address(OP_OSC_B, 2),
        "osc_b.gain" => module_address(OP_OSC_B, 3),
        "env_a.attack" => module_address(OP_ENV_A, 0),
        "env_a.decay" => module_address(OP_ENV_A, 1),
        "env_a.sustain" => module_address(OP_ENV_A, 2),
        "env_a.release" => module_address(OP_ENV_A, 3),
        "env_b.attack" => module_address(OP_ENV_B, 0),
        "env_b.decay" => module_address(OP_ENV_B, 1),
        "env_b.sustain" => module_address(OP_ENV_B, 2),
        "env_b.release" => module_address(OP_ENV_B, 3),
        "amp.gain" => module_address(OP_AMP, 0),
        "filter_env.attack" => module_address(OP_FILTER_ENV, 0),
        "filter_env.decay" => module_address(OP_FILTER_ENV, 1),
        "filter_env.sustain" => module_address(OP_FILTER_ENV, 2),
        "filter_env.release" => module_address(OP_FILTER_ENV, 3),
        "filter.mode" => module_address(OP_FILTER, 0),
        "filter.cutoff" => module_address(OP_FILTER, 1),
        "filter.resonance" => module_address(OP_FILTER, 2),
        "filter.env_depth" => module_address(OP_FILTER, 3),
        "filter.key_track" => module_address(OP_FILTER, 4),
        "lfo.waveform" => module_address(OP_LFO, 0),
        "lfo.rate" => module_address(OP_LFO, 1),
        "lfo.delay" => module_address(OP_LFO, 2),
        "noise.gain" => module_address(OP_NOISE, 0),
        "global.glide" => Some((OPERATOR_GLOBAL, global::GLIDE)),
        "global.tuning" => Some((OPERATOR_GLOBAL, global::TUNING)),
        "global.volume" => Some((OPERATOR_GLOBAL, global::VOLUME)),
        "global.bend_depth" => Some((OPERATOR_GLOBAL, global::BEND_DEPTH)),
        "global.bend" => Some((OPERATOR_GLOBAL, global::BEND)),
        "global.pwm_depth" => Some((OPERATOR_GLOBAL, global::PWM_DEPTH)),
        "global.mod_depth" => Some((OPERATOR_GLOBAL, global::MOD_DEPTH)),
        "global.mod_routing" => Some((OPERATOR_GLOBAL, global::MOD_ROUTING)),
        "global.lfo_rate" => Some((OPERATOR_GLOBAL, global::LFO_RATE)),
        "global.lfo_delay" => Some((OPERATOR_GLOBAL, global::LFO_DELAY)),
        "global.double" => Some((OPERATOR_GLOBAL, global::DOUBLE)),
        "global.shared_lfo" => Some((OPERATOR_GLOBAL, global::SHARED_LFO)),
        "global.shared_filter" => Some((OPERATOR_GLOBAL, global::SHARED_FILTER)),
        "global.hard_sync" => Some((OPERATOR_GLOBAL, global::HARD_SYNC)),
        "global.env_polarity" => Some((OPERATOR_GLOBAL, global::ENV_POLARITY)),
        "reverb.room_size" => Some((OPERATOR_REVERB, 0)),
        "reverb.damping" => Some((OPERATOR_REVERB, 1)),
        "reverb.wet" => Some((OPERATOR_REVERB, 2)),
        "reverb.width" => Some((OPERATOR_REVERB, 3)),
        "chorus.rate" => Some((OPERATOR_CHORUS, 0)),
        "chorus.depth" => Some((OPERATOR_CHORUS, 1)),
        "chorus.mix" => Some((OPERATOR_CHORUS, 2)),
        _ => None,
    }
}
