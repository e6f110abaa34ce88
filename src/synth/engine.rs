use thiserror::Error;
use tracing::{debug, info};

use super::controller;
use super::effect::EffectStage;
use super::events::{ControlMessage, VoiceEvent};
use super::instrument::Instrument;
use super::patch::Patch;
use super::voice::Voice;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal at load; rendering never reports errors.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("malformed patch: {0}")]
    PatchFormat(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Samples rendered per cycle; fixed for the life of the engine.
    pub block_size: usize,
    /// Voice slots allocated; "double" mode halves how many accept notes.
    pub voices: usize,
    /// Seed for the noise states, so replaying a control/event sequence
    /// reproduces output bit for bit.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 256,
            voices: 8,
            seed: 0xC0FF_EE00,
        }
    }
}

/// The voice engine: instrument state, voice slots and the post-mix effect
/// shims. Single-threaded and block-synchronous; events and parameter
/// messages are plain state mutation consumed at the next `process` call.
pub struct Engine {
    instrument: Instrument,
    voices: Vec<Voice>,
    effects: EffectStage,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(EngineError::InvalidConfig("sample rate must be positive"));
        }
        if config.block_size == 0 {
            return Err(EngineError::InvalidConfig("block size must be non-zero"));
        }
        if config.voices == 0 {
            return Err(EngineError::InvalidConfig("at least one voice required"));
        }

        let instrument = Instrument::new(
            config.sample_rate,
            config.block_size,
            config.voices,
            config.seed,
        );
        let voices = (0..config.voices).map(Voice::new).collect();
        info!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            voices = config.voices,
            "engine loaded"
        );
        Ok(Self {
            instrument,
            voices,
            effects: EffectStage::new(config.sample_rate),
        })
    }

    pub fn with_default_patch(config: EngineConfig) -> Result<Self, EngineError> {
        let mut engine = Self::new(config)?;
        engine.apply_patch(&Patch::default_dual_osc());
        Ok(engine)
    }

    pub fn apply_patch(&mut self, patch: &Patch) {
        for message in patch.messages() {
            self.control(message);
        }
        info!(name = %patch.name, "patch applied");
    }

    /// Accept one lifecycle event from the external voice allocator.
    pub fn dispatch(&mut self, event: VoiceEvent) {
        match event {
            VoiceEvent::KeyOn {
                voice,
                note,
                velocity,
            } => {
                if voice >= self.instrument.effective_voices() {
                    debug!(voice, "key-on beyond effective polyphony ignored");
                    return;
                }
                let target = self.instrument.note_frequency(note);
                self.voices[voice].key_on(note, velocity, target);
                debug!(voice, note, velocity, "key on");
            }
            VoiceEvent::KeyReOn { voice, note } => {
                let Some(slot) = self.voices.get_mut(voice) else {
                    debug!(voice, "re-on for unknown voice ignored");
                    return;
                };
                let target = self.instrument.note_frequency(note);
                slot.key_re_on(note, target);
                debug!(voice, note, "key re-on");
            }
            VoiceEvent::KeyOff { voice } => {
                let Some(slot) = self.voices.get_mut(voice) else {
                    debug!(voice, "key-off for unknown voice ignored");
                    return;
                };
                slot.key_off();
                debug!(voice, "key off");
            }
        }
    }

    /// Accept one parameter message. Pure state mutation; takes effect at
    /// the next block.
    pub fn control(&mut self, message: ControlMessage) {
        controller::apply(
            &mut self.instrument,
            &mut self.voices,
            &mut self.effects,
            message,
        );
    }

    /// Render one block into the two channel slices. The slices should be
    /// exactly `block_size` long; anything shorter is filled as far as it
    /// goes.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.instrument.pre_ops(&self.voices);
        for voice in self.voices.iter_mut() {
            if voice.active {
                voice.operate(&mut self.instrument);
            }
        }
        self.instrument.post_ops();

        let (out_left, out_right) = self.instrument.stereo_out_mut();
        self.effects.process(out_left, out_right);

        let frames = out_left.len().min(left.len()).min(right.len());
        left[..frames].copy_from_slice(&out_left[..frames]);
        right[..frames].copy_from_slice(&out_right[..frames]);
    }

    pub fn block_size(&self) -> usize {
        self.instrument.block_len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.instrument.sample_rate()
    }

    /// Voice slots currently accepting fresh notes.
    pub fn effective_voices(&self) -> usize {
        self.instrument.effective_voices()
    }

    pub fn max_voices(&self) -> usize {
        self.instrument.max_voices()
    }

    pub fn voice_active(&self, voice: usize) -> bool {
        self.voices.get(voice).is_some_and(|v| v.active)
    }

    /// True once every contributing envelope of the voice has finished;
    /// the allocator may hand the slot out again.
    pub fn voice_done(&self, voice: usize) -> bool {
        self.voices.get(voice).is_some_and(|v| v.key_done)
    }

    /// Key the shared filter pass is tracking, if any key is held.
    pub fn reference_key(&self) -> Option<u8> {
        self.instrument.reference_key()
    }

    pub fn note_frequency(&self, note: u8) -> f32 {
        self.instrument.note_frequency(note)
    }
}
