use super::buffer::BufferId;
use super::instrument::{
    Instrument, OP_AMP, OP_ENV_A, OP_ENV_B, OP_FILTER, OP_FILTER_ENV, OP_LFO, OP_NOISE, OP_OSC_A,
    OP_OSC_B,
};
use super::operator::{OperatorIo, RenderContext};

/// What happened to a voice since the previous block, decided once and
/// consumed by every stage that needs it instead of being re-derived from
/// raw flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VoiceTransition {
    /// New onset: envelopes re-attack and trigger-scoped state restarts.
    FreshOn,
    /// Legato re-trigger: envelopes re-attack from their current level,
    /// nothing else restarts.
    LegatoReOn,
    Off,
    #[default]
    Steady,
}

/// One sounding note (or, in double mode, one slot rendering two
/// oscillator layers). Owns no buffers; it indexes into the instrument's
/// per-voice state slots.
pub struct Voice {
    pub index: usize,
    pub note: u8,
    /// 0..1 scale applied by the amplifier.
    pub velocity: f32,
    /// Rendering, possibly in release.
    pub active: bool,
    /// Key physically down.
    pub held: bool,
    /// All contributing envelopes idle; the slot may be reclaimed.
    pub key_done: bool,
    pub(crate) transition: VoiceTransition,
    /// Glide state in Hz, slewing toward `target_freq`.
    pub(crate) current_freq: f32,
    pub(crate) target_freq: f32,
}

impl Voice {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            note: 0,
            velocity: 100.0 / 127.0,
            active: false,
            held: false,
            key_done: false,
            transition: VoiceTransition::Steady,
            current_freq: 0.0,
            target_freq: 0.0,
        }
    }

    pub(crate) fn key_on(&mut self, note: u8, velocity: u8, target_freq: f32) {
        self.note = note;
        self.velocity = velocity.min(127) as f32 / 127.0;
        self.held = true;
        self.active = true;
        self.key_done = false;
        self.transition = VoiceTransition::FreshOn;
        self.target_freq = target_freq;
        // Glide runs from the last pitch this slot played; a slot that
        // never sounded starts on target.
        if self.current_freq <= 0.0 {
            self.current_freq = target_freq;
        }
    }

    pub(crate) fn key_re_on(&mut self, note: u8, target_freq: f32) {
        self.note = note;
        self.held = true;
        self.key_done = false;
        self.transition = if self.active {
            VoiceTransition::LegatoReOn
        } else {
            VoiceTransition::FreshOn
        };
        self.active = true;
        self.target_freq = target_freq;
        if self.current_freq <= 0.0 {
            self.current_freq = target_freq;
        }
    }

    pub(crate) fn key_off(&mut self) {
        if self.active {
            self.held = false;
            self.transition = VoiceTransition::Off;
        }
    }

    /// Render this voice's contribution for one block.
    ///
    /// Stage order matters only where signals chain (sync propagates A→B
    /// within the block); the final accumulation is commutative across
    /// voices.
    pub(crate) fn operate(&mut self, inst: &mut Instrument) {
        let block = inst.block_len();
        let mut ctx = RenderContext::new(inst.sample_rate());
        ctx.key_frequency = inst.note_frequency(self.note);
        ctx.velocity = self.velocity;
        ctx.filter_sweep = inst.scalars.lfo_to_vcf;

        let double = inst.modes.double_oscillator;
        let transition = core::mem::replace(&mut self.transition, VoiceTransition::Steady);
        match transition {
            VoiceTransition::FreshOn => {
                inst.reset_voice_trigger_state(self.index);
                inst.env_key_on(self.index, OP_ENV_A);
                if double {
                    inst.env_key_on(self.index, OP_ENV_B);
                }
                inst.env_key_on(self.index, OP_FILTER_ENV);
            }
            VoiceTransition::LegatoReOn => {
                inst.env_key_on(self.index, OP_ENV_A);
                if double {
                    inst.env_key_on(self.index, OP_ENV_B);
                }
                inst.env_key_on(self.index, OP_FILTER_ENV);
            }
            VoiceTransition::Off => {
                inst.env_key_off(self.index, OP_ENV_A);
                inst.env_key_off(self.index, OP_ENV_B);
                inst.env_key_off(self.index, OP_FILTER_ENV);
            }
            VoiceTransition::Steady => {}
        }

        // Per-voice LFO runs first so pitch, PWM and filter stages all see
        // this block's modulation.
        if !inst.modes.shared_lfo {
            let [lfo_buf] = inst.pool.checkout([BufferId::Lfo]);
            let mut io = OperatorIo::new(lfo_buf);
            inst.operators[OP_LFO].operate(
                &mut io,
                &mut inst.voice_states[self.index][OP_LFO],
                &ctx,
            );
        }

        // Pitch: glide toward the target, then bend and LFO vibrato.
        {
            let bend_ratio = inst.scalars.bend_ratio;
            let vco_depth = inst.scalars.lfo_to_vco;
            let glide_samples = inst.params.glide * ctx.sample_rate;
            let target = self.target_freq.max(1.0);
            let mut current = if self.current_freq > 0.0 {
                self.current_freq
            } else {
                target
            };
            let step = if glide_samples >= 1.0 && current != target {
                (target / current).powf(1.0 / glide_samples)
            } else {
                current = target;
                1.0
            };

            let [freq, lfo_buf] = inst.pool.checkout([BufferId::Frequency, BufferId::Lfo]);
            for i in 0..block {
                if step != 1.0 {
                    current *= step;
                    let overshot = (step > 1.0 && current > target)
                        || (step < 1.0 && current < target);
                    if overshot {
                        current = target;
                    }
                }
                freq[i] = current * bend_ratio * (1.0 + vco_depth * lfo_buf[i]);
            }
            self.current_freq = current;
        }

        // Pulse width for both oscillators.
        {
            let pwm_depth = inst.params.pwm_depth;
            let [pwm, lfo_buf] = inst.pool.checkout([BufferId::PulseWidth, BufferId::Lfo]);
            for i in 0..block {
                pwm[i] = (0.5 + pwm_depth * lfo_buf[i]).clamp(0.05, 0.95);
            }
        }

        // Oscillator A; emits sync pulses for B when hard sync is armed.
        {
            let sync_armed = inst.modes.hard_sync && double;
            let [osc_a, freq, pwm, sync] = inst.pool.checkout([
                BufferId::OscA,
                BufferId::Frequency,
                BufferId::PulseWidth,
                BufferId::Sync,
            ]);
            let mut io = OperatorIo::new(osc_a);
            io.frequency = Some(&*freq);
            io.pulse_width = Some(&*pwm);
            if sync_armed {
                io.sync_out = Some(sync);
            }
            inst.operators[OP_OSC_A].operate(
                &mut io,
                &mut inst.voice_states[self.index][OP_OSC_A],
                &ctx,
            );
        }

        // Oscillator B, second layer of a double voice; sync resets must
        // land within this same block.
        if double {
            let [osc_b, freq, pwm, sync] = inst.pool.checkout([
                BufferId::OscB,
                BufferId::Frequency,
                BufferId::PulseWidth,
                BufferId::Sync,
            ]);
            let mut io = OperatorIo::new(osc_b);
            io.frequency = Some(&*freq);
            io.pulse_width = Some(&*pwm);
            if inst.modes.hard_sync {
                io.sync_in = Some(&*sync);
            }
            inst.operators[OP_OSC_B].operate(
                &mut io,
                &mut inst.voice_states[self.index][OP_OSC_B],
                &ctx,
            );
        }

        // Per-layer envelope then amplifier, both layers accumulating into
        // the voice premix.
        {
            let [scratch] = inst.pool.checkout([BufferId::Scratch]);
            scratch.fill(0.0);
        }
        for (osc_buf, env_module, layer_active) in [
            (BufferId::OscA, OP_ENV_A, true),
            (BufferId::OscB, OP_ENV_B, double),
        ] {
            // A layer muted mid-note (double toggled off) still advances
            // its envelope so the voice can reach KEYDONE.
            if !layer_active && inst.envelope_idle(self.index, env_module) {
                continue;
            }
            {
                let [env] = inst.pool.checkout([BufferId::Envelope]);
                let mut io = OperatorIo::new(env);
                inst.operators[env_module].operate(
                    &mut io,
                    &mut inst.voice_states[self.index][env_module],
                    &ctx,
                );
            }
            if layer_active {
                let [scratch, source, env] =
                    inst.pool
                        .checkout([BufferId::Scratch, osc_buf, BufferId::Envelope]);
                let mut io = OperatorIo::new(scratch);
                io.source = Some(&*source);
                io.envelope = Some(&*env);
                inst.operators[OP_AMP].operate(
                    &mut io,
                    &mut inst.voice_states[self.index][OP_AMP],
                    &ctx,
                );
            }
        }

        // A double voice is only reclaimable when both layers finished.
        if inst.envelope_idle(self.index, OP_ENV_A) && inst.envelope_idle(self.index, OP_ENV_B) {
            self.active = false;
            self.key_done = true;
        }

        if inst.modes.shared_filter {
            // Defer filtering to post-ops; the premix joins the mono bus.
            let [scratch] = inst.pool.checkout([BufferId::Scratch]);
            for (bus, sample) in inst.bus.iter_mut().zip(scratch.iter()) {
                *bus += *sample;
            }
        } else {
            // Dedicated noise, filter envelope and filter pass, straight
            // into the stereo accumulator.
            {
                let [noise_buf] = inst.pool.checkout([BufferId::Noise]);
                let mut io = OperatorIo::new(noise_buf);
                inst.operators[OP_NOISE].operate(
                    &mut io,
                    &mut inst.voice_states[self.index][OP_NOISE],
                    &ctx,
                );
            }
            {
                let [scratch, noise_buf] = inst.pool.checkout([BufferId::Scratch, BufferId::Noise]);
                for (sample, noise) in scratch.iter_mut().zip(noise_buf.iter()) {
                    *sample += *noise;
                }
            }
            {
                let [env] = inst.pool.checkout([BufferId::Envelope]);
                let mut io = OperatorIo::new(env);
                inst.operators[OP_FILTER_ENV].operate(
                    &mut io,
                    &mut inst.voice_states[self.index][OP_FILTER_ENV],
                    &ctx,
                );
            }
            {
                let [filtered, scratch, env, lfo_buf] = inst.pool.checkout([
                    BufferId::OscA,
                    BufferId::Scratch,
                    BufferId::Envelope,
                    BufferId::Lfo,
                ]);
                let mut io = OperatorIo::new(filtered);
                io.source = Some(&*scratch);
                io.envelope = Some(&*env);
                io.modulation = Some(&*lfo_buf);
                inst.operators[OP_FILTER].operate(
                    &mut io,
                    &mut inst.voice_states[self.index][OP_FILTER],
                    &ctx,
                );
            }
            {
                let [filtered] = inst.pool.checkout([BufferId::OscA]);
                for (i, sample) in filtered.iter().enumerate() {
                    inst.out_left[i] += *sample;
                    inst.out_right[i] += *sample;
                }
            }
        }
    }
}
