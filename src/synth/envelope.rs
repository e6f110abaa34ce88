use super::operator::OperatorIo;

/// Stage of the five-state envelope machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    #[default]
    Idle,
}

/// Envelope rates, expressed in samples for the full-scale excursion.
///
/// Attack always climbs toward 1.0 from wherever the level currently is,
/// which is what makes a legato re-trigger click-free: the slope is the
/// same, only the starting point differs.
#[derive(Clone, Debug)]
pub struct EnvelopeGenerator {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self {
            attack: 441.0,
            decay: 4410.0,
            sustain: 0.7,
            release: 8820.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EnvelopeState {
    pub stage: EnvelopeStage,
    pub level: f32,
}

impl EnvelopeState {
    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Enter attack from the current level. Used for both a fresh key-on
    /// and a legato re-trigger; neither resets the level to zero.
    pub fn key_on(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    pub fn key_off(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }
}

impl EnvelopeGenerator {
    pub fn set_rates(&mut self, attack: f32, decay: f32, sustain: f32, release: f32) {
        self.attack = attack.max(1.0);
        self.decay = decay.max(1.0);
        self.sustain = sustain.clamp(0.0, 1.0);
        self.release = release.max(1.0);
    }

    /// Fill the output with the envelope level, advancing one sample per
    /// frame. Levels move in per-sample linear steps, so a block boundary
    /// is never audible.
    pub fn operate(&self, io: &mut OperatorIo<'_>, state: &mut EnvelopeState) {
        for sample in io.output.iter_mut() {
            self.step(state);
            *sample = state.level;
        }
    }

    fn step(&self, state: &mut EnvelopeState) {
        let sustain = self.sustain.clamp(0.0, 1.0);
        match state.stage {
            EnvelopeStage::Attack => {
                state.level += 1.0 / self.attack.max(1.0);
                if state.level >= 1.0 {
                    state.level = 1.0;
                    state.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let step = (1.0 - sustain) / self.decay.max(1.0);
                state.level -= step;
                if step <= 0.0 || state.level <= sustain {
                    state.level = sustain;
                    state.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                // Track a sustain level changed mid-note at the decay rate
                // instead of jumping to it.
                let step = 1.0 / self.decay.max(1.0);
                if state.level > sustain + step {
                    state.level -= step;
                } else if state.level < sustain - step {
                    state.level += step;
                } else {
                    state.level = sustain;
                }
            }
            EnvelopeStage::Release => {
                state.level -= 1.0 / self.release.max(1.0);
                if state.level <= 0.0 {
                    state.level = 0.0;
                    state.stage = EnvelopeStage::Idle;
                }
            }
            EnvelopeStage::Idle => {
                state.level = 0.0;
            }
        }
    }
}
