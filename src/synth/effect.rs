use freeverb::Freeverb;
use tracing::debug;

use super::delayline::Chorus;

/// Post-mix effect stage addressed by operators 100 (chorus) and 99
/// (reverb). Both default to fully dry so a bare engine passes audio
/// through untouched.
pub struct EffectStage {
    chorus: Chorus,
    reverb: Freeverb,
}

impl EffectStage {
    pub fn new(sample_rate: f32) -> Self {
        let mut reverb = Freeverb::new(sample_rate as usize);
        reverb.set_room_size(0.5);
        reverb.set_dampening(0.5);
        reverb.set_width(1.0);
        reverb.set_wet(0.0);
        reverb.set_dry(1.0);
        Self {
            chorus: Chorus::new(sample_rate),
            reverb,
        }
    }

    pub fn reverb_control(&mut self, controller: u8, value: f32) {
        match controller {
            0 => self.reverb.set_room_size(value as f64),
            1 => self.reverb.set_dampening(value as f64),
            2 => {
                self.reverb.set_wet(value as f64);
                self.reverb.set_dry(1.0 - 0.5 * value as f64);
            }
            3 => self.reverb.set_width(value as f64),
            controller => debug!(controller, "unknown reverb controller dropped"),
        }
    }

    pub fn chorus_control(&mut self, controller: u8, value: f32) {
        match controller {
            0 => self.chorus.set_rate(value * 5.0),
            1 => self.chorus.set_depth(value),
            2 => self.chorus.mix = value,
            controller => debug!(controller, "unknown chorus controller dropped"),
        }
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.chorus.process(left, right);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (wet_l, wet_r) = self.reverb.tick((*l as f64, *r as f64));
            *l = wet_l as f32;
            *r = wet_r as f32;
        }
    }
}
