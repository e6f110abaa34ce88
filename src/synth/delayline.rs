use core::f32::consts::TAU;

const MIN_DELAY_SAMPLES: f32 = 1.0;

/// Fractional delay line whose read position is swept by an internal sine
/// LFO. The write head advances one sample per `process` call; reads use
/// linear interpolation between the two nearest samples.
#[derive(Clone, Debug)]
pub struct ModDelay {
    buffer: Vec<f32>,
    write_pos: usize,
    base_delay: f32,
    depth: f32,
    lfo_phase: f32,
    lfo_step: f32,
}

impl ModDelay {
    /// `max_delay` bounds base delay plus modulation; the buffer is sized
    /// once here and never grows.
    pub fn new(max_delay: usize, base_delay: f32, lfo_phase: f32) -> Self {
        let len = max_delay.max(4);
        Self {
            buffer: vec![0.0; len],
            write_pos: 0,
            base_delay: base_delay.max(MIN_DELAY_SAMPLES),
            depth: 0.0,
            lfo_phase: lfo_phase.rem_euclid(1.0),
            lfo_step: 0.0,
        }
    }

    pub fn set_rate(&mut self, hz: f32, sample_rate: f32) {
        self.lfo_step = (hz / sample_rate.max(1.0)).clamp(0.0, 0.5);
    }

    pub fn set_depth(&mut self, samples: f32) {
        let limit = self.buffer.len() as f32 - 2.0 - self.base_delay;
        self.depth = samples.clamp(0.0, limit.max(0.0));
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let lfo = (self.lfo_phase * TAU).sin();
        self.lfo_phase += self.lfo_step;
        if self.lfo_phase >= 1.0 {
            self.lfo_phase -= 1.0;
        }

        let len = self.buffer.len() as f32;
        let delay = (self.base_delay + lfo * self.depth).clamp(MIN_DELAY_SAMPLES, len - 2.0);

        let read_pos = (self.write_pos as f32 - delay).rem_euclid(len);
        let idx0 = read_pos.floor() as usize;
        let idx1 = (idx0 + 1) % self.buffer.len();
        let fraction = read_pos - read_pos.floor();
        let output = self.buffer[idx0] + fraction * (self.buffer[idx1] - self.buffer[idx0]);

        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        output
    }
}

/// Stereo chorus: one modulated delay per channel with quadrature LFO
/// phases so the two channels drift apart.
pub struct Chorus {
    left: ModDelay,
    right: ModDelay,
    sample_rate: f32,
    pub mix: f32,
}

impl Chorus {
    pub fn new(sample_rate: f32) -> Self {
        let base = sample_rate * 0.012;
        let max = (sample_rate * 0.05) as usize;
        let mut chorus = Self {
            left: ModDelay::new(max, base, 0.0),
            right: ModDelay::new(max, base, 0.25),
            sample_rate,
            mix: 0.0,
        };
        chorus.set_rate(0.8);
        chorus.set_depth(0.25);
        chorus
    }

    pub fn set_rate(&mut self, hz: f32) {
        self.left.set_rate(hz, self.sample_rate);
        self.right.set_rate(hz, self.sample_rate);
    }

    /// Depth as a 0..1 fraction of the available sweep.
    pub fn set_depth(&mut self, amount: f32) {
        let samples = amount.clamp(0.0, 1.0) * self.sample_rate * 0.008;
        self.left.set_depth(samples);
        self.right.set_depth(samples);
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.mix <= 0.0 {
            // Keep the delay lines warm so enabling the mix mid-stream
            // does not replay stale audio.
            for (l, r) in left.iter().zip(right.iter()) {
                self.left.process(*l);
                self.right.process(*r);
            }
            return;
        }
        let mix = self.mix.clamp(0.0, 1.0);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let wet_l = self.left.process(*l);
            let wet_r = self.right.process(*r);
            *l = *l * (1.0 - mix) + wet_l * mix;
            *r = *r * (1.0 - mix) + wet_r * mix;
        }
    }
}
