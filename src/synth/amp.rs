use super::operator::{OperatorIo, RenderContext};

/// Digitally-controlled amplifier: source times envelope times gain times
/// velocity, accumulated into the output so several layers can land in the
/// same mix buffer.
pub struct Amplifier {
    pub gain: f32,
}

/// The amplifier is stateless; the unit slot keeps (voice, module)
/// addressing uniform across the operator list.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmplifierState;

impl Amplifier {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn operate(&self, io: &mut OperatorIo<'_>, ctx: &RenderContext) {
        let gain = self.gain * ctx.velocity;
        for (i, sample) in io.output.iter_mut().enumerate() {
            let source = io.source.map_or(0.0, |source| source[i]);
            let envelope = io.envelope.map_or(1.0, |envelope| envelope[i]);
            *sample += source * envelope * gain;
        }
    }
}
