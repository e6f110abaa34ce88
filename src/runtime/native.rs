use std::sync::mpsc::Receiver;

use crate::synth::{ControlMessage, Engine, VoiceEvent};

/// Native host wrapping the engine with asynchronous control channels.
///
/// Events and parameter messages arrive from other threads but are drained
/// here, on the render thread, immediately before each block — so every
/// update lands on a block boundary and never mid-block.
pub struct SynthHost {
    engine: Engine,
    voice_receiver: Receiver<VoiceEvent>,
    control_receiver: Receiver<ControlMessage>,
}

impl SynthHost {
    pub fn new(
        engine: Engine,
        voice_receiver: Receiver<VoiceEvent>,
        control_receiver: Receiver<ControlMessage>,
    ) -> Self {
        Self {
            engine,
            voice_receiver,
            control_receiver,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Drain pending updates, then render one block.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        while let Ok(message) = self.control_receiver.try_recv() {
            self.engine.control(message);
        }
        while let Ok(event) = self.voice_receiver.try_recv() {
            self.engine.dispatch(event);
        }
        self.engine.process(left, right);
    }

    pub fn block_size(&self) -> usize {
        self.engine.block_size()
    }
}
