pub mod amp;
pub mod buffer;
pub mod controller;
pub mod delayline;
pub mod effect;
pub mod engine;
pub mod envelope;
pub mod events;
pub mod filter;
pub mod instrument;
pub mod lfo;
pub mod noise;
pub mod operator;
pub mod oscillator;
pub mod patch;
pub mod voice;
pub mod waveform;

pub use engine::{Engine, EngineConfig, EngineError};
pub use events::{ControlMessage, VoiceEvent, FULL_SCALE};
pub use patch::Patch;
