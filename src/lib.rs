#[cfg(feature = "native")]
pub mod audio;
pub mod runtime;
pub mod synth;

pub use synth::{ControlMessage, Engine, EngineConfig, EngineError, Patch, VoiceEvent};
