pub mod cpal_backend;

pub use cpal_backend::CpalBackend;

/// Contract the host keeps with any audio output implementation.
pub trait AudioBackend {
    fn start(&mut self);
    fn stop(&mut self);
}
