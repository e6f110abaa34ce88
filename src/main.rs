use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rustvasynth::audio::{AudioBackend, CpalBackend};
use rustvasynth::runtime::SynthHost;
use rustvasynth::synth::controller::OPERATOR_CHORUS;
use rustvasynth::synth::{ControlMessage, Engine, EngineConfig, VoiceEvent};

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let sample_rate =
        CpalBackend::default_sample_rate().map_err(|err| anyhow!(err.to_string()))?;
    let engine = Engine::with_default_patch(EngineConfig {
        sample_rate,
        ..Default::default()
    })?;

    let (voice_tx, voice_rx) = channel();
    let (control_tx, control_rx) = channel();
    let host = Arc::new(Mutex::new(SynthHost::new(engine, voice_rx, control_rx)));

    let mut backend = CpalBackend::new(host.clone());
    backend.start();

    // A little chorus sweetening for the demo.
    control_tx.send(ControlMessage::new(OPERATOR_CHORUS, 2, 5000))?;

    // Minimal stand-in for the external voice allocator: walk an arpeggio,
    // preferring slots the engine has flagged KEYDONE.
    let notes = [48u8, 60, 63, 67, 70, 72, 70, 67, 63, 60];
    let mut round_robin = 0usize;
    for &note in notes.iter().cycle().take(40) {
        let voice = {
            let host = host.lock().unwrap();
            let engine = host.engine();
            (0..engine.effective_voices())
                .find(|&v| !engine.voice_active(v) || engine.voice_done(v))
                .unwrap_or(round_robin % engine.effective_voices())
        };
        round_robin += 1;

        voice_tx.send(VoiceEvent::KeyOn {
            voice,
            note,
            velocity: 100,
        })?;
        std::thread::sleep(Duration::from_millis(180));
        voice_tx.send(VoiceEvent::KeyOff { voice })?;
    }

    // Let the release tails and reverb ring out.
    std::thread::sleep(Duration::from_secs(2));
    backend.stop();
    Ok(())
}
