use rustvasynth::synth::controller::{global, OPERATOR_GLOBAL};
use rustvasynth::synth::operator::{OperatorIo, RenderContext};
use rustvasynth::synth::oscillator::{Oscillator, OscillatorState};
use rustvasynth::synth::waveform::Waveform;
use rustvasynth::synth::{ControlMessage, Engine, EngineConfig, VoiceEvent};

const ON: u16 = 16383;

fn run_pair(
    freq_a: f32,
    freq_b: f32,
    synced: bool,
    frames: usize,
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let ctx = RenderContext::new(48_000.0);
    let osc = Oscillator::new(Waveform::Sawtooth);

    let freq_buf_a = vec![freq_a; frames];
    let freq_buf_b = vec![freq_b; frames];
    let mut sync = vec![0.0; frames];
    let mut out_a = vec![0.0; frames];
    let mut out_b = vec![0.0; frames];

    let mut state_a = OscillatorState::default();
    {
        let mut io = OperatorIo::new(&mut out_a);
        io.frequency = Some(freq_buf_a.as_slice());
        io.sync_out = Some(sync.as_mut_slice());
        osc.operate(&mut io, &mut state_a, &ctx);
    }
    let mut state_b = OscillatorState::default();
    {
        let mut io = OperatorIo::new(&mut out_b);
        io.frequency = Some(freq_buf_b.as_slice());
        if synced {
            io.sync_in = Some(sync.as_slice());
        }
        osc.operate(&mut io, &mut state_b, &ctx);
    }
    (out_a, out_b, sync)
}

#[test]
fn hard_sync_resets_the_follower_at_each_pulse() {
    let frames = 2048;
    let (_, out_b, sync) = run_pair(440.0, 657.0, true, frames);

    let pulses: Vec<usize> = (0..frames).filter(|&i| sync[i] > 0.5).collect();
    assert!(pulses.len() > 10, "expected sync pulses in the block");

    // At every pulse the follower restarts its cycle: a saw one step past
    // phase zero.
    let step_b = 657.0 / 48_000.0;
    let reset_value = 2.0 * step_b - 1.0;
    for &i in &pulses {
        assert!(
            (out_b[i] - reset_value).abs() < 1e-4,
            "follower did not reset at pulse {i}: {}",
            out_b[i]
        );
    }
}

#[test]
fn sync_round_trip_reproduces_the_phase_pattern() {
    let frames = 1024;
    let (_, synced_once, _) = run_pair(440.0, 657.0, true, frames);
    let (_, free_run, _) = run_pair(440.0, 657.0, false, frames);
    let (_, synced_again, _) = run_pair(440.0, 657.0, true, frames);

    assert_ne!(synced_once, free_run, "sync should change the follower");
    assert_eq!(
        synced_once, synced_again,
        "re-enabling sync with identical frequencies must reproduce the pattern"
    );
}

fn engine_with_shared_filter() -> Engine {
    let mut engine = Engine::with_default_patch(EngineConfig {
        sample_rate: 44_100.0,
        block_size: 128,
        voices: 8,
        seed: 7,
    })
    .unwrap();
    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::SHARED_FILTER, ON));
    engine
}

fn render(engine: &mut Engine) {
    let block = engine.block_size();
    let mut left = vec![0.0; block];
    let mut right = vec![0.0; block];
    engine.process(&mut left, &mut right);
}

#[test]
fn shared_filter_tracks_the_highest_held_key() {
    let mut engine = engine_with_shared_filter();

    for (voice, note) in [(0usize, 60u8), (1, 64), (2, 67)] {
        engine.dispatch(VoiceEvent::KeyOn {
            voice,
            note,
            velocity: 100,
        });
    }
    render(&mut engine);
    assert_eq!(engine.reference_key(), Some(67));

    // Releasing the top note hands tracking to the next highest.
    engine.dispatch(VoiceEvent::KeyOff { voice: 2 });
    render(&mut engine);
    assert_eq!(engine.reference_key(), Some(64));

    // A new higher note takes over, even while lower notes ring on.
    engine.dispatch(VoiceEvent::KeyOn {
        voice: 3,
        note: 72,
        velocity: 100,
    });
    render(&mut engine);
    assert_eq!(engine.reference_key(), Some(72));

    engine.dispatch(VoiceEvent::KeyOff { voice: 3 });
    render(&mut engine);
    assert_eq!(engine.reference_key(), Some(64));

    // Re-pressing the old top note restores it.
    engine.dispatch(VoiceEvent::KeyOn {
        voice: 2,
        note: 67,
        velocity: 100,
    });
    render(&mut engine);
    assert_eq!(engine.reference_key(), Some(67));

    engine.dispatch(VoiceEvent::KeyOff { voice: 0 });
    engine.dispatch(VoiceEvent::KeyOff { voice: 1 });
    engine.dispatch(VoiceEvent::KeyOff { voice: 2 });
    render(&mut engine);
    assert_eq!(engine.reference_key(), None);
}

#[test]
fn legato_retrigger_does_not_jump_the_output() {
    let mut engine = Engine::with_default_patch(EngineConfig {
        sample_rate: 44_100.0,
        block_size: 64,
        voices: 4,
        seed: 3,
    })
    .unwrap();

    // Sine layer: the raw waveform has no cliffs of its own, so any seam
    // larger than the per-sample slew is a genuine retrigger glitch.
    engine.control(ControlMessage::new(0, 0, 0));
    engine.dispatch(VoiceEvent::KeyOn {
        voice: 0,
        note: 60,
        velocity: 110,
    });

    let mut previous_tail = 0.0f32;
    let mut max_seam_jump = 0.0f32;
    for cycle in 0..200 {
        if cycle == 50 {
            engine.dispatch(VoiceEvent::KeyReOn { voice: 0, note: 62 });
        }
        if cycle == 120 {
            engine.dispatch(VoiceEvent::KeyReOn { voice: 0, note: 59 });
        }
        let mut left = vec![0.0; 64];
        let mut right = vec![0.0; 64];
        engine.process(&mut left, &mut right);

        if cycle > 0 {
            let seam = (left[0] - previous_tail).abs();
            max_seam_jump = max_seam_jump.max(seam);
        }
        previous_tail = left[63];
    }

    assert!(
        max_seam_jump < 0.08,
        "legato transition produced a discontinuity of {max_seam_jump}"
    );
}

#[test]
fn voice_reports_done_only_after_all_layers_finish() {
    let mut engine = Engine::with_default_patch(EngineConfig {
        sample_rate: 44_100.0,
        block_size: 128,
        voices: 4,
        seed: 9,
    })
    .unwrap();
    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::DOUBLE, ON));

    engine.dispatch(VoiceEvent::KeyOn {
        voice: 0,
        note: 57,
        velocity: 100,
    });
    for _ in 0..20 {
        render(&mut engine);
    }
    assert!(engine.voice_active(0));
    assert!(!engine.voice_done(0));

    engine.dispatch(VoiceEvent::KeyOff { voice: 0 });
    for _ in 0..400 {
        render(&mut engine);
    }
    assert!(engine.voice_done(0), "released voice should reach KEYDONE");
    assert!(!engine.voice_active(0));
}
