use rustvasynth::synth::controller::{global, OPERATOR_GLOBAL};
use rustvasynth::synth::instrument::OP_FILTER;
use rustvasynth::synth::patch::{Patch, PatchParam};
use rustvasynth::synth::{ControlMessage, Engine, EngineConfig, VoiceEvent};

const ON: u16 = 16383;

fn engine(block_size: usize) -> Engine {
    Engine::with_default_patch(EngineConfig {
        sample_rate: 44_100.0,
        block_size,
        voices: 8,
        seed: 11,
    })
    .unwrap()
}

fn render_left(engine: &mut Engine) -> Vec<f32> {
    let block = engine.block_size();
    let mut left = vec![0.0; block];
    let mut right = vec![0.0; block];
    engine.process(&mut left, &mut right);
    left
}

#[test]
fn patch_survives_a_json_round_trip() {
    let patch = Patch::default_dual_osc();
    let json = patch.to_json().unwrap();
    let reloaded = Patch::from_json(&json).unwrap();
    assert_eq!(patch.name, reloaded.name);
    assert_eq!(patch.messages(), reloaded.messages());
}

#[test]
fn unknown_patch_parameters_are_skipped_not_fatal() {
    let patch = Patch {
        name: "odd".to_string(),
        params: vec![
            PatchParam {
                name: "no_such.knob".to_string(),
                value: 0.5,
            },
            PatchParam {
                name: "amp.gain".to_string(),
                value: 0.4,
            },
        ],
    };
    assert_eq!(patch.messages().len(), 1);

    let mut engine = engine(64);
    engine.apply_patch(&patch);
    engine.dispatch(VoiceEvent::KeyOn {
        voice: 0,
        note: 60,
        velocity: 100,
    });
    let left = render_left(&mut engine);
    assert!(left.iter().all(|s| s.is_finite()));
}

#[test]
fn polarity_flip_resigns_the_stored_filter_depth() {
    // Setting the depth before or after flipping polarity must land in the
    // same place; the flip re-signs what is already stored.
    let mut depth_then_flip = engine(128);
    depth_then_flip.control(ControlMessage::new(OP_FILTER as u8, 3, 8000));
    depth_then_flip.control(ControlMessage::new(OPERATOR_GLOBAL, global::ENV_POLARITY, ON));

    let mut flip_then_depth = engine(128);
    flip_then_depth.control(ControlMessage::new(OPERATOR_GLOBAL, global::ENV_POLARITY, ON));
    flip_then_depth.control(ControlMessage::new(OP_FILTER as u8, 3, 8000));

    for e in [&mut depth_then_flip, &mut flip_then_depth] {
        e.dispatch(VoiceEvent::KeyOn {
            voice: 0,
            note: 52,
            velocity: 100,
        });
    }
    for _ in 0..30 {
        let a = render_left(&mut depth_then_flip);
        let b = render_left(&mut flip_then_depth);
        assert_eq!(a, b);
    }
}

fn estimated_pitch(engine: &mut Engine, seconds: f32) -> f32 {
    let block = engine.block_size();
    let blocks = (seconds * 44_100.0 / block as f32) as usize;
    let mut collected = Vec::with_capacity(blocks * block);
    for _ in 0..blocks {
        collected.extend_from_slice(&render_left(engine));
    }
    let crossings = collected
        .windows(2)
        .filter(|pair| pair[0] <= 0.0 && pair[1] > 0.0)
        .count();
    crossings as f32 / seconds
}

#[test]
fn tuning_change_retunes_notes_already_sounding() {
    let mut engine = engine(256);
    // Sine oscillator, filter wide open, long sustain.
    engine.control(ControlMessage::new(0, 0, 0));
    engine.control(ControlMessage::new(OP_FILTER as u8, 1, ON));
    engine.control(ControlMessage::new(OP_FILTER as u8, 3, 0));

    engine.dispatch(VoiceEvent::KeyOn {
        voice: 0,
        note: 69,
        velocity: 127,
    });
    // Let the attack settle before measuring.
    for _ in 0..20 {
        render_left(&mut engine);
    }
    let before = estimated_pitch(&mut engine, 2.0);
    assert!((before - 440.0).abs() < 10.0, "expected A4, got {before}");

    // Full-scale tuning = +2 semitones; the held note must follow without
    // a new key-on.
    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::TUNING, ON));
    for _ in 0..20 {
        render_left(&mut engine);
    }
    let after = estimated_pitch(&mut engine, 2.0);
    let ratio = after / before;
    let expected = (2.0f32 / 12.0).exp2();
    assert!(
        (ratio - expected).abs() < 0.02,
        "held note should re-tune smoothly, ratio {ratio}"
    );
}
