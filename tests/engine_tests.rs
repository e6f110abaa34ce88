use rustvasynth::synth::controller::{global, OPERATOR_GLOBAL};
use rustvasynth::synth::instrument::{OP_ENV_A, OP_FILTER, OP_NOISE, OP_OSC_A, OP_OSC_B};
use rustvasynth::synth::{ControlMessage, Engine, EngineConfig, VoiceEvent};

const ON: u16 = 16383;
const OFF: u16 = 0;

fn test_config(block_size: usize) -> EngineConfig {
    EngineConfig {
        sample_rate: 44_100.0,
        block_size,
        voices: 8,
        seed: 42,
    }
}

fn render_block(engine: &mut Engine) -> (Vec<f32>, Vec<f32>) {
    let block = engine.block_size();
    let mut left = vec![0.0; block];
    let mut right = vec![0.0; block];
    engine.process(&mut left, &mut right);
    (left, right)
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Open the filter wide and remove its modulation so amplitude tests see
/// the envelope alone.
fn neutralize_filter(engine: &mut Engine) {
    engine.control(ControlMessage::new(OP_FILTER as u8, 1, ON));
    engine.control(ControlMessage::new(OP_FILTER as u8, 2, OFF));
    engine.control(ControlMessage::new(OP_FILTER as u8, 3, OFF));
    engine.control(ControlMessage::new(OP_FILTER as u8, 4, OFF));
}

#[test]
fn rendered_blocks_have_declared_length_and_stay_finite() {
    let mut engine = Engine::with_default_patch(test_config(256)).unwrap();

    // Throw deliberately hostile values at the controller: everything must
    // clamp, nothing may fault or produce non-finite samples.
    engine.control(ControlMessage::new(OP_NOISE as u8, 0, u16::MAX));
    engine.control(ControlMessage::new(OP_OSC_A as u8, 1, u16::MAX));
    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::MOD_DEPTH, u16::MAX));
    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::MOD_ROUTING, u16::MAX));
    engine.control(ControlMessage::new(250, 3, 1234));

    for voice in 0..4 {
        engine.dispatch(VoiceEvent::KeyOn {
            voice,
            note: 36 + 12 * voice as u8,
            velocity: 127,
        });
    }

    for _ in 0..50 {
        let (left, right) = render_block(&mut engine);
        assert_eq!(left.len(), 256);
        assert_eq!(right.len(), 256);
        for sample in left.iter().chain(right.iter()) {
            assert!(sample.is_finite(), "non-finite sample in output");
        }
    }
}

#[test]
fn control_values_above_full_scale_clamp() {
    let mut nominal = Engine::with_default_patch(test_config(128)).unwrap();
    let mut hostile = Engine::with_default_patch(test_config(128)).unwrap();

    nominal.control(ControlMessage::new(OP_NOISE as u8, 0, 16383));
    hostile.control(ControlMessage::new(OP_NOISE as u8, 0, u16::MAX));

    for engine in [&mut nominal, &mut hostile] {
        engine.dispatch(VoiceEvent::KeyOn {
            voice: 0,
            note: 60,
            velocity: 100,
        });
    }

    for _ in 0..10 {
        let (l1, r1) = render_block(&mut nominal);
        let (l2, r2) = render_block(&mut hostile);
        assert_eq!(l1, l2);
        assert_eq!(r1, r2);
    }
}

#[test]
fn replaying_the_same_sequence_is_bit_identical() {
    let script = |engine: &mut Engine| {
        engine.control(ControlMessage::new(OP_NOISE as u8, 0, 4915));
        engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::SHARED_FILTER, ON));
        engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::DOUBLE, ON));
        engine.dispatch(VoiceEvent::KeyOn {
            voice: 0,
            note: 48,
            velocity: 96,
        });
        engine.dispatch(VoiceEvent::KeyOn {
            voice: 1,
            note: 64,
            velocity: 80,
        });
    };

    let mut first = Engine::with_default_patch(test_config(128)).unwrap();
    let mut second = Engine::with_default_patch(test_config(128)).unwrap();
    script(&mut first);
    script(&mut second);

    for cycle in 0..40 {
        if cycle == 12 {
            first.dispatch(VoiceEvent::KeyOff { voice: 0 });
            second.dispatch(VoiceEvent::KeyOff { voice: 0 });
        }
        let (l1, r1) = render_block(&mut first);
        let (l2, r2) = render_block(&mut second);
        assert_eq!(l1, l2, "left channel diverged at cycle {cycle}");
        assert_eq!(r1, r2, "right channel diverged at cycle {cycle}");
    }
}

#[test]
fn rms_trace_follows_the_adsr_shape() {
    let mut engine = Engine::with_default_patch(test_config(64)).unwrap();
    neutralize_filter(&mut engine);

    // attack 100 / decay 2000 / sustain 0.6 / release 4000, in samples.
    let sample_rate: f32 = 44_100.0;
    let attack = (100.0 / (2.0 * sample_rate) * 16383.0).round() as u16;
    let decay = (2000.0 / (5.0 * sample_rate) * 16383.0).round() as u16;
    let sustain = (0.6f32 * 16383.0).round() as u16;
    let release = (4000.0 / (5.0 * sample_rate) * 16383.0).round() as u16;
    engine.control(ControlMessage::new(OP_ENV_A as u8, 0, attack));
    engine.control(ControlMessage::new(OP_ENV_A as u8, 1, decay));
    engine.control(ControlMessage::new(OP_ENV_A as u8, 2, sustain));
    engine.control(ControlMessage::new(OP_ENV_A as u8, 3, release));

    engine.dispatch(VoiceEvent::KeyOn {
        voice: 0,
        note: 60,
        velocity: 127,
    });

    // Hold for 0.5 s worth of 64-sample blocks.
    let hold_blocks = (0.5 * sample_rate / 64.0) as usize;
    let mut held = Vec::with_capacity(hold_blocks);
    for _ in 0..hold_blocks {
        let (left, _) = render_block(&mut engine);
        held.push(rms(&left));
    }

    // Attack: the first block is quieter than the loudest early block.
    let peak = held[..8].iter().cloned().fold(0.0f32, f32::max);
    assert!(held[0] < peak * 0.9, "attack should start below peak");
    assert!(peak > 0.0, "voice should be audible");

    // Decay ends by sample ~2100; blocks past that sit at sustain. RMS
    // over a 64-sample window wobbles with the saw's phase, so sustain is
    // judged on multi-block averages.
    let mean = |blocks: &[f32]| blocks.iter().sum::<f32>() / blocks.len() as f32;
    let sustain_a = mean(&held[36..44]);
    let sustain_b = mean(&held[hold_blocks - 8..]);
    assert!(
        (sustain_a - sustain_b).abs() < sustain_a * 0.05,
        "sustain should be flat, got {sustain_a} then {sustain_b}"
    );
    let ratio = sustain_a / peak;
    assert!(
        (0.5..0.75).contains(&ratio),
        "sustain/peak RMS ratio {ratio} should sit near 0.6"
    );
    // Decay trends down between peak and sustain; stride past the
    // per-block wobble.
    for i in 3..29 {
        assert!(held[i + 4] <= held[i] * 1.02, "decay region should not grow");
    }

    engine.dispatch(VoiceEvent::KeyOff { voice: 0 });
    let release_blocks = 100;
    let mut tail = Vec::with_capacity(release_blocks);
    for _ in 0..release_blocks {
        let (left, _) = render_block(&mut engine);
        tail.push(rms(&left));
    }
    for i in 0..release_blocks - 4 {
        assert!(
            tail[i + 4] <= tail[i] * 1.02 + 1e-9,
            "release should not grow"
        );
    }
    assert!(tail[release_blocks - 1] < peak * 0.01, "voice should fade out");
    assert!(engine.voice_done(0), "voice should report KEYDONE");
}

#[test]
fn double_mode_halves_polyphony_and_restores_it() {
    let mut engine = Engine::with_default_patch(test_config(128)).unwrap();
    assert_eq!(engine.effective_voices(), 8);

    engine.dispatch(VoiceEvent::KeyOn {
        voice: 0,
        note: 60,
        velocity: 100,
    });
    render_block(&mut engine);
    let pitch_before = engine.note_frequency(60);

    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::DOUBLE, ON));
    assert_eq!(engine.effective_voices(), 4);

    // A key-on beyond the halved polyphony is the allocator's bug; the
    // engine drops it rather than stealing a live slot.
    engine.dispatch(VoiceEvent::KeyOn {
        voice: 5,
        note: 72,
        velocity: 100,
    });
    assert!(!engine.voice_active(5));

    // The held single-layer voice keeps sounding at its pitch.
    render_block(&mut engine);
    assert!(engine.voice_active(0));
    assert_eq!(engine.note_frequency(60), pitch_before);

    engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::DOUBLE, OFF));
    assert_eq!(engine.effective_voices(), 8);
}

fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|pair| pair[0] <= 0.0 && pair[1] > 0.0)
        .count()
}

#[test]
fn double_mode_detune_produces_two_pitches() {
    // Render each oscillator layer alone and compare fundamentals; with a
    // +7 semitone transpose on B the ratio must be close to 1.4983.
    let fundamental = |mute_a: bool| -> f32 {
        let mut engine = Engine::with_default_patch(test_config(256)).unwrap();
        neutralize_filter(&mut engine);
        engine.control(ControlMessage::new(OPERATOR_GLOBAL, global::DOUBLE, ON));
        // Sine layers for clean zero-crossing counting.
        engine.control(ControlMessage::new(OP_OSC_A as u8, 0, 0));
        engine.control(ControlMessage::new(OP_OSC_B as u8, 0, 0));
        // +7 semitones on B = bipolar 7/24 over the ±24 transpose span.
        let transpose = (((7.0 / 24.0) + 1.0) / 2.0 * 16383.0) as u16;
        engine.control(ControlMessage::new(OP_OSC_B as u8, 1, transpose));
        engine.control(ControlMessage::new(
            OP_OSC_A as u8,
            3,
            if mute_a { 0 } else { ON },
        ));
        engine.control(ControlMessage::new(
            OP_OSC_B as u8,
            3,
            if mute_a { ON } else { 0 },
        ));

        engine.dispatch(VoiceEvent::KeyOn {
            voice: 0,
            note: 69,
            velocity: 127,
        });
        // Skip the attack, then count over two seconds.
        for _ in 0..20 {
            render_block(&mut engine);
        }
        let blocks = (2.0 * 44_100.0 / 256.0) as usize;
        let mut collected = Vec::with_capacity(blocks * 256);
        for _ in 0..blocks {
            let (left, _) = render_block(&mut engine);
            collected.extend_from_slice(&left);
        }
        zero_crossings(&collected) as f32 / 2.0
    };

    let pitch_a = fundamental(false);
    let pitch_b = fundamental(true);
    assert!((pitch_a - 440.0).abs() < 15.0, "layer A near 440 Hz, got {pitch_a}");
    let ratio = pitch_b / pitch_a;
    let expected = (7.0f32 / 12.0).exp2();
    assert!(
        (ratio - expected).abs() < expected * 0.03,
        "layer B should sit 7 semitones up, ratio {ratio}"
    );
}
