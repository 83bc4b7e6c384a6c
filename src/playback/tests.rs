use super::*;
use crate::error::ScoreError;
use crate::instruments::{PercussionInstrument, DRUM_CHANNEL};
use crate::musicxml::parse;
use crate::mutate::inject_percussion_part;
use crate::rhythm::RhythmCatalog;

const DUET: &str = include_str!("../../tests/fixtures/duet.musicxml");

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn pop_loop(bpm: f64) -> LoopPlayer {
    let catalog = RhythmCatalog::builtin();
    let pop = catalog.get("pop").unwrap().pattern().unwrap().clone();
    let mut player = LoopPlayer::default();
    player.load(&pop.to_loop_events(bpm)).unwrap();
    player
}

/// Drive the loop like a host timer would.
fn run_loop(engine: &mut VirtualEngine, player: &mut LoopPlayer, seconds: f64) {
    let interval = player.config().tick_interval;
    let steps = (seconds / interval).round() as usize;
    for _ in 0..steps {
        engine.advance(interval);
        player.tick(engine);
    }
}

fn fired_times(engine: &VirtualEngine, drum: PercussionInstrument) -> Vec<f64> {
    engine
        .fired()
        .iter()
        .filter(|f| f.trigger.sound == Sound::Drum(drum))
        .map(|f| f.trigger.time)
        .collect()
}

// ============================================================================
// SCORE PLAYER
// ============================================================================

#[test]
fn test_score_plays_to_the_end() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();
    assert!(approx(player.duration(), 4.8));

    player.play(&mut engine).unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(engine.pending(), 12);

    engine.advance_to(2.0);
    assert_eq!(player.poll(&mut engine), PlayerState::Playing);
    assert!(approx(player.position(&engine), 2.0));

    engine.advance_to(5.0);
    assert_eq!(player.poll(&mut engine), PlayerState::Stopped);
    assert_eq!(engine.fired().len(), 12);
    assert_eq!(player.outstanding(), 0);
}

#[test]
fn test_pause_and_resume_skips_played_events() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();
    player.play(&mut engine).unwrap();

    engine.advance_to(1.2);
    player.pause(&mut engine).unwrap();
    assert_eq!(player.state(), PlayerState::Paused);
    assert!(approx(player.position(&engine), 1.2));
    // Five piano notes and both violin notes of measure one
    assert_eq!(engine.fired().len(), 7);
    assert_eq!(engine.cancelled(), 5);
    assert_eq!(engine.pending(), 0);

    engine.advance_to(5.0);
    assert_eq!(engine.fired().len(), 7);

    player.play(&mut engine).unwrap();
    assert_eq!(engine.pending(), 5);
    engine.advance_to(20.0);
    assert_eq!(player.poll(&mut engine), PlayerState::Stopped);

    let fired = engine.fired();
    assert_eq!(fired.len(), 12);
    // A4 was at 1.8 s, so it resumes 0.6 s after the resume point
    let resumed = &fired[7];
    assert_eq!(resumed.trigger.sound, Sound::Pitch(69));
    assert!(approx(resumed.trigger.time - 5.0, 1.8 - 1.2));
    for f in &fired[7..] {
        assert!(f.trigger.time > 5.0);
    }
}

#[test]
fn test_stop_rewinds() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();
    player.play(&mut engine).unwrap();
    engine.advance_to(1.0);
    player.stop(&mut engine).unwrap();
    assert_eq!(player.position(&engine), 0.0);
    assert_eq!(engine.pending(), 0);

    engine.clear_fired();
    player.play(&mut engine).unwrap();
    engine.advance_to(1.1);
    // Starts again from the first note
    assert_eq!(engine.fired()[0].trigger.sound, Sound::Pitch(60));
    assert!(approx(engine.fired()[0].trigger.time, 1.0));
}

#[test]
fn test_state_errors() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    let mut player = ScorePlayer::new();

    let err = player.pause(&mut engine).unwrap_err();
    assert!(matches!(
        err,
        ScoreError::SchedulingState { operation: "pause", state: PlayerState::Stopped }
    ));
    assert_eq!(err.to_string(), "Cannot pause while stopped");
    assert!(player.stop(&mut engine).is_err());

    player.load_document(&mut engine, &doc, 100).unwrap();
    player.play(&mut engine).unwrap();
    assert!(player.play(&mut engine).is_err());
    let err = player.load_document(&mut engine, &doc, 100).unwrap_err();
    assert_eq!(err.to_string(), "Cannot load a document while playing");
}

#[test]
fn test_failed_voice_does_not_block_others() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new().fail_voice("violin");
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();

    assert_eq!(player.failed_voices().collect::<Vec<_>>(), vec!["violin"]);
    assert_eq!(player.events().len(), 9);

    player.play(&mut engine).unwrap();
    engine.advance_to(10.0);
    assert_eq!(engine.fired().len(), 9);
    assert!(engine
        .fired()
        .iter()
        .all(|f| f.trigger.voice == VoiceRef::Instrument("piano".to_string())));
}

#[test]
fn test_backend_unavailable() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::unavailable();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();

    let err = player.play(&mut engine).unwrap_err();
    assert!(matches!(err, ScoreError::BackendUnavailable));
    assert!(player.backend_failed());
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(engine.pending(), 0);

    let mut looper = pop_loop(120.0);
    assert!(matches!(looper.play(&mut engine), Err(ScoreError::BackendUnavailable)));
    assert!(looper.backend_failed());
}

#[test]
fn test_suspended_clock_is_resumed() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    engine.suspend();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();
    player.play(&mut engine).unwrap();
    assert!(engine.is_running());
}

#[test]
fn test_volume_is_live() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 80).unwrap();
    player.play(&mut engine).unwrap();

    engine.advance_to(0.1);
    assert!(engine.fired().iter().all(|f| approx(f.gain, 0.8)));

    player.set_volume(&mut engine, 50);
    assert_eq!(player.volume(), 50);
    engine.advance_to(10.0);
    let later: Vec<&FiredTrigger> = engine.fired().iter().filter(|f| f.trigger.time > 0.1).collect();
    assert!(!later.is_empty());
    assert!(later.iter().all(|f| approx(f.gain, 0.5)));
    // Volume changes never reschedule
    assert_eq!(engine.cancelled(), 0);
}

#[test]
fn test_kick_survives_notation_round_trip() {
    let doc = parse(DUET).unwrap();
    let catalog = RhythmCatalog::builtin();
    let pop = catalog.get("pop").unwrap().pattern().unwrap();
    let with_drums = inject_percussion_part(&doc, pop, 80).unwrap();
    let reparsed = parse(&crate::musicxml::to_musicxml(&with_drums)).unwrap();

    let events = build_events(&reparsed);
    let kicks: Vec<&PlaybackEvent> = events
        .iter()
        .filter(|e| e.sound == Sound::Drum(PercussionInstrument::Kick))
        .collect();
    // 100 bpm: beats 0, 1.5 and 2 of each measure
    let times: Vec<f64> = kicks.iter().map(|e| e.time).collect();
    let expected = [0.0, 0.9, 1.2, 2.4, 3.3, 3.6];
    assert_eq!(times.len(), expected.len());
    for (t, e) in times.iter().zip(expected) {
        assert!(approx(*t, e), "{} != {}", t, e);
    }
    assert!(kicks.iter().all(|e| e.voice == VoiceRef::Drums && e.channel == DRUM_CHANNEL));
}

// ============================================================================
// LOOP PLAYER
// ============================================================================

#[test]
fn test_loop_kick_timing() {
    let mut engine = VirtualEngine::new();
    let mut player = pop_loop(120.0);
    player.play(&mut engine).unwrap();
    run_loop(&mut engine, &mut player, 3.2);

    let kicks = fired_times(&engine, PercussionInstrument::Kick);
    let expected = [0.0, 0.75, 1.0, 2.0, 2.75, 3.0];
    assert_eq!(kicks.len(), expected.len());
    for (t, e) in kicks.iter().zip(expected) {
        assert!(approx(*t, e), "{} != {}", t, e);
    }
    assert_eq!(player.measures_played(), 1);
}

#[test]
fn test_loop_memory_stays_bounded() {
    let mut engine = VirtualEngine::new();
    let mut player = pop_loop(120.0);
    let stored = player.stored_event_count();
    player.play(&mut engine).unwrap();

    let mut max_outstanding = 0;
    for _ in 0..1000 {
        run_loop(&mut engine, &mut player, 2.0);
        max_outstanding = max_outstanding.max(player.outstanding());
        assert_eq!(player.outstanding(), engine.pending());
        engine.clear_fired();
    }

    assert!(player.measures_played() >= 999);
    assert_eq!(player.stored_event_count(), stored);
    assert!(max_outstanding <= stored);
}

#[test]
fn test_loop_pause_and_resume() {
    let mut engine = VirtualEngine::new();
    let mut player = pop_loop(120.0);
    player.play(&mut engine).unwrap();
    run_loop(&mut engine, &mut player, 0.95);

    // The kick at 1.0 s is inside the window and gets cancelled
    assert!(player.outstanding() > 0);
    player.pause(&mut engine).unwrap();
    assert_eq!(player.outstanding(), 0);
    assert_eq!(engine.pending(), 0);

    engine.advance(5.0);
    assert_eq!(player.tick(&mut engine), 0);
    player.play(&mut engine).unwrap();
    run_loop(&mut engine, &mut player, 0.2);

    let kicks = fired_times(&engine, PercussionInstrument::Kick);
    assert_eq!(kicks.len(), 3);
    assert!(approx(kicks[1], 0.75));
    assert!(approx(kicks[2], 6.0));
}

#[test]
fn test_loop_tempo_changes_at_measure_boundary() {
    let mut engine = VirtualEngine::new();
    let mut player = pop_loop(120.0);
    player.play(&mut engine).unwrap();
    run_loop(&mut engine, &mut player, 0.5);

    player.set_bpm(60.0).unwrap();
    assert_eq!(player.bpm(), 60.0);
    run_loop(&mut engine, &mut player, 3.7);

    let kicks = fired_times(&engine, PercussionInstrument::Kick);
    let expected = [0.0, 0.75, 1.0, 2.0, 3.5, 4.0];
    assert_eq!(kicks.len(), expected.len());
    for (t, e) in kicks.iter().zip(expected) {
        assert!(approx(*t, e), "{} != {}", t, e);
    }
}

#[test]
fn test_loop_volume_is_live() {
    let mut engine = VirtualEngine::new();
    let mut player = pop_loop(120.0);
    player.play(&mut engine).unwrap();
    run_loop(&mut engine, &mut player, 0.5);
    player.set_volume(&mut engine, 25);
    engine.clear_fired();
    run_loop(&mut engine, &mut player, 1.0);
    assert!(!engine.fired().is_empty());
    assert!(engine.fired().iter().all(|f| approx(f.gain, 0.25)));
}

#[test]
fn test_loop_rejects_bad_input() {
    let mut engine = VirtualEngine::new();
    let mut player = LoopPlayer::default();
    assert!(matches!(
        player.set_pattern(Vec::new(), 0.0, 4.0),
        Err(ScoreError::InvalidParameter { .. })
    ));
    assert!(player.set_bpm(-5.0).is_err());

    let events = vec![
        crate::rhythm::LoopEvent {
            beat_offset: 1.0,
            instrument: PercussionInstrument::Snare,
            velocity: 0.7,
        },
        crate::rhythm::LoopEvent {
            beat_offset: 4.0,
            instrument: PercussionInstrument::Kick,
            velocity: 0.9,
        },
    ];
    player.set_pattern(events, 120.0, 4.0).unwrap();
    assert_eq!(player.stored_event_count(), 1);

    player.play(&mut engine).unwrap();
    let err = player.set_pattern(Vec::new(), 120.0, 4.0).unwrap_err();
    assert_eq!(err.to_string(), "Cannot set a pattern while playing");
    player.stop(&mut engine).unwrap();
    assert!(player.stop(&mut engine).is_err());
}

#[test]
fn test_loop_tempo_range() {
    let mut player = LoopPlayer::default();
    for bpm in [1e308, f64::INFINITY, f64::NAN, MAX_LOOP_BPM + 1.0, 10.0, MIN_LOOP_BPM - 0.5] {
        assert!(
            matches!(player.set_bpm(bpm), Err(ScoreError::InvalidParameter { ref key, .. }) if key == "bpm"),
            "{} accepted",
            bpm
        );
        assert!(player.set_pattern(Vec::new(), bpm, 4.0).is_err());
    }
    player.set_bpm(MIN_LOOP_BPM).unwrap();
    player.set_bpm(MAX_LOOP_BPM).unwrap();

    let err = player.set_pattern(Vec::new(), 120.0, 1e-9).unwrap_err();
    assert!(matches!(err, ScoreError::InvalidParameter { ref key, .. } if key == "beats_per_measure"));
    player.set_pattern(Vec::new(), MAX_LOOP_BPM, MIN_BEATS_PER_MEASURE).unwrap();
}

#[test]
fn test_loop_pause_rolls_back_every_wrapped_measure() {
    // A 0.0375 s measure, so the 0.2 s window spans several wraps
    let mut engine = VirtualEngine::new();
    let mut player = LoopPlayer::new(LoopConfig {
        lookahead: 0.2,
        tick_interval: 0.025,
    });
    let kick = crate::rhythm::LoopEvent {
        beat_offset: 0.0,
        instrument: PercussionInstrument::Kick,
        velocity: 0.9,
    };
    player.set_pattern(vec![kick], MAX_LOOP_BPM, MIN_BEATS_PER_MEASURE).unwrap();
    player.play(&mut engine).unwrap();
    assert!(player.measures_played() >= 4);

    // Only the kick at 0.0 s survives, so one measure has been played
    player.pause(&mut engine).unwrap();
    assert_eq!(player.measures_played(), 1);

    engine.advance(1.0);
    player.play(&mut engine).unwrap();
    run_loop(&mut engine, &mut player, 0.3);

    let kicks = fired_times(&engine, PercussionInstrument::Kick);
    assert!(kicks.len() > 2);
    assert!(approx(kicks[0], 0.0));
    assert!(approx(kicks[1], 1.0375), "resumed at {}", kicks[1]);
    for pair in kicks[1..].windows(2) {
        assert!(approx(pair[1] - pair[0], 0.0375), "gap {}", pair[1] - pair[0]);
    }
    // Every measure that sounded after the pause is counted once
    assert!(player.measures_played() >= kicks.len() as u64 - 1);
}

#[test]
fn test_loop_drum_voice_failure() {
    let mut engine = VirtualEngine::new().fail_voice("drums");
    let mut player = pop_loop(120.0);
    let err = player.play(&mut engine).unwrap_err();
    assert!(matches!(err, ScoreError::AssetLoad { ref voice, .. } if voice == "drums"));
    assert_eq!(player.state(), PlayerState::Stopped);
}

#[test]
fn test_schedulers_share_an_engine() {
    let doc = parse(DUET).unwrap();
    let mut engine = VirtualEngine::new();
    let mut score = ScorePlayer::new();
    let mut looper = pop_loop(100.0);
    score.load_document(&mut engine, &doc, 100).unwrap();
    score.play(&mut engine).unwrap();
    looper.play(&mut engine).unwrap();

    run_loop(&mut engine, &mut looper, 1.0);
    looper.stop(&mut engine).unwrap();
    score.poll(&mut engine);
    // Stopping the loop leaves the score's triggers alone
    assert_eq!(engine.pending(), score.outstanding());

    engine.advance_to(10.0);
    assert_eq!(score.poll(&mut engine), PlayerState::Stopped);
    let notes = engine
        .fired()
        .iter()
        .filter(|f| matches!(f.trigger.sound, Sound::Pitch(_)))
        .count();
    assert_eq!(notes, 12);
}
