//! Queue scanner scenario tests
//!
//! Drive the scanner one step at a time against fake resolver/player
//! collaborators and check the published state, player commands and events.

mod helpers;

use helpers::{fast_config, stream_url_for, test_jukebox, track, wait_until};
use jukebox_ap::playback::ScanOutcome;
use jukebox_ap::{Error, PlaybackPhase};
use jukebox_common::JukeboxEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Step until `wanted` or give up after `max_steps`
async fn step_until(
    scanner: &jukebox_ap::playback::QueueScanner,
    wanted: ScanOutcome,
    max_steps: usize,
) -> bool {
    for _ in 0..max_steps {
        if scanner.step().await == wanted {
            return true;
        }
    }
    false
}

fn drain(rx: &mut broadcast::Receiver<JukeboxEvent>) -> Vec<JukeboxEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_idle_preparing_playing_idle() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let song_a = track("A", 1);

    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);
    assert_eq!(scanner.step().await, ScanOutcome::Idle);

    jukebox.enqueue(song_a.clone(), "song a");
    assert_eq!(scanner.step().await, ScanOutcome::Started);

    let state = jukebox.current_playback_state();
    assert_eq!(state.phase(), PlaybackPhase::Playing);
    assert_eq!(state.track.as_ref().map(|t| t.locator()), Some(song_a.locator()));
    assert!(state.started_at.is_some());

    let commands = launcher.commands();
    let add = format!("add {}", stream_url_for(&song_a));
    let add_pos = commands.iter().position(|c| *c == add).expect("add command sent");
    assert_eq!(commands[add_pos - 1], "clear");

    // Still inside the play window
    assert_eq!(scanner.step().await, ScanOutcome::Playing);

    assert!(step_until(&scanner, ScanOutcome::Finished, 500).await);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);
    assert!(launcher.commands().iter().skip(add_pos).any(|c| c == "stop"));
}

#[tokio::test]
async fn test_lifecycle_event_order() {
    let (jukebox, _resolver, _launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let mut rx = jukebox.subscribe_events();

    jukebox.enqueue(track("A", 1), "a");
    assert_eq!(scanner.step().await, ScanOutcome::Started);
    assert!(step_until(&scanner, ScanOutcome::Finished, 500).await);

    let kinds: Vec<String> = drain(&mut rx)
        .iter()
        .filter(|e| !matches!(e, JukeboxEvent::VolumeChanged { .. }))
        .map(|e| match e {
            JukeboxEvent::CurrentTrackChanged { track, active, .. } => format!(
                "changed:{}:{}",
                track.as_ref().map(|t| t.name().to_string()).unwrap_or_default(),
                active
            ),
            other => other.event_type().to_string(),
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "TrackQueued",
            "changed:A:false",
            "TrackStarted",
            "changed:A:true",
            "TrackFinished",
            "changed::false",
        ]
    );
}

#[tokio::test]
async fn test_resolution_failure_drops_and_advances() {
    let (jukebox, resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let mut rx = jukebox.subscribe_events();
    let song_a = track("A", 30);
    let song_b = track("B", 30);
    resolver.fail_stream(&song_a);

    jukebox.enqueue(song_a.clone(), "a");
    jukebox.enqueue(song_b.clone(), "b");

    assert_eq!(scanner.step().await, ScanOutcome::Dropped);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);
    assert_eq!(jukebox.queue_snapshot().len(), 1);

    let dropped = drain(&mut rx).into_iter().any(|e| {
        matches!(e, JukeboxEvent::TrackDropped { ref track, .. } if track.locator() == song_a.locator())
    });
    assert!(dropped);

    assert_eq!(scanner.step().await, ScanOutcome::Started);
    let state = jukebox.current_playback_state();
    assert_eq!(state.track.as_ref().map(|t| t.locator()), Some(song_b.locator()));

    // The failed track is never retried
    assert_eq!(resolver.stream_calls(&song_a), 1);
    assert_eq!(launcher.count_commands("add "), 1);
}

#[tokio::test]
async fn test_spawn_failures_requeue_then_play_once() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let song_a = track("A", 30);
    launcher.fail_next_spawns(2);

    jukebox.enqueue(song_a.clone(), "a");

    assert_eq!(scanner.step().await, ScanOutcome::Requeued);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);
    assert_eq!(jukebox.queue_snapshot().len(), 1);

    assert_eq!(scanner.step().await, ScanOutcome::Requeued);
    assert_eq!(scanner.step().await, ScanOutcome::Started);

    assert_eq!(launcher.launches(), 3);
    assert_eq!(
        launcher.count_commands(&format!("add {}", stream_url_for(&song_a))),
        1
    );
    assert!(jukebox.queue_snapshot().is_empty());
}

#[tokio::test]
async fn test_requeue_goes_back_to_head() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    launcher.fail_next_spawns(1);

    jukebox.enqueue(track("A", 30), "a");
    jukebox.enqueue(track("B", 30), "b");

    assert_eq!(scanner.step().await, ScanOutcome::Requeued);
    let order: Vec<String> = jukebox
        .queue_snapshot()
        .iter()
        .map(|e| e.track.name().to_string())
        .collect();
    assert_eq!(order, vec!["A", "B"]);
}

#[tokio::test]
async fn test_fifo_order_of_playback() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();

    for name in ["A", "B", "C"] {
        jukebox.enqueue(track(name, 30), name);
    }

    for _ in 0..3 {
        assert_eq!(scanner.step().await, ScanOutcome::Started);
        jukebox.skip().await.unwrap();
    }

    let adds: Vec<String> = launcher
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("add "))
        .collect();
    assert_eq!(
        adds,
        vec![
            format!("add {}", stream_url_for(&track("A", 30))),
            format!("add {}", stream_url_for(&track("B", 30))),
            format!("add {}", stream_url_for(&track("C", 30))),
        ]
    );
}

#[tokio::test]
async fn test_skip_clears_state_before_next_track() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let mut rx = jukebox.subscribe_events();

    jukebox.enqueue(track("A", 60), "a");
    jukebox.enqueue(track("B", 60), "b");
    assert_eq!(scanner.step().await, ScanOutcome::Started);

    launcher.clear_commands();
    jukebox.skip().await.unwrap();

    let state = jukebox.current_playback_state();
    assert!(state.track.is_none());
    assert!(!state.active);
    assert!(!state.paused);
    assert_eq!(launcher.commands(), vec!["stop", "clear"]);

    assert_eq!(scanner.step().await, ScanOutcome::Started);

    // Idle is published before B becomes active
    let events = drain(&mut rx);
    let idle_at = events
        .iter()
        .position(|e| matches!(e, JukeboxEvent::CurrentTrackChanged { track: None, .. }))
        .expect("idle published");
    let b_active_at = events
        .iter()
        .position(|e| {
            matches!(e, JukeboxEvent::CurrentTrackChanged { track: Some(t), active: true, .. } if t.name() == "B")
        })
        .expect("B published active");
    assert!(idle_at < b_active_at);

    let finished = events.iter().any(|e| {
        matches!(e, JukeboxEvent::TrackFinished { track, interrupted: true, .. } if track.name() == "A")
    });
    assert!(finished);
}

#[tokio::test]
async fn test_pause_and_skip_require_player() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());

    assert!(matches!(jukebox.pause().await, Err(Error::PlayerUnavailable(_))));
    assert!(matches!(jukebox.skip().await, Err(Error::PlayerUnavailable(_))));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_pause_twice_restores_state_and_freezes_elapsed() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();

    jukebox.enqueue(track("A", 60), "a");
    assert_eq!(scanner.step().await, ScanOutcome::Started);

    assert!(jukebox.pause().await.unwrap());
    let paused = jukebox.current_playback_state();
    assert_eq!(paused.phase(), PlaybackPhase::Paused);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(jukebox.current_playback_state().elapsed_ms, paused.elapsed_ms);

    assert!(!jukebox.pause().await.unwrap());
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Playing);
    assert_eq!(launcher.count_commands("pause"), 2);
}

#[tokio::test]
async fn test_paused_track_does_not_finish() {
    let (jukebox, _resolver, _launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();

    jukebox.enqueue(track("A", 1), "a");
    assert_eq!(scanner.step().await, ScanOutcome::Started);
    assert!(jukebox.pause().await.unwrap());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(scanner.step().await, ScanOutcome::Playing);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Paused);

    assert!(!jukebox.pause().await.unwrap());
    assert!(step_until(&scanner, ScanOutcome::Finished, 500).await);
}

#[tokio::test]
async fn test_zero_duration_uses_fallback() {
    let (jukebox, _resolver, _launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();

    jukebox.enqueue(track("Live", 0), "live");
    assert_eq!(scanner.step().await, ScanOutcome::Started);
    assert_eq!(scanner.step().await, ScanOutcome::Playing);

    // Fallback is 1s in the fast config
    assert!(step_until(&scanner, ScanOutcome::Finished, 500).await);
}

#[tokio::test]
async fn test_player_crash_clears_state_and_respawns() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let mut rx = jukebox.subscribe_events();

    jukebox.enqueue(track("A", 60), "a");
    assert_eq!(scanner.step().await, ScanOutcome::Started);

    launcher.crash();
    assert_eq!(scanner.step().await, ScanOutcome::PlayerLost);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);

    let interrupted = drain(&mut rx)
        .into_iter()
        .any(|e| matches!(e, JukeboxEvent::TrackFinished { interrupted: true, .. }));
    assert!(interrupted);

    // Interrupted track is not replayed; the next one triggers a respawn
    jukebox.enqueue(track("B", 60), "b");
    assert_eq!(scanner.step().await, ScanOutcome::Started);
    assert_eq!(launcher.launches(), 2);
    assert_eq!(launcher.count_commands("add "), 2);
}

#[tokio::test]
async fn test_crash_hidden_by_volume_respawn_still_clears_track() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();

    jukebox.enqueue(track("A", 60), "a");
    assert_eq!(scanner.step().await, ScanOutcome::Started);

    // Volume change restarts the crashed player before the scanner notices
    launcher.crash();
    assert_eq!(jukebox.set_volume(100).await.unwrap(), 100);
    assert_eq!(launcher.launches(), 2);

    assert_eq!(scanner.step().await, ScanOutcome::PlayerLost);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);

    jukebox.enqueue(track("B", 60), "b");
    assert_eq!(scanner.step().await, ScanOutcome::Started);
    assert_eq!(scanner.step().await, ScanOutcome::Playing);
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn test_pause_without_active_track_changes_nothing() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    assert_eq!(jukebox.set_volume(200).await.unwrap(), 200);

    assert!(!jukebox.pause().await.unwrap());
    let state = jukebox.current_playback_state();
    assert!(state.track.is_none());
    assert!(!state.paused);
    assert_eq!(launcher.count_commands("pause"), 0);
}

#[tokio::test]
async fn test_rejected_play_command_drops_track() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();

    jukebox.enqueue(track("A", 30), "a");
    jukebox.enqueue(track("B", 30), "b");

    // Get a live player first, then break its command channel
    assert_eq!(jukebox.set_volume(200).await.unwrap(), 200);
    launcher.reject_commands(true);

    assert_eq!(scanner.step().await, ScanOutcome::Dropped);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);
    assert_eq!(jukebox.queue_snapshot().len(), 1);
}

#[tokio::test]
async fn test_prefetched_url_is_used_once() {
    let (jukebox, resolver, launcher) = test_jukebox(&fast_config());
    let scanner = jukebox.scanner();
    let prefetcher = jukebox.prefetcher();
    let song_a = track("A", 30);

    jukebox.enqueue(song_a.clone(), "a");
    assert_eq!(prefetcher.prefetch_once().await, 1);
    assert_eq!(resolver.stream_calls(&song_a), 1);

    // Already cached: nothing to do
    assert_eq!(prefetcher.prefetch_once().await, 0);

    assert_eq!(scanner.step().await, ScanOutcome::Started);
    assert_eq!(resolver.stream_calls(&song_a), 1);
    assert_eq!(launcher.count_commands("add "), 1);
}

#[tokio::test]
async fn test_skip_while_preparing_abandons_track() {
    let (jukebox, resolver, launcher) = test_jukebox(&fast_config());
    let scanner = Arc::new(jukebox.scanner());
    resolver.set_delay(Duration::from_millis(300));

    jukebox.enqueue(track("A", 30), "a");

    let step = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move { scanner.step().await })
    };

    // Player is up and the track is being resolved
    let skipped = wait_until(Duration::from_secs(2), || {
        let jukebox = Arc::clone(&jukebox);
        async move {
            jukebox.current_playback_state().phase() == PlaybackPhase::Preparing
                && jukebox.skip().await.is_ok()
        }
    })
    .await;
    assert!(skipped);

    assert_eq!(step.await.unwrap(), ScanOutcome::Abandoned);
    assert_eq!(jukebox.current_playback_state().phase(), PlaybackPhase::Idle);
    assert_eq!(launcher.count_commands("add "), 0);
}

#[tokio::test]
async fn test_background_loops_play_through_queue() {
    let (jukebox, _resolver, launcher) = test_jukebox(&fast_config());
    jukebox.start();

    jukebox.enqueue(track("A", 1), "a");
    jukebox.enqueue(track("B", 1), "b");

    let both_played = wait_until(Duration::from_secs(5), || {
        let launcher = Arc::clone(&launcher);
        let jukebox = Arc::clone(&jukebox);
        async move {
            launcher.count_commands("add ") == 2
                && jukebox.current_playback_state().phase() == PlaybackPhase::Idle
        }
    })
    .await;
    assert!(both_played);

    jukebox.shutdown().await;
    assert!(launcher.commands().contains(&"stop".to_string()));
}
