use chrono::{DateTime, Duration, TimeZone, Utc};
use image::GrayImage;

use presence_watch::presence::{PresencePhase, PresenceState, PresenceTracker, Transition};
use presence_watch::{Frame, PresenceEvent};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn run(signals: &[bool], dwell_secs: i64) -> (PresenceTracker, Vec<PresenceEvent>) {
    let mut tracker = PresenceTracker::with_dwell(Duration::seconds(dwell_secs), 16);
    let mut events = Vec::new();
    for (i, &signal) in signals.iter().enumerate() {
        let now = at(i as i64);
        let frame = Frame::from_gray(GrayImage::new(8, 8), now).unwrap();
        events.extend(tracker.observe(signal, now, &frame, &[]));
    }
    (tracker, events)
}

fn bits(pattern: &str) -> Vec<bool> {
    pattern.chars().map(|c| c == '1').collect()
}

#[test]
fn sustained_presence_confirms_then_clears() {
    let (tracker, events) = run(&bits("001111100"), 3);

    assert_eq!(events.len(), 2);
    match &events[0] {
        PresenceEvent::Confirmed {
            entry_time,
            confirmed_at,
            evidence,
            ..
        } => {
            assert_eq!(*entry_time, at(2));
            assert_eq!(*confirmed_at, at(5));
            assert_eq!(evidence.captured_at, at(5));
        }
        other => panic!("expected confirmation, got {:?}", other.kind()),
    }
    match &events[1] {
        PresenceEvent::Cleared {
            entry_time,
            exit_time,
        } => {
            assert_eq!(*entry_time, at(2));
            assert_eq!(*exit_time, at(7));
        }
        other => panic!("expected clear, got {:?}", other.kind()),
    }
    assert_eq!(events[0].incident_id(), events[1].incident_id());
    assert_eq!(tracker.phase(), PresencePhase::Idle);
    assert_eq!(tracker.history().len(), 9);
}

#[test]
fn brief_presence_produces_nothing() {
    let (tracker, events) = run(&bits("0100"), 3);
    assert!(events.is_empty());
    assert_eq!(tracker.phase(), PresencePhase::Idle);
    assert_eq!(tracker.history().len(), 4);
}

#[test]
fn presence_still_open_at_end_is_only_confirmed() {
    let (tracker, events) = run(&bits("0111111"), 2);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "PresenceConfirmed");
    assert_eq!(tracker.phase(), PresencePhase::ActiveConfirmed);
}

#[test]
fn each_visit_is_its_own_incident() {
    let (_, events) = run(&bits("0111100011110"), 2);
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "PresenceConfirmed",
            "PresenceCleared",
            "PresenceConfirmed",
            "PresenceCleared"
        ]
    );
    assert_eq!(events[0].entry_time(), at(1));
    assert_eq!(events[2].entry_time(), at(8));
    assert_ne!(events[0].incident_id(), events[2].incident_id());
}

#[test]
fn confirmations_and_clears_alternate_for_any_sequence() {
    // Deterministic pseudo-random signal sequences.
    let mut seed: u32 = 0x9e37_79b9;
    for _ in 0..50 {
        let mut signals = Vec::new();
        for _ in 0..120 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            // Runs of equal signals so that some of them outlast the dwell.
            let run_len = 1 + (seed % 7) as usize;
            let signal = seed & 0x100 != 0;
            signals.extend(std::iter::repeat(signal).take(run_len));
        }

        let mut state = PresenceState::default();
        let mut confirmed_open = false;
        for (i, &signal) in signals.iter().enumerate() {
            let (next, out) = state.step(signal, at(i as i64), Duration::seconds(4));
            for transition in out {
                match transition {
                    Transition::Confirmed { .. } => {
                        assert!(!confirmed_open, "second confirmation in one session");
                        confirmed_open = true;
                    }
                    Transition::Cleared { .. } => {
                        assert!(confirmed_open, "clear without confirmation");
                        confirmed_open = false;
                    }
                    Transition::Discarded { .. } => assert!(!confirmed_open),
                    Transition::Entered { .. } => {}
                }
            }
            assert_eq!(next.last_signal, signal);
            assert_eq!(next.session.is_some(), signal);
            state = next;
        }
    }
}
