mod common;

use client::session::{Effect, RaceSession};
use shared::arbiter::Verdict;
use shared::fsm::MatchPhase;
use shared::protocol::{Envelope, PlayerProgress, RaceMsg};

use common::{lobby_pair, pump, racing_pair};

fn snapshot(wpm: u32, accuracy: u8, progress: u8) -> PlayerProgress {
    PlayerProgress {
        progress,
        wpm,
        accuracy,
        correct_chars: u32::from(progress),
        incorrect_chars: 3,
        elapsed_time: 4.2,
        finished: false,
        finish_time: None,
    }
}

#[test]
fn generated_code_round_trips_into_a_shared_lobby() {
    let mut host = RaceSession::with_id("host".to_string(), Some("Ann".to_string()));
    let mut guest = RaceSession::with_id("guest".to_string(), Some("Bea".to_string()));

    host.create_room(1_000);
    let code = host.room_code().unwrap().to_string();
    let effects = host.drain_effects();
    assert!(effects.contains(&Effect::Connect(code.clone())));

    // codes are accepted case-insensitively with stray whitespace
    guest.join_room(&format!("  {}  ", code.to_lowercase()), 1_000);
    assert_eq!(guest.room_code(), Some(code.as_str()));

    pump(&mut host, &mut guest, 1_100);

    assert_eq!(host.phase(), MatchPhase::Lobby);
    assert_eq!(guest.phase(), MatchPhase::Lobby);
    assert!(host.opponent_connected());
    assert!(guest.opponent_connected());
    // names travelled on the heartbeat exchange
    assert_eq!(host.opponent_name(), Some("Bea"));
    assert_eq!(guest.opponent_name(), Some("Ann"));
    // the host picked exactly one passage and the guest got it verbatim
    assert!(host.is_host());
    assert!(!guest.is_host());
    assert_eq!(host.challenge_text(), guest.challenge_text());
    assert!(host.challenge_text().is_some());
}

#[test]
fn ready_handshake_reaches_racing_with_an_identical_locked_text() {
    let (host, guest) = racing_pair(1_000);
    assert_eq!(host.phase(), MatchPhase::Racing);
    assert_eq!(guest.phase(), MatchPhase::Racing);
    assert_eq!(host.race_text(), guest.race_text());
    assert!(host.race_text().is_some());
}

#[test]
fn late_text_selection_cannot_corrupt_a_running_race() {
    let (mut host, mut guest) = racing_pair(1_000);
    let locked = guest.race_text().unwrap().to_string();

    guest.handle_envelope(
        Envelope::new("host", RaceMsg::Text("a completely different passage".to_string())),
        10_000,
    );

    assert_eq!(guest.race_text(), Some(locked.as_str()));
    assert_eq!(guest.challenge_text(), Some(locked.as_str()));
    assert_eq!(host.race_text(), Some(locked.as_str()));
}

#[test]
fn full_race_produces_the_same_verdict_on_both_clients() {
    let (mut host, mut guest) = racing_pair(1_000);

    // a mid-race update flows into the opponent cache
    host.record_progress(snapshot(70, 96, 40), false, 4_000);
    pump(&mut host, &mut guest, 4_050);
    assert_eq!(guest.opponent_progress().progress, 40);

    // host finishes first at t=5000 with accuracy 95
    host.record_progress(snapshot(80, 95, 98), true, 5_000);
    assert_eq!(host.phase(), MatchPhase::Finished);
    assert_eq!(host.self_progress().finish_time, Some(5_000));
    assert_eq!(host.self_progress().progress, 100);
    // no verdict while the opponent is still typing
    assert!(host.verdict().is_none());
    pump(&mut host, &mut guest, 5_050);
    assert!(guest.opponent_progress().finished);

    // guest finishes at t=6000 with accuracy 90
    guest.record_progress(snapshot(85, 90, 99), true, 6_000);
    assert_eq!(guest.phase(), MatchPhase::Finished);
    let guest_effects = guest.drain_effects();
    // the loser-to-be never fetches a reward
    assert!(!guest_effects.contains(&Effect::FetchReward));
    assert_eq!(guest.verdict(), Some(Verdict::Loss));

    let finish_msgs: Vec<RaceMsg> = guest_effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Send(msg) => Some(msg),
            _ => None,
        })
        .collect();
    for msg in finish_msgs {
        host.handle_envelope(Envelope::new("guest", msg), 6_050);
    }

    // both clients agree independently: the earlier legitimate finish wins
    assert_eq!(host.verdict(), Some(Verdict::Win));
    let host_effects = host.drain_effects();
    assert!(host_effects.contains(&Effect::FetchReward));

    // winner fetches once and broadcasts the artifact to the loser
    host.reward_fetched("https://cdn.example/win.gif".to_string());
    pump(&mut host, &mut guest, 6_100);
    assert_eq!(host.reward_url(), Some("https://cdn.example/win.gif"));
    assert_eq!(guest.reward_url(), Some("https://cdn.example/win.gif"));

    // the guard holds: a second verdict check never refetches
    host.handle_envelope(
        Envelope::new(
            "guest",
            RaceMsg::Finish(guest.self_progress().clone()),
        ),
        6_200,
    );
    assert!(!host.drain_effects().contains(&Effect::FetchReward));
}

#[test]
fn replayed_progress_messages_are_idempotent() {
    let (mut host, _guest) = racing_pair(1_000);

    let update = RaceMsg::Progress(snapshot(66, 93, 52));
    host.handle_envelope(Envelope::new("guest", update.clone()), 4_000);
    let once = host.opponent_progress().clone();
    host.handle_envelope(Envelope::new("guest", update), 4_100);
    assert_eq!(host.opponent_progress(), &once);
}

#[test]
fn incoherent_finish_payloads_are_dropped() {
    let (mut host, _guest) = racing_pair(1_000);

    // finished without a timestamp violates the snapshot invariant
    let bogus = PlayerProgress {
        progress: 100,
        finished: true,
        finish_time: None,
        ..PlayerProgress::default()
    };
    host.handle_envelope(Envelope::new("guest", RaceMsg::Finish(bogus)), 4_000);
    assert!(!host.opponent_progress().finished);
}

#[test]
fn mutual_rematch_resets_both_sides_and_picks_a_fresh_text() {
    let (mut host, mut guest) = racing_pair(1_000);
    let first_text = host.race_text().unwrap().to_string();

    host.record_progress(snapshot(80, 95, 98), true, 5_000);
    pump(&mut host, &mut guest, 5_050);
    guest.record_progress(snapshot(85, 90, 99), true, 6_000);
    pump(&mut host, &mut guest, 6_050);
    assert_eq!(host.phase(), MatchPhase::Finished);
    assert_eq!(guest.phase(), MatchPhase::Finished);

    host.reward_fetched("https://cdn.example/win.gif".to_string());
    pump(&mut host, &mut guest, 6_100);

    host.request_rematch();
    pump(&mut host, &mut guest, 7_000);

    for session in [&host, &guest] {
        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert!(!session.is_ready());
        assert!(!session.is_opponent_ready());
        assert!(!session.self_progress().finished);
        assert!(!session.opponent_progress().finished);
        assert_eq!(session.reward_url(), None);
        assert!(session.opponent_connected());
    }
    // host re-selected; the picker never repeats the previous passage
    assert_eq!(host.challenge_text(), guest.challenge_text());
    assert_ne!(host.challenge_text(), Some(first_text.as_str()));
}

#[test]
fn rematch_requests_cannot_reset_a_race_in_progress() {
    let (_host, mut guest) = racing_pair(1_000);
    guest.handle_envelope(Envelope::new("host", RaceMsg::RestartRequest), 4_000);
    // politely acknowledged, but the phase table forbids the reset mid-race
    assert_eq!(guest.phase(), MatchPhase::Racing);
}

#[test]
fn difficulty_change_rederives_the_text_for_both_sides() {
    let (mut host, mut guest) = lobby_pair(1_000);
    let first = host.challenge_text().unwrap().to_string();

    host.set_difficulty(shared::passages::Difficulty::Hard);
    pump(&mut host, &mut guest, 2_000);

    assert_eq!(host.difficulty(), shared::passages::Difficulty::Hard);
    assert_eq!(host.challenge_text(), guest.challenge_text());
    assert_ne!(host.challenge_text(), Some(first.as_str()));
}
