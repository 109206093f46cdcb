//! Two-instance harness: runs a host and a guest session against each
//! other by shuttling their queued broadcasts, with timers fired by hand.
//! No network, no tasks; the whole race lifecycle from a scripted tape.
#![allow(dead_code)]

use client::session::{Effect, RaceSession};
use shared::protocol::{Envelope, RaceMsg};

/// Drain a session's outbox down to its broadcasts, dropping timer and
/// channel effects the way a test double of the driver would.
pub fn sends(session: &mut RaceSession) -> Vec<RaceMsg> {
    session
        .drain_effects()
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Send(msg) => Some(msg),
            _ => None,
        })
        .collect()
}

/// Shuttle queued broadcasts both ways until the room goes quiet.
pub fn pump(a: &mut RaceSession, b: &mut RaceSession, now_ms: u64) {
    loop {
        let a_out = sends(a);
        let b_out = sends(b);
        if a_out.is_empty() && b_out.is_empty() {
            break;
        }
        let a_id = a.id().to_string();
        let b_id = b.id().to_string();
        for msg in a_out {
            b.handle_envelope(Envelope::new(a_id.clone(), msg), now_ms);
        }
        for msg in b_out {
            a.handle_envelope(Envelope::new(b_id.clone(), msg), now_ms);
        }
    }
}

/// Host creates, guest joins, and the room settles: both connected, text
/// agreed. Returns the pair with all outboxes drained.
pub fn lobby_pair(now_ms: u64) -> (RaceSession, RaceSession) {
    let mut host = RaceSession::with_id("host".to_string(), Some("Ann".to_string()));
    let mut guest = RaceSession::with_id("guest".to_string(), Some("Bea".to_string()));

    host.create_room(now_ms);
    let code = host.room_code().expect("host minted a code").to_string();
    host.drain_effects();

    guest.join_room(&code, now_ms);
    pump(&mut host, &mut guest, now_ms);

    assert!(host.opponent_connected());
    assert!(guest.opponent_connected());
    assert_eq!(host.challenge_text(), guest.challenge_text());
    (host, guest)
}

/// A lobby pair pushed through the ready handshake and countdown into the
/// race itself.
pub fn racing_pair(now_ms: u64) -> (RaceSession, RaceSession) {
    let (mut host, mut guest) = lobby_pair(now_ms);

    host.set_ready(now_ms + 100);
    guest.set_ready(now_ms + 100);
    pump(&mut host, &mut guest, now_ms + 150);

    host.ready_debounce_fired(now_ms + 650);
    guest.ready_debounce_fired(now_ms + 650);

    for tick in 1u64..=3 {
        host.countdown_tick(now_ms + 650 + tick * 1_000);
        guest.countdown_tick(now_ms + 650 + tick * 1_000);
    }
    host.drain_effects();
    guest.drain_effects();

    assert_eq!(host.race_text(), guest.race_text());
    (host, guest)
}
