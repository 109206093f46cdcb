use std::sync::Arc;
use std::time::Duration;

use rust_fsm::StateMachineImpl;
use shared::arbiter::Verdict;
use shared::fsm::{MatchPhase, PhaseEvent};
use shared::passages::{Difficulty, PassagePicker};
use shared::protocol::{text_digest, Envelope, PlayerProgress, RaceMsg};
use shared::{arbiter, room_code};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChallengeError;
use crate::heartbeat::HeartbeatMonitor;

/// Seconds shown when the countdown starts.
pub const COUNTDOWN_START: u8 = 3;

/// Grace period that coalesces near-simultaneous readiness before the
/// countdown begins.
pub const READY_DEBOUNCE: Duration = Duration::from_millis(500);

/// How long a guest waits for any sign of the host before surfacing an
/// error. Advisory: the channel stays open and a late host still connects.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

/// The named timers owned by the session. The driver arms and cancels the
/// real clocks; the session only decides when.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timer {
    Heartbeat,
    Countdown,
    JoinTimeout,
    ReadyDebounce,
}

/// Side effects requested by the reducer, drained and executed by the
/// driver after every input. Sends are fire-and-forget.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Connect(String),
    Disconnect,
    Send(RaceMsg),
    StartTimer(Timer),
    StopTimer(Timer),
    FetchReward,
}

/// The match state machine for one client. Host and guest run the same
/// logic with different roles; two instances converge by exchanging
/// messages, never by sharing state.
///
/// Every input is explicit and carries `now_ms`, so the whole lifecycle is
/// reproducible from a scripted message tape.
pub struct RaceSession {
    id: String,
    player_name: Option<String>,
    difficulty: Difficulty,
    picker: PassagePicker,

    phase: MatchPhase,
    role: Option<Role>,
    room_code: Option<String>,

    opponent_id: Option<String>,
    opponent_connected: bool,
    opponent_name: Option<String>,
    opponent_progress: PlayerProgress,
    opponent_ready: bool,

    self_progress: PlayerProgress,
    ready: bool,

    challenge_text: Option<Arc<str>>,
    locked_text: Option<Arc<str>>,
    race_started: bool,
    countdown: u8,

    heartbeat: Option<HeartbeatMonitor>,
    error: Option<ChallengeError>,

    reward_url: Option<String>,
    reward_in_flight: bool,

    effects: Vec<Effect>,
}

impl RaceSession {
    pub fn new(player_name: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), player_name)
    }

    /// Deterministic id, for tests and for callers that persist identity.
    pub fn with_id(id: String, player_name: Option<String>) -> Self {
        Self {
            id,
            player_name,
            difficulty: Difficulty::default(),
            picker: PassagePicker::new(),
            phase: MatchPhase::Idle,
            role: None,
            room_code: None,
            opponent_id: None,
            opponent_connected: false,
            opponent_name: None,
            opponent_progress: PlayerProgress::default(),
            opponent_ready: false,
            self_progress: PlayerProgress::default(),
            ready: false,
            challenge_text: None,
            locked_text: None,
            race_started: false,
            countdown: COUNTDOWN_START,
            heartbeat: None,
            error: None,
            reward_url: None,
            reward_in_flight: false,
            effects: Vec::new(),
        }
    }

    // ---- caller-facing state ----

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Some(Role::Host)
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn opponent_connected(&self) -> bool {
        self.opponent_connected
    }

    pub fn opponent_name(&self) -> Option<&str> {
        self.opponent_name.as_deref()
    }

    pub fn opponent_progress(&self) -> &PlayerProgress {
        &self.opponent_progress
    }

    pub fn self_progress(&self) -> &PlayerProgress {
        &self.self_progress
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_opponent_ready(&self) -> bool {
        self.opponent_ready
    }

    /// The passage on display: the locked race text once a race has begun,
    /// otherwise whatever the lobby has settled on so far.
    pub fn challenge_text(&self) -> Option<&str> {
        self.locked_text
            .as_deref()
            .or(self.challenge_text.as_deref())
    }

    /// The immutable passage of the running race.
    pub fn race_text(&self) -> Option<&str> {
        self.locked_text.as_deref()
    }

    pub fn countdown(&self) -> u8 {
        self.countdown
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn error(&self) -> Option<&ChallengeError> {
        self.error.as_ref()
    }

    pub fn reward_url(&self) -> Option<&str> {
        self.reward_url.as_deref()
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    /// Final verdict, available only once both sides report finished. Both
    /// clients compute it from the same pair of snapshots, so they agree
    /// without a server arbiter.
    pub fn verdict(&self) -> Option<Verdict> {
        (self.self_progress.finished && self.opponent_progress.finished)
            .then(|| Verdict::for_pair(&self.self_progress, &self.opponent_progress))
    }

    /// Live ranking for mid-race display; never a final verdict.
    pub fn live_standing(&self) -> std::cmp::Ordering {
        arbiter::compare(&self.self_progress, &self.opponent_progress)
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // ---- caller commands ----

    pub fn set_player_name(&mut self, name: &str) {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            self.player_name = Some(trimmed.to_string());
        }
    }

    pub fn reset_player_name(&mut self) {
        self.player_name = None;
    }

    /// Mint a room and become its host.
    pub fn create_room(&mut self, now_ms: u64) {
        let code = room_code::generate();
        self.enter_room(code, Role::Host, now_ms);
    }

    /// Host a room under a pre-minted code (lobby challenge handoff).
    pub fn host_room(&mut self, raw_code: &str, now_ms: u64) {
        let Some(code) = room_code::validate(raw_code) else {
            self.error = Some(ChallengeError::InvalidRoomCode);
            return;
        };
        self.enter_room(code, Role::Host, now_ms);
    }

    /// Join an existing room by code. Malformed codes are rejected before
    /// any transport activity happens.
    pub fn join_room(&mut self, raw_code: &str, now_ms: u64) {
        let Some(code) = room_code::validate(raw_code) else {
            self.error = Some(ChallengeError::InvalidRoomCode);
            return;
        };
        self.enter_room(code, Role::Guest, now_ms);
    }

    fn enter_room(&mut self, code: String, role: Role, now_ms: u64) {
        self.reset_room_state();
        self.error = None;
        self.phase = MatchPhase::Lobby;
        self.role = Some(role);
        self.room_code = Some(code.clone());
        self.heartbeat = Some(HeartbeatMonitor::new(now_ms));
        self.push(Effect::Connect(code));
        self.push(Effect::StartTimer(Timer::Heartbeat));
        if role == Role::Guest {
            // announce ourselves so the host learns we are here, and give
            // the host a bounded window to answer
            self.push(Effect::Send(RaceMsg::Ping(self.player_name.clone())));
            self.push(Effect::StartTimer(Timer::JoinTimeout));
        }
    }

    /// Called by the driver when the relay channel could not be opened or
    /// dropped underneath us.
    pub fn channel_failed(&mut self, info: impl Into<String>) {
        self.error = Some(ChallengeError::Signaling { info: info.into() });
    }

    /// Host-only, lobby-only. Re-derives the challenge text when one was
    /// already chosen so the guest converges on the new difficulty.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if self.role != Some(Role::Host) || self.phase != MatchPhase::Lobby {
            return;
        }
        self.difficulty = difficulty;
        if self.challenge_text.is_some() {
            self.select_text();
        }
    }

    /// One-way ready ratchet; there is no un-ready.
    pub fn set_ready(&mut self, _now_ms: u64) {
        if self.phase != MatchPhase::Lobby || !self.opponent_connected || self.ready {
            return;
        }
        self.ready = true;
        self.announce_ready();
        self.maybe_arm_ready_debounce();
    }

    /// Progress from the metrics adapter. While racing, every update goes
    /// out as a `progress` broadcast; the update that completes the race
    /// goes out once as `finish` and flips this side to `finished`.
    pub fn record_progress(&mut self, snapshot: PlayerProgress, complete: bool, now_ms: u64) {
        if self.phase != MatchPhase::Racing || self.self_progress.finished {
            return;
        }
        if complete {
            let finish = PlayerProgress {
                progress: 100,
                finished: true,
                finish_time: Some(now_ms),
                ..snapshot
            };
            self.self_progress = finish.clone();
            self.push(Effect::Send(RaceMsg::Finish(finish)));
            self.advance(PhaseEvent::LocalFinish);
            self.check_reward();
        } else {
            self.self_progress = PlayerProgress {
                finished: false,
                finish_time: None,
                ..snapshot
            };
            self.push(Effect::Send(RaceMsg::Progress(self.self_progress.clone())));
        }
    }

    /// Ask the opponent for another round. They auto-acknowledge; both
    /// sides reset when the handshake completes.
    pub fn request_rematch(&mut self) {
        if self.phase != MatchPhase::Finished {
            return;
        }
        if !self.opponent_connected {
            self.error = Some(ChallengeError::OpponentLost);
            return;
        }
        self.push(Effect::Send(RaceMsg::RestartRequest));
    }

    /// Tear everything down, in order: countdown, heartbeat, join timeout,
    /// then the channel itself, so no queued callback can re-enter state
    /// after the reset. The `left` notice is a best-effort courtesy.
    pub fn leave_room(&mut self) {
        if self.phase == MatchPhase::Idle {
            return;
        }
        self.teardown_channel();
        self.reset_room_state();
        self.error = None;
        self.phase = MatchPhase::Idle;
    }

    // ---- timer callbacks ----

    /// Heartbeat tick: ping the peer, then check for silence. Declaring
    /// the opponent lost mid-progress demotes the match to the lobby but
    /// keeps the room alive so a blip can self-heal.
    pub fn heartbeat_tick(&mut self, now_ms: u64) {
        if self.heartbeat.is_none() {
            return;
        }
        self.push(Effect::Send(RaceMsg::Ping(self.player_name.clone())));
        let overdue = self
            .heartbeat
            .as_ref()
            .map(|hb| hb.is_overdue(now_ms))
            .unwrap_or(false);
        if overdue && self.opponent_connected {
            debug!(room = ?self.room_code, "opponent heartbeat overdue");
            self.opponent_connected = false;
            self.opponent_ready = false;
            if self.phase != MatchPhase::Idle && self.phase != MatchPhase::Finished {
                self.error = Some(ChallengeError::OpponentLost);
                self.demote_to_lobby();
            }
        }
    }

    /// One-second countdown tick; the third one starts the race.
    pub fn countdown_tick(&mut self, _now_ms: u64) {
        if self.phase != MatchPhase::Countdown {
            return;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.push(Effect::StopTimer(Timer::Countdown));
            self.advance(PhaseEvent::CountdownElapsed);
            self.race_started = true;
            self.self_progress = PlayerProgress::default();
        }
    }

    /// Ready debounce expired: re-check every start condition, since the
    /// opponent may have vanished during the grace period.
    pub fn ready_debounce_fired(&mut self, _now_ms: u64) {
        if self.phase == MatchPhase::Lobby && self.handshake_complete() {
            self.begin_countdown();
        }
    }

    /// Join timeout expired without a peep from the room. Advisory only:
    /// the channel stays open and a late host still connects.
    pub fn join_timeout_fired(&mut self, _now_ms: u64) {
        if self.phase == MatchPhase::Lobby && self.opponent_id.is_none() {
            self.error = Some(ChallengeError::PeerUnavailable);
        }
    }

    // ---- reward dispatch callbacks ----

    pub fn reward_fetched(&mut self, url: String) {
        self.reward_in_flight = false;
        if self.reward_url.is_none() {
            self.reward_url = Some(url.clone());
            self.push(Effect::Send(RaceMsg::Reward(url)));
        }
    }

    /// Degraded but acceptable: the reward stays pending and the in-flight
    /// guard stays set, so we never hammer the artifact service.
    pub fn reward_fetch_failed(&mut self) {
        warn!(room = ?self.room_code, "reward fetch failed; leaving reward pending");
    }

    // ---- inbound messages ----

    /// The single entry point for everything the peer says. Self-echoes
    /// are dropped, the first foreign sender becomes the opponent, and
    /// any message from them counts as a heartbeat.
    pub fn handle_envelope(&mut self, env: Envelope, now_ms: u64) {
        if env.sender_id == self.id || self.phase == MatchPhase::Idle {
            return;
        }
        match &self.opponent_id {
            None => {
                self.opponent_id = Some(env.sender_id.clone());
                self.push(Effect::StopTimer(Timer::JoinTimeout));
            }
            Some(id) if *id != env.sender_id => {
                debug!(sender = %env.sender_id, "ignoring third party in room");
                return;
            }
            _ => {}
        }

        if let Some(hb) = &mut self.heartbeat {
            hb.observe(now_ms);
        }
        if !self.opponent_connected {
            self.opponent_connected = true;
            if matches!(
                self.error,
                Some(ChallengeError::OpponentLost)
                    | Some(ChallengeError::OpponentLeft)
                    | Some(ChallengeError::PeerUnavailable)
            ) {
                self.error = None;
            }
            self.on_opponent_connected();
        }

        match env.msg {
            RaceMsg::Ping(name) => {
                if let Some(name) = name {
                    self.opponent_name = Some(name);
                }
                self.push(Effect::Send(RaceMsg::Pong(self.player_name.clone())));
            }
            RaceMsg::Pong(name) => {
                if let Some(name) = name {
                    self.opponent_name = Some(name);
                }
            }
            RaceMsg::Text(text) => self.on_text(text),
            RaceMsg::Progress(p) => {
                if self.race_started && p.is_coherent() {
                    self.opponent_progress = p;
                }
            }
            RaceMsg::Finish(p) => {
                if self.race_started && p.is_coherent() {
                    self.opponent_progress = p;
                    self.check_reward();
                }
            }
            RaceMsg::RestartRequest => {
                self.push(Effect::Send(RaceMsg::RestartAck));
                self.begin_rematch();
            }
            RaceMsg::RestartAck => self.begin_rematch(),
            RaceMsg::Ready { text_hash } => self.on_peer_ready(text_hash),
            RaceMsg::Reward(url) => {
                if self.reward_url.is_none() {
                    self.reward_url = Some(url);
                }
            }
            RaceMsg::Left => self.on_opponent_left(),
        }
    }

    // ---- internals ----

    fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Phase transitions go through the shared table; illegal pairs are
    /// dropped, which is what makes stray or malicious messages harmless.
    fn advance(&mut self, event: PhaseEvent) -> bool {
        match MatchPhase::transition(&self.phase, &event) {
            Some(next) => {
                self.phase = next;
                true
            }
            None => false,
        }
    }

    fn on_opponent_connected(&mut self) {
        if self.role != Some(Role::Host) || self.phase != MatchPhase::Lobby {
            return;
        }
        // first contact in a fresh lobby picks the passage exactly once;
        // a replacement guest instead gets the already-chosen one
        match &self.challenge_text {
            None => self.select_text(),
            Some(text) => {
                let text = text.to_string();
                self.push(Effect::Send(RaceMsg::Text(text)));
            }
        }
    }

    fn select_text(&mut self) {
        let text = self.picker.pick(self.difficulty);
        self.challenge_text = Some(Arc::from(text));
        self.push(Effect::Send(RaceMsg::Text(text.to_string())));
        if self.ready {
            // our ready digest went stale with the old passage
            self.announce_ready();
        }
        self.maybe_arm_ready_debounce();
    }

    fn on_text(&mut self, text: String) {
        // the passage is locked from countdown on; late selections must
        // not corrupt a race in progress
        if self.phase != MatchPhase::Lobby || text.is_empty() {
            return;
        }
        self.challenge_text = Some(Arc::from(text.as_str()));
        if self.ready {
            self.announce_ready();
        }
        self.maybe_arm_ready_debounce();
    }

    fn announce_ready(&mut self) {
        let text_hash = self.challenge_text.as_deref().map(text_digest);
        self.push(Effect::Send(RaceMsg::Ready { text_hash }));
    }

    fn on_peer_ready(&mut self, text_hash: Option<u64>) {
        if self.phase != MatchPhase::Lobby {
            return;
        }
        if let (Some(hash), Some(text)) = (text_hash, self.challenge_text.as_deref()) {
            if hash != text_digest(text) {
                // the peer readied against a stale passage; the host
                // re-issues the authoritative text instead of racing on
                // mismatched ones
                debug!("peer ready carried a stale text digest");
                if self.role == Some(Role::Host) {
                    let text = text.to_string();
                    self.push(Effect::Send(RaceMsg::Text(text)));
                }
                return;
            }
        }
        self.opponent_ready = true;
        self.maybe_arm_ready_debounce();
    }

    fn handshake_complete(&self) -> bool {
        self.ready
            && self.opponent_ready
            && self.opponent_connected
            && self.challenge_text.is_some()
    }

    fn maybe_arm_ready_debounce(&mut self) {
        if self.phase == MatchPhase::Lobby && self.handshake_complete() {
            self.push(Effect::StartTimer(Timer::ReadyDebounce));
        }
    }

    fn begin_countdown(&mut self) {
        if !self.advance(PhaseEvent::ReadyHandshake) {
            return;
        }
        self.error = None;
        self.countdown = COUNTDOWN_START;
        // lock the passage; re-selections can no longer touch this race
        self.locked_text = self.challenge_text.clone();
        self.push(Effect::StartTimer(Timer::Countdown));
    }

    fn begin_rematch(&mut self) {
        if !self.advance(PhaseEvent::RematchAgreed) {
            return;
        }
        self.opponent_progress = PlayerProgress::default();
        self.self_progress = PlayerProgress::default();
        self.ready = false;
        self.opponent_ready = false;
        self.challenge_text = None;
        self.locked_text = None;
        self.race_started = false;
        self.countdown = COUNTDOWN_START;
        self.reward_url = None;
        self.reward_in_flight = false;
        self.error = None;
        if self.role == Some(Role::Host) && self.opponent_connected {
            self.select_text();
        }
    }

    fn demote_to_lobby(&mut self) {
        if self.advance(PhaseEvent::OpponentLost) {
            self.push(Effect::StopTimer(Timer::Countdown));
            self.push(Effect::StopTimer(Timer::ReadyDebounce));
            self.ready = false;
            self.countdown = COUNTDOWN_START;
        }
    }

    fn on_opponent_left(&mut self) {
        self.opponent_connected = false;
        self.opponent_ready = false;
        self.opponent_id = None;
        // the seat is open again; a replacement guest starts from a clean
        // handshake, so our own ready ratchet resets too
        self.ready = false;
        self.error = Some(ChallengeError::OpponentLeft);
        self.demote_to_lobby();
    }

    fn check_reward(&mut self) {
        if self.verdict() == Some(Verdict::Win)
            && self.reward_url.is_none()
            && !self.reward_in_flight
        {
            self.reward_in_flight = true;
            self.push(Effect::FetchReward);
        }
    }

    fn teardown_channel(&mut self) {
        self.push(Effect::StopTimer(Timer::Countdown));
        self.push(Effect::StopTimer(Timer::Heartbeat));
        self.push(Effect::StopTimer(Timer::JoinTimeout));
        self.push(Effect::StopTimer(Timer::ReadyDebounce));
        self.push(Effect::Send(RaceMsg::Left));
        self.push(Effect::Disconnect);
        self.heartbeat = None;
    }

    fn reset_room_state(&mut self) {
        if self.room_code.is_some() && self.heartbeat.is_some() {
            // switching rooms without an explicit leave still says goodbye
            self.teardown_channel();
        }
        self.phase = MatchPhase::Idle;
        self.role = None;
        self.room_code = None;
        self.opponent_id = None;
        self.opponent_connected = false;
        self.opponent_name = None;
        self.opponent_progress = PlayerProgress::default();
        self.opponent_ready = false;
        self.self_progress = PlayerProgress::default();
        self.ready = false;
        self.challenge_text = None;
        self.locked_text = None;
        self.race_started = false;
        self.countdown = COUNTDOWN_START;
        self.heartbeat = None;
        self.reward_url = None;
        self.reward_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sends(session: &mut RaceSession) -> Vec<RaceMsg> {
        session
            .drain_effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Send(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn create_room_opens_a_channel_and_hosts() {
        let mut session = RaceSession::with_id("a".to_string(), Some("Ann".to_string()));
        session.create_room(0);
        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert!(session.is_host());
        let code = session.room_code().unwrap().to_string();
        let effects = session.drain_effects();
        assert!(effects.contains(&Effect::Connect(code)));
        assert!(effects.contains(&Effect::StartTimer(Timer::Heartbeat)));
    }

    #[test]
    fn short_join_code_is_rejected_before_any_transport() {
        let mut session = RaceSession::with_id("a".to_string(), None);
        session.join_room(" abc ", 0);
        assert_eq!(session.phase(), MatchPhase::Idle);
        assert_eq!(session.error(), Some(&ChallengeError::InvalidRoomCode));
        assert!(session.drain_effects().is_empty());
    }

    #[test]
    fn ready_is_a_one_way_ratchet_and_needs_an_opponent() {
        let mut session = RaceSession::with_id("a".to_string(), None);
        session.create_room(0);
        session.drain_effects();

        // nobody connected yet: ignored
        session.set_ready(1);
        assert!(!session.is_ready());

        session.handle_envelope(Envelope::new("b", RaceMsg::Ping(None)), 2);
        session.drain_effects();
        session.set_ready(3);
        assert!(session.is_ready());

        // a second call must not re-announce
        session.drain_effects();
        session.set_ready(4);
        assert!(sends(&mut session).is_empty());
    }

    #[test]
    fn difficulty_changes_are_host_and_lobby_only() {
        let mut session = RaceSession::with_id("a".to_string(), None);
        session.join_room("ROOM42", 0);
        session.set_difficulty(Difficulty::Hard);
        assert_eq!(session.difficulty(), Difficulty::Medium);

        let mut host = RaceSession::with_id("h".to_string(), None);
        host.create_room(0);
        host.set_difficulty(Difficulty::Hard);
        assert_eq!(host.difficulty(), Difficulty::Hard);
    }

    #[test]
    fn host_picks_text_once_on_first_contact() {
        let mut host = RaceSession::with_id("h".to_string(), None);
        host.create_room(0);
        host.drain_effects();

        host.handle_envelope(Envelope::new("g", RaceMsg::Ping(None)), 1);
        let first: Vec<_> = sends(&mut host)
            .into_iter()
            .filter(|m| matches!(m, RaceMsg::Text(_)))
            .collect();
        assert_eq!(first.len(), 1);

        // further messages must not re-pick
        host.handle_envelope(Envelope::new("g", RaceMsg::Pong(None)), 2);
        let again: Vec<_> = sends(&mut host)
            .into_iter()
            .filter(|m| matches!(m, RaceMsg::Text(_)))
            .collect();
        assert!(again.is_empty());
    }

    #[test]
    fn third_party_senders_are_ignored() {
        let mut host = RaceSession::with_id("h".to_string(), None);
        host.create_room(0);
        host.drain_effects();
        host.handle_envelope(Envelope::new("g", RaceMsg::Ping(None)), 1);
        host.drain_effects();

        host.handle_envelope(
            Envelope::new("intruder", RaceMsg::Ready { text_hash: None }),
            2,
        );
        assert!(!host.is_opponent_ready());
    }

    #[test]
    fn own_echoes_are_dropped() {
        let mut host = RaceSession::with_id("h".to_string(), None);
        host.create_room(0);
        host.drain_effects();
        host.handle_envelope(Envelope::new("h", RaceMsg::Ping(None)), 1);
        assert!(!host.opponent_connected());
    }

    #[test]
    fn stale_ready_digest_is_ignored_and_text_reissued() {
        let mut host = RaceSession::with_id("h".to_string(), None);
        host.create_room(0);
        host.drain_effects();
        host.handle_envelope(Envelope::new("g", RaceMsg::Ping(None)), 1);
        host.drain_effects();

        host.handle_envelope(
            Envelope::new(
                "g",
                RaceMsg::Ready {
                    text_hash: Some(text_digest("some other passage")),
                },
            ),
            2,
        );
        assert!(!host.is_opponent_ready());
        let reissued = sends(&mut host)
            .into_iter()
            .any(|m| matches!(m, RaceMsg::Text(_)));
        assert!(reissued);
    }

    #[test]
    fn leave_room_tears_down_in_order() {
        let mut session = RaceSession::with_id("a".to_string(), None);
        session.create_room(0);
        session.drain_effects();
        session.leave_room();
        let effects = session.drain_effects();
        let positions: Vec<usize> = [
            Effect::StopTimer(Timer::Countdown),
            Effect::StopTimer(Timer::Heartbeat),
            Effect::StopTimer(Timer::JoinTimeout),
            Effect::Send(RaceMsg::Left),
            Effect::Disconnect,
        ]
        .iter()
        .map(|wanted| effects.iter().position(|e| e == wanted).unwrap())
        .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
        assert_eq!(session.phase(), MatchPhase::Idle);
        assert_eq!(session.room_code(), None);
    }

    #[test]
    fn leaving_idle_is_a_no_op() {
        let mut session = RaceSession::with_id("a".to_string(), None);
        session.leave_room();
        assert!(session.drain_effects().is_empty());
    }
}
