//! The single-threaded event loop around [`RaceSession`]: one task that
//! multiplexes caller commands, inbound relay envelopes, and the named
//! timers, then executes whatever effects the reducer emitted. All state
//! mutation funnels through this loop, which is what upholds the
//! single-writer rule without any locking.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use shared::arbiter::Verdict;
use shared::fsm::MatchPhase;
use shared::passages::Difficulty;
use shared::protocol::{Envelope, PlayerProgress};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Duration, Instant, Interval, Sleep};
use tracing::warn;

use crate::heartbeat::HEARTBEAT_INTERVAL;
use crate::reward::RewardSource;
use crate::session::{Effect, RaceSession, Timer, JOIN_TIMEOUT, READY_DEBOUNCE};
use crate::transport::{self, RelayChannel};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Everything the embedding UI can ask the race core to do.
#[derive(Clone, Debug)]
pub enum Command {
    CreateRoom,
    /// Host under a pre-minted code from the lobby handoff.
    HostRoom(String),
    JoinRoom(String),
    SetReady,
    SetDifficulty(Difficulty),
    /// A fresh metrics snapshot from the typing engine.
    Progress {
        snapshot: PlayerProgress,
        complete: bool,
    },
    RequestRematch,
    LeaveRoom,
    SetPlayerName(String),
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the relay, e.g. `ws://localhost:3000`.
    pub relay_url: String,
    /// Endpoint the winner fetches the reward artifact from.
    pub reward_endpoint: String,
}

/// Read-only snapshot of the session published after every loop turn.
#[derive(Clone, Debug, Default)]
pub struct SessionView {
    pub phase: MatchPhase,
    pub room_code: Option<String>,
    pub is_host: bool,
    pub opponent_connected: bool,
    pub opponent_name: Option<String>,
    pub opponent_progress: PlayerProgress,
    pub self_progress: PlayerProgress,
    pub is_ready: bool,
    pub is_opponent_ready: bool,
    pub challenge_text: Option<String>,
    pub countdown: u8,
    pub error: Option<String>,
    pub reward_url: Option<String>,
    pub verdict: Option<Verdict>,
}

/// Caller's end of the driver: send commands, watch views.
pub struct DriverHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub updates: watch::Receiver<SessionView>,
}

pub struct RaceDriver {
    session: RaceSession,
    config: ClientConfig,
    rewards: Arc<dyn RewardSource>,
    commands: mpsc::UnboundedReceiver<Command>,
    updates: watch::Sender<SessionView>,
}

impl RaceDriver {
    pub fn new(
        config: ClientConfig,
        session: RaceSession,
        rewards: Arc<dyn RewardSource>,
    ) -> (Self, DriverHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionView::default());
        (
            Self {
                session,
                config,
                rewards,
                commands: cmd_rx,
                updates: view_tx,
            },
            DriverHandle {
                commands: cmd_tx,
                updates: view_rx,
            },
        )
    }

    /// Runs until the command side hangs up; a best-effort leave goes out
    /// on the way down.
    pub async fn run(self) {
        let RaceDriver {
            mut session,
            config,
            rewards,
            mut commands,
            updates,
        } = self;

        let mut channel: Option<RelayChannel> = None;
        let mut inbound: Option<mpsc::UnboundedReceiver<Envelope>> = None;
        let mut heartbeat: Option<Interval> = None;
        let mut countdown: Option<Interval> = None;
        let mut join_timeout: Option<Pin<Box<Sleep>>> = None;
        let mut ready_debounce: Option<Pin<Box<Sleep>>> = None;

        let (reward_tx, mut reward_rx) = mpsc::unbounded_channel::<Result<String>>();

        let mut running = true;
        while running {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => dispatch(&mut session, cmd),
                        None => {
                            session.leave_room();
                            running = false;
                        }
                    }
                }

                env = async {
                    match inbound.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match env {
                        Some(env) => session.handle_envelope(env, now_ms()),
                        None => {
                            inbound = None;
                            channel = None;
                            session.channel_failed("relay connection closed");
                        }
                    }
                }

                _ = async {
                    match heartbeat.as_mut() {
                        Some(timer) => {
                            timer.tick().await;
                        }
                        None => std::future::pending().await,
                    }
                } => {
                    session.heartbeat_tick(now_ms());
                }

                _ = async {
                    match countdown.as_mut() {
                        Some(timer) => {
                            timer.tick().await;
                        }
                        None => std::future::pending().await,
                    }
                } => {
                    session.countdown_tick(now_ms());
                }

                _ = async {
                    match join_timeout.as_mut() {
                        Some(timer) => timer.as_mut().await,
                        None => std::future::pending().await,
                    }
                } => {
                    join_timeout = None;
                    session.join_timeout_fired(now_ms());
                }

                _ = async {
                    match ready_debounce.as_mut() {
                        Some(timer) => timer.as_mut().await,
                        None => std::future::pending().await,
                    }
                } => {
                    ready_debounce = None;
                    session.ready_debounce_fired(now_ms());
                }

                result = reward_rx.recv() => {
                    match result {
                        Some(Ok(url)) => session.reward_fetched(url),
                        Some(Err(err)) => {
                            warn!(?err, "reward fetch failed");
                            session.reward_fetch_failed();
                        }
                        None => {}
                    }
                }
            }

            apply_effects(
                &mut session,
                &config,
                &rewards,
                &reward_tx,
                &mut channel,
                &mut inbound,
                &mut heartbeat,
                &mut countdown,
                &mut join_timeout,
                &mut ready_debounce,
            )
            .await;
            let _ = updates.send(view_of(&session));
        }
    }
}

fn dispatch(session: &mut RaceSession, cmd: Command) {
    let now = now_ms();
    match cmd {
        Command::CreateRoom => session.create_room(now),
        Command::HostRoom(code) => session.host_room(&code, now),
        Command::JoinRoom(code) => session.join_room(&code, now),
        Command::SetReady => session.set_ready(now),
        Command::SetDifficulty(difficulty) => session.set_difficulty(difficulty),
        Command::Progress { snapshot, complete } => {
            session.record_progress(snapshot, complete, now)
        }
        Command::RequestRematch => session.request_rematch(),
        Command::LeaveRoom => session.leave_room(),
        Command::SetPlayerName(name) => session.set_player_name(&name),
    }
}

#[allow(clippy::too_many_arguments)]
async fn apply_effects(
    session: &mut RaceSession,
    config: &ClientConfig,
    rewards: &Arc<dyn RewardSource>,
    reward_tx: &mpsc::UnboundedSender<Result<String>>,
    channel: &mut Option<RelayChannel>,
    inbound: &mut Option<mpsc::UnboundedReceiver<Envelope>>,
    heartbeat: &mut Option<Interval>,
    countdown: &mut Option<Interval>,
    join_timeout: &mut Option<Pin<Box<Sleep>>>,
    ready_debounce: &mut Option<Pin<Box<Sleep>>>,
) {
    for effect in session.drain_effects() {
        match effect {
            Effect::Connect(room) => {
                match transport::connect(&config.relay_url, &room).await {
                    Ok((ch, rx)) => {
                        *channel = Some(ch);
                        *inbound = Some(rx);
                    }
                    Err(err) => {
                        warn!(%room, ?err, "failed to open relay channel");
                        session.channel_failed(err.to_string());
                    }
                }
            }
            Effect::Disconnect => {
                *channel = None;
                *inbound = None;
            }
            Effect::Send(msg) => {
                if let Some(ch) = channel.as_ref() {
                    ch.send(Envelope::new(session.id(), msg));
                }
            }
            Effect::StartTimer(Timer::Heartbeat) => {
                *heartbeat = Some(interval_at(
                    Instant::now() + HEARTBEAT_INTERVAL,
                    HEARTBEAT_INTERVAL,
                ));
            }
            Effect::StartTimer(Timer::Countdown) => {
                *countdown = Some(interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK));
            }
            Effect::StartTimer(Timer::JoinTimeout) => {
                *join_timeout = Some(Box::pin(sleep(JOIN_TIMEOUT)));
            }
            Effect::StartTimer(Timer::ReadyDebounce) => {
                *ready_debounce = Some(Box::pin(sleep(READY_DEBOUNCE)));
            }
            Effect::StopTimer(Timer::Heartbeat) => *heartbeat = None,
            Effect::StopTimer(Timer::Countdown) => *countdown = None,
            Effect::StopTimer(Timer::JoinTimeout) => *join_timeout = None,
            Effect::StopTimer(Timer::ReadyDebounce) => *ready_debounce = None,
            Effect::FetchReward => {
                let source = rewards.clone();
                let tx = reward_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(source.fetch().await);
                });
            }
        }
    }
}

fn view_of(session: &RaceSession) -> SessionView {
    SessionView {
        phase: session.phase(),
        room_code: session.room_code().map(str::to_string),
        is_host: session.is_host(),
        opponent_connected: session.opponent_connected(),
        opponent_name: session.opponent_name().map(str::to_string),
        opponent_progress: session.opponent_progress().clone(),
        self_progress: session.self_progress().clone(),
        is_ready: session.is_ready(),
        is_opponent_ready: session.is_opponent_ready(),
        challenge_text: session.challenge_text().map(str::to_string),
        countdown: session.countdown(),
        error: session.error().map(|e| e.to_string()),
        reward_url: session.reward_url().map(str::to_string),
        verdict: session.verdict(),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
