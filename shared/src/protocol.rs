use serde::{Deserialize, Serialize};

/// One peer's metrics snapshot, exchanged on every update while racing.
///
/// Each client owns its own snapshot and only ever replaces its cached
/// copy of the opponent's wholesale on message receipt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProgress {
    /// Typed share of the passage, integer percent.
    pub progress: u8,
    pub wpm: u32,
    /// Integer percent over all attempted keystrokes.
    pub accuracy: u8,
    pub correct_chars: u32,
    pub incorrect_chars: u32,
    /// Seconds since the first keystroke.
    pub elapsed_time: f64,
    pub finished: bool,
    /// Absolute unix millis, set exactly once when the finish condition is met.
    pub finish_time: Option<u64>,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self {
            progress: 0,
            wpm: 0,
            accuracy: 100,
            correct_chars: 0,
            incorrect_chars: 0,
            elapsed_time: 0.0,
            finished: false,
            finish_time: None,
        }
    }
}

impl PlayerProgress {
    /// `finished` implies a finish timestamp and 100% progress. The converse
    /// does not hold: full-length input below the accuracy floor is not a
    /// finish.
    pub fn is_coherent(&self) -> bool {
        !self.finished || (self.finish_time.is_some() && self.progress == 100)
    }
}

/// Everything a peer can say to the other peer. Tags and payloads are the
/// full wire surface; unknown tags or missing fields fail deserialization
/// and the frame is dropped.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum RaceMsg {
    /// Liveness probe, carrying the sender's display name so a freshly
    /// joined peer learns it without a separate handshake.
    Ping(Option<String>),
    Pong(Option<String>),
    /// The host's chosen passage for the next race.
    Text(String),
    Progress(PlayerProgress),
    Finish(PlayerProgress),
    RestartRequest,
    RestartAck,
    /// One-way ready ratchet. The digest lets the receiver detect that the
    /// sender readied up against a stale passage.
    #[serde(rename_all = "camelCase")]
    Ready { text_hash: Option<u64> },
    Reward(String),
    Left,
}

/// Room-scoped broadcast envelope. `sender_id` exists solely so clients can
/// drop their own echoes and lock onto one opponent; it authenticates
/// nothing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub sender_id: String,
    #[serde(flatten)]
    pub msg: RaceMsg,
}

impl Envelope {
    pub fn new(sender_id: impl Into<String>, msg: RaceMsg) -> Self {
        Self {
            sender_id: sender_id.into(),
            msg,
        }
    }
}

/// Digest of the challenge text carried in `ready`. Both peers run the same
/// build, so the std hasher's fixed keys make this stable across them.
pub fn text_digest(text: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
