use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Errors the race core surfaces to the embedding UI. None of them are
/// fatal: every one is recoverable by leaving the room and retrying, and
/// liveness errors clear themselves when the peer resumes talking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    /// The join code is malformed (too short after trimming). Rejected
    /// before any transport activity.
    InvalidRoomCode,
    /// The relay channel could not be opened or dropped mid-session.
    Signaling {
        /// Further detail from the transport layer.
        info: String,
    },
    /// Nobody answered in the room within the join timeout.
    PeerUnavailable,
    /// The opponent stopped answering heartbeats.
    OpponentLost,
    /// The opponent broadcast an explicit leave notice.
    OpponentLeft,
}

impl Display for ChallengeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeError::InvalidRoomCode => {
                write!(f, "Invalid room code.")
            }
            ChallengeError::Signaling { info } => {
                write!(f, "Connection to the relay failed: {}", info)
            }
            ChallengeError::PeerUnavailable => {
                write!(f, "Room not found or host is inactive.")
            }
            ChallengeError::OpponentLost => {
                write!(f, "Opponent connection lost.")
            }
            ChallengeError::OpponentLeft => {
                write!(f, "Opponent has left the room.")
            }
        }
    }
}

impl Error for ChallengeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            ChallengeError::InvalidRoomCode.to_string(),
            "Invalid room code."
        );
        assert!(ChallengeError::Signaling {
            info: "refused".to_string()
        }
        .to_string()
        .contains("refused"));
    }
}
