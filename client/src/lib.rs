//! Headless client core for the VS challenge race mode: a peer-symmetric
//! match state machine, heartbeat-based liveness, a relay transport, and
//! the glue that turns local typing metrics into wire snapshots.
//!
//! The embedding UI talks to a [`driver::RaceDriver`] through commands and
//! watches [`driver::SessionView`] snapshots; everything race-critical is
//! decided inside [`session::RaceSession`], which is a deterministic
//! reducer and can be driven entirely from tests without a network.

pub mod driver;
pub mod error;
pub mod handoff;
pub mod heartbeat;
pub mod metrics;
pub mod profile;
pub mod reward;
pub mod session;
pub mod transport;

pub use error::ChallengeError;
pub use session::{Effect, RaceSession, Role, Timer};
