//! Pure race logic shared by the client core and the relay: the wire
//! protocol, the match-phase state machine, winner arbitration, room
//! codes, the passage pool, and WPM math. No I/O lives here.

pub mod arbiter;
pub mod fsm;
pub mod passages;
pub mod protocol;
pub mod room_code;
pub mod wpm;
