use rust_fsm::*;

/// Lifecycle of one race. Both peers run this machine independently and
/// converge through message exchange; there is no shared authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Lobby,
    Countdown,
    Racing,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseEvent {
    EnterRoom,
    ReadyHandshake,
    CountdownElapsed,
    LocalFinish,
    RematchAgreed,
    OpponentLost,
    Leave,
}

impl StateMachineImpl for MatchPhase {
    type Input = PhaseEvent;
    type State = MatchPhase;
    type Output = ();

    const INITIAL_STATE: Self::State = MatchPhase::Idle;

    fn transition(state: &Self::State, input: &Self::Input) -> Option<Self::State> {
        match (state, input) {
            (MatchPhase::Idle, PhaseEvent::EnterRoom) => Some(MatchPhase::Lobby),
            (MatchPhase::Lobby, PhaseEvent::ReadyHandshake) => Some(MatchPhase::Countdown),
            (MatchPhase::Countdown, PhaseEvent::CountdownElapsed) => Some(MatchPhase::Racing),
            (MatchPhase::Racing, PhaseEvent::LocalFinish) => Some(MatchPhase::Finished),
            (MatchPhase::Finished, PhaseEvent::RematchAgreed) => Some(MatchPhase::Lobby),
            // Losing the opponent mid-progress demotes back to the lobby;
            // in any other phase the loss is just a flag flip.
            (MatchPhase::Countdown | MatchPhase::Racing, PhaseEvent::OpponentLost) => {
                Some(MatchPhase::Lobby)
            }
            (MatchPhase::Idle, PhaseEvent::Leave) => None,
            (_, PhaseEvent::Leave) => Some(MatchPhase::Idle),
            _ => None,
        }
    }

    fn output(_state: &Self::State, _input: &Self::Input) -> Option<Self::Output> {
        None
    }
}

impl Default for MatchPhase {
    fn default() -> Self {
        MatchPhase::Idle
    }
}
