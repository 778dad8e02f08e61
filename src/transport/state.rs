//! Connection state machine
//!
//! All socket lifecycle changes go through `ConnState::apply` with a named
//! event; scattered callback-side mutation is what made the reconnect
//! logic untestable in earlier designs.

/// Connection state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    /// No socket; a connect may be requested or scheduled
    #[default]
    Disconnected,

    /// Connect attempt in flight
    Connecting,

    /// Socket open, frames flow
    Connected,

    /// Torn down for good; no further transitions
    Closed,
}

/// Named transition events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnEvent {
    /// A connect attempt starts (initial or scheduled retry)
    ConnectRequested,

    /// The socket handshake completed
    Opened,

    /// The socket dropped or the connect attempt failed
    Lost,

    /// Explicit teardown; also used when the retry budget is exhausted
    Teardown,
}

/// Transition rejected: `event` is not valid in `state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub state: ConnState,
    pub event: ConnEvent,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event {:?} not valid in state {:?}", self.event, self.state)
    }
}

impl std::error::Error for InvalidTransition {}

impl ConnState {
    /// Single dispatch point for all state changes
    pub fn apply(self, event: ConnEvent) -> Result<ConnState, InvalidTransition> {
        use ConnEvent::*;
        use ConnState::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Ok(Connecting),
            (Connecting, Opened) => Ok(Connected),
            // a failed connect attempt and a dropped connection land in the
            // same place: wait out the delay, then retry
            (Connecting, Lost) => Ok(Disconnected),
            (Connected, Lost) => Ok(Disconnected),
            (_, Teardown) => Ok(Closed),
            (state, event) => Err(InvalidTransition { state, event }),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnState::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnState::Closed)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConnState::Disconnected => "Disconnected",
            ConnState::Connecting => "Connecting",
            ConnState::Connected => "Connected",
            ConnState::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnEvent::*;
    use ConnState::*;

    #[test]
    fn test_happy_path() {
        let state = Disconnected;
        let state = state.apply(ConnectRequested).unwrap();
        assert_eq!(state, Connecting);
        let state = state.apply(Opened).unwrap();
        assert_eq!(state, Connected);
        assert!(state.is_connected());
    }

    #[test]
    fn test_reconnect_cycle() {
        // drop, retry, reconnect, repeatedly
        let mut state = Connected;
        for _ in 0..3 {
            state = state.apply(Lost).unwrap();
            assert_eq!(state, Disconnected);
            state = state.apply(ConnectRequested).unwrap();
            state = state.apply(Opened).unwrap();
            assert_eq!(state, Connected);
        }
    }

    #[test]
    fn test_failed_connect_goes_back_to_disconnected() {
        let state = Disconnected.apply(ConnectRequested).unwrap();
        let state = state.apply(Lost).unwrap();
        assert_eq!(state, Disconnected);
    }

    #[test]
    fn test_teardown_from_any_state() {
        for state in [Disconnected, Connecting, Connected, Closed] {
            assert_eq!(state.apply(Teardown).unwrap(), Closed);
        }
    }

    #[test]
    fn test_closed_is_final() {
        assert!(Closed.apply(ConnectRequested).is_err());
        assert!(Closed.apply(Opened).is_err());
        assert!(Closed.apply(Lost).is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(Disconnected.apply(Opened).is_err());
        assert!(Disconnected.apply(Lost).is_err());
        assert!(Connected.apply(Opened).is_err());
        assert!(Connected.apply(ConnectRequested).is_err());
        assert!(Connecting.apply(ConnectRequested).is_err());
    }
}
