//! Session connection state machine.
//!
//! Transitions are driven only by network events and explicit user stop.
//! Kept free of I/O so every edge is directly testable.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Error,
}

impl SessionState {
    /// An explicit start request. Re-entrant starts are no-ops: a session
    /// already connecting or connected stays where it is.
    pub fn on_start(self) -> SessionState {
        match self {
            SessionState::Idle | SessionState::Error => SessionState::Connecting,
            SessionState::Connecting | SessionState::Connected => self,
        }
    }

    /// The remote endpoint accepted the session (server hello).
    pub fn on_accepted(self) -> SessionState {
        match self {
            SessionState::Connecting => SessionState::Connected,
            other => other,
        }
    }

    /// A transport-level failure: abnormal disconnect, refused connection,
    /// timeout. Malformed messages never come through here.
    pub fn on_transport_failure(self) -> SessionState {
        match self {
            SessionState::Connecting | SessionState::Connected => SessionState::Error,
            other => other,
        }
    }

    /// Explicit user stop, valid from every state.
    pub fn on_stop(self) -> SessionState {
        SessionState::Idle
    }

    /// Capture frames and inbound audio/control are only processed here.
    pub fn is_connected(self) -> bool {
        self == SessionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn start_is_idempotent_while_active() {
        assert_eq!(Idle.on_start(), Connecting);
        assert_eq!(Connecting.on_start(), Connecting);
        assert_eq!(Connected.on_start(), Connected);
        assert_eq!(Error.on_start(), Connecting);
    }

    #[test]
    fn accept_only_applies_while_connecting() {
        assert_eq!(Connecting.on_accepted(), Connected);
        assert_eq!(Idle.on_accepted(), Idle);
        assert_eq!(Error.on_accepted(), Error);
    }

    #[test]
    fn transport_failure_from_either_active_state() {
        assert_eq!(Connecting.on_transport_failure(), Error);
        assert_eq!(Connected.on_transport_failure(), Error);
        assert_eq!(Idle.on_transport_failure(), Idle);
    }

    #[test]
    fn stop_always_returns_to_idle() {
        for s in [Idle, Connecting, Connected, Error] {
            assert_eq!(s.on_stop(), Idle);
        }
    }
}
