/// Where a window is in its life.
///
/// ```text
/// Created -> AwaitingConnection -> Ready <-> Navigating
///                    \               |          /
///                     +---------> Closing <----+
///                                    |
///                                  Closed
/// ```
///
/// `Closing` and `Closed` are terminal: nothing moves a window out of
/// them, and a late registration cannot make it ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    Created,
    /// Renderer spawned, no registration seen yet.
    AwaitingConnection,
    Ready,
    /// A navigation or content swap is in flight; the renderer will
    /// reconnect and register again.
    Navigating,
    Closing,
    Closed,
}

impl WindowState {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Next state once the renderer process is running.
    pub(crate) fn on_spawned(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::AwaitingConnection),
            _ => None,
        }
    }

    /// Next state after a successful registration.
    pub(crate) fn on_registered(self) -> Option<Self> {
        match self {
            Self::Created | Self::AwaitingConnection | Self::Navigating => Some(Self::Ready),
            Self::Ready | Self::Closing | Self::Closed => None,
        }
    }

    /// Next state when the page is about to be replaced.
    pub(crate) fn on_navigate(self) -> Option<Self> {
        if self.is_terminal() {
            None
        } else {
            Some(Self::Navigating)
        }
    }

    pub(crate) fn on_close_requested(self) -> Option<Self> {
        if self.is_terminal() {
            None
        } else {
            Some(Self::Closing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let s = WindowState::Created;
        let s = s.on_spawned().unwrap();
        assert_eq!(s, WindowState::AwaitingConnection);
        let s = s.on_registered().unwrap();
        assert!(s.is_ready());
        let s = s.on_navigate().unwrap();
        assert_eq!(s, WindowState::Navigating);
        assert!(!s.is_ready());
        let s = s.on_registered().unwrap();
        assert!(s.is_ready());
        let s = s.on_close_requested().unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn repeated_registration_is_not_a_transition() {
        assert_eq!(WindowState::Ready.on_registered(), None);
    }

    #[test]
    fn terminal_states_do_not_move() {
        for s in [WindowState::Closing, WindowState::Closed] {
            assert_eq!(s.on_registered(), None);
            assert_eq!(s.on_navigate(), None);
            assert_eq!(s.on_close_requested(), None);
            assert_eq!(s.on_spawned(), None);
        }
    }

    #[test]
    fn navigate_before_first_registration() {
        let s = WindowState::AwaitingConnection.on_navigate().unwrap();
        assert_eq!(s.on_registered(), Some(WindowState::Ready));
    }
}
