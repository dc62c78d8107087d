//! Login session state shared by the token-based scanners
//!
//! ```text
//! LoggedOut ──login──▶ LoggingIn ──ok──▶ Active(T) ──expiry──▶ Expired
//!     ▲                    │ fail                                 │
//!     └────────────────────┘        next scan logs in again ◀─────┘
//! ```

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState<T> {
    LoggedOut,
    LoggingIn,
    Active(T),
    Expired,
}

impl<T> Default for SessionState<T> {
    fn default() -> Self {
        SessionState::LoggedOut
    }
}

impl<T> SessionState<T> {
    pub fn active(&self) -> Option<&T> {
        match self {
            SessionState::Active(tokens) => Some(tokens),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    /// Anything but `Active` requires a login before the next request
    pub fn needs_login(&self) -> bool {
        !self.is_active()
    }

    pub fn begin_login(&mut self) {
        *self = SessionState::LoggingIn;
    }

    pub fn activate(&mut self, tokens: T) {
        *self = SessionState::Active(tokens);
    }

    pub fn login_failed(&mut self) {
        *self = SessionState::LoggedOut;
    }

    /// Server reported the session as gone; tokens are dropped
    pub fn expire(&mut self) {
        *self = SessionState::Expired;
    }

    /// Drop the session, returning the tokens if one was active
    pub fn reset(&mut self) -> Option<T> {
        match std::mem::take(self) {
            SessionState::Active(tokens) => Some(tokens),
            _ => None,
        }
    }
}
