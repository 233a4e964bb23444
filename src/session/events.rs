use crate::errors::RenewalError;

/// Lifecycle notifications published by the session coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A credential pair was stored (login).
    Started,
    /// The access token was renewed.
    Renewed,
    /// Credentials were cleared; the user has to log in again.
    Ended { reason: EndReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LoggedOut,
    RenewalFailed(RenewalError),
}
