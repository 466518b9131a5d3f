use std::fmt;
use std::sync::PoisonError;

use crate::rtp_session::rtp_session_error::RtpSessionError;

/// Errors the engine facade's boundary methods can return. No panic or
/// exception is expected to escape this boundary; every public method
/// returns one of these instead.
#[derive(Debug)]
pub enum EngineError {
    /// `join_room` was called before `set_local_name`.
    NotNamed,
    /// `join_room` was called before `set_destination`.
    NoDestination,
    /// `join_room` was called while already in a room.
    AlreadyInRoom,
    /// `leave_room`/`enable_push` acted on a call that requires an active room.
    NotInRoom,
    /// `join_room` was called before the named codec factory was registered.
    MissingCodecFactory(&'static str),
    Rtp(RtpSessionError),
    Io(std::io::Error),
    Mutex(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EngineError::*;
        match self {
            NotNamed => write!(f, "set_local_name must succeed before join_room"),
            NoDestination => write!(f, "set_destination must be called before join_room"),
            AlreadyInRoom => write!(f, "already in a room; leave_room first"),
            NotInRoom => write!(f, "not currently in a room"),
            MissingCodecFactory(which) => write!(f, "no {which} factory registered"),
            Rtp(e) => write!(f, "rtp session error: {e}"),
            Io(e) => write!(f, "io error: {e}"),
            Mutex(msg) => write!(f, "lock poisoned: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RtpSessionError> for EngineError {
    fn from(e: RtpSessionError) -> Self {
        EngineError::Rtp(e)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl<T> From<PoisonError<T>> for EngineError {
    fn from(e: PoisonError<T>) -> Self {
        EngineError::Mutex(e.to_string())
    }
}
