use std::fmt;
use std::result;

use thiserror::Error as ThisError;

use crate::constants::*;

/// Raw engine return code. Zero is success.
pub type Status = i32;

/// Result of a raw engine call
pub type EngineResult<T> = result::Result<T, Status>;

/// Result type for synchronous handle operations
pub type Result<T> = result::Result<T, HandleError>;

/// Engine return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User memory too small for return value
    BufferSmall,
    /// Secondary index callback returned null
    DoNotIndex,
    /// Foreign database constraint violated
    ForeignConflict,
    /// Key/data pair was deleted or never created
    KeyEmpty,
    /// Key/data pair already exists
    KeyExist,
    /// Locker killed to resolve a deadlock
    LockDeadlock,
    /// Lock not granted
    LockNotGranted,
    /// In-memory log buffer is full
    LogBufferFull,
    /// No message dispatch callback configured
    NoServer,
    /// No matching key/data pair found
    NotFound,
    /// Database requires a version upgrade
    OldVersion,
    /// Requested page not found
    PageNotFound,
    /// Fatal error, run recovery
    RunRecovery,
    /// Secondary index inconsistent with primary
    SecondaryBad,
    /// Verification failed
    VerifyBad,
    /// Environment version mismatch
    VersionMismatch,
    /// No such file or directory
    NoEntry,
    /// Cannot allocate memory
    NoMemory,
    /// Permission denied
    PermissionDenied,
    /// File exists
    Exists,
    /// Invalid argument
    Invalid,
    /// Unknown error code
    Other(Status),
}

impl From<Status> for ErrorKind {
    fn from(code: Status) -> ErrorKind {
        match code {
            DB_BUFFER_SMALL => ErrorKind::BufferSmall,
            DB_DONOTINDEX => ErrorKind::DoNotIndex,
            DB_FOREIGN_CONFLICT => ErrorKind::ForeignConflict,
            DB_KEYEMPTY => ErrorKind::KeyEmpty,
            DB_KEYEXIST => ErrorKind::KeyExist,
            DB_LOCK_DEADLOCK => ErrorKind::LockDeadlock,
            DB_LOCK_NOTGRANTED => ErrorKind::LockNotGranted,
            DB_LOG_BUFFER_FULL => ErrorKind::LogBufferFull,
            DB_NOSERVER => ErrorKind::NoServer,
            DB_NOTFOUND => ErrorKind::NotFound,
            DB_OLD_VERSION => ErrorKind::OldVersion,
            DB_PAGE_NOTFOUND => ErrorKind::PageNotFound,
            DB_RUNRECOVERY => ErrorKind::RunRecovery,
            DB_SECONDARY_BAD => ErrorKind::SecondaryBad,
            DB_VERIFY_BAD => ErrorKind::VerifyBad,
            DB_VERSION_MISMATCH => ErrorKind::VersionMismatch,
            ENOENT => ErrorKind::NoEntry,
            ENOMEM => ErrorKind::NoMemory,
            EACCES => ErrorKind::PermissionDenied,
            EEXIST => ErrorKind::Exists,
            EINVAL => ErrorKind::Invalid,
            code => ErrorKind::Other(code),
        }
    }
}

impl ErrorKind {
    pub fn code(self) -> Status {
        match self {
            ErrorKind::BufferSmall => DB_BUFFER_SMALL,
            ErrorKind::DoNotIndex => DB_DONOTINDEX,
            ErrorKind::ForeignConflict => DB_FOREIGN_CONFLICT,
            ErrorKind::KeyEmpty => DB_KEYEMPTY,
            ErrorKind::KeyExist => DB_KEYEXIST,
            ErrorKind::LockDeadlock => DB_LOCK_DEADLOCK,
            ErrorKind::LockNotGranted => DB_LOCK_NOTGRANTED,
            ErrorKind::LogBufferFull => DB_LOG_BUFFER_FULL,
            ErrorKind::NoServer => DB_NOSERVER,
            ErrorKind::NotFound => DB_NOTFOUND,
            ErrorKind::OldVersion => DB_OLD_VERSION,
            ErrorKind::PageNotFound => DB_PAGE_NOTFOUND,
            ErrorKind::RunRecovery => DB_RUNRECOVERY,
            ErrorKind::SecondaryBad => DB_SECONDARY_BAD,
            ErrorKind::VerifyBad => DB_VERIFY_BAD,
            ErrorKind::VersionMismatch => DB_VERSION_MISMATCH,
            ErrorKind::NoEntry => ENOENT,
            ErrorKind::NoMemory => ENOMEM,
            ErrorKind::PermissionDenied => EACCES,
            ErrorKind::Exists => EEXIST,
            ErrorKind::Invalid => EINVAL,
            ErrorKind::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::BufferSmall => write!(f, "DB_BUFFER_SMALL: User memory too small for return value"),
            ErrorKind::DoNotIndex => write!(f, "DB_DONOTINDEX: Secondary index callback returns null"),
            ErrorKind::ForeignConflict => write!(f, "DB_FOREIGN_CONFLICT: A foreign database constraint has been violated"),
            ErrorKind::KeyEmpty => write!(f, "DB_KEYEMPTY: Non-existent key/data pair"),
            ErrorKind::KeyExist => write!(f, "DB_KEYEXIST: Key/data pair already exists"),
            ErrorKind::LockDeadlock => write!(f, "DB_LOCK_DEADLOCK: Locker killed to resolve a deadlock"),
            ErrorKind::LockNotGranted => write!(f, "DB_LOCK_NOTGRANTED: Lock not granted"),
            ErrorKind::LogBufferFull => write!(f, "DB_LOG_BUFFER_FULL: In-memory log buffer is full"),
            ErrorKind::NoServer => write!(f, "DB_NOSERVER: No message dispatch call-back function has been configured"),
            ErrorKind::NotFound => write!(f, "DB_NOTFOUND: No matching key/data pair found"),
            ErrorKind::OldVersion => write!(f, "DB_OLDVERSION: Database requires a version upgrade"),
            ErrorKind::PageNotFound => write!(f, "DB_PAGE_NOTFOUND: Requested page not found"),
            ErrorKind::RunRecovery => write!(f, "DB_RUNRECOVERY: Fatal error, run database recovery"),
            ErrorKind::SecondaryBad => write!(f, "DB_SECONDARY_BAD: Secondary index inconsistent with primary"),
            ErrorKind::VerifyBad => write!(f, "DB_VERIFY_BAD: Database verification failed"),
            ErrorKind::VersionMismatch => write!(f, "DB_VERSION_MISMATCH: Database environment version mismatch"),
            ErrorKind::NoEntry => write!(f, "No such file or directory"),
            ErrorKind::NoMemory => write!(f, "Cannot allocate memory"),
            ErrorKind::PermissionDenied => write!(f, "Permission denied"),
            ErrorKind::Exists => write!(f, "File exists"),
            ErrorKind::Invalid => write!(f, "Invalid argument"),
            ErrorKind::Other(code) => write!(f, "Unknown error: {}", code),
        }
    }
}

/// A nonzero engine return code together with its message
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct Error {
    pub code: Status,
    pub message: String,
}

impl Error {
    pub fn from_code(code: Status) -> Error {
        Error::from(ErrorKind::from(code))
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self.code)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            code: kind.code(),
            message: kind.to_string(),
        }
    }
}

/// Converts engine status words into results
pub(crate) trait IntoResult {
    fn into_result(self) -> result::Result<(), Error>;
}

impl IntoResult for Status {
    fn into_result(self) -> result::Result<(), Error> {
        if self == 0 {
            Ok(())
        } else {
            Err(Error::from_code(self))
        }
    }
}

impl<T> IntoResult for EngineResult<T> {
    fn into_result(self) -> result::Result<(), Error> {
        self.map(drop).map_err(Error::from_code)
    }
}

/// Misuse of the facade, reported before any work is queued
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum UsageError {
    #[error("{kind} handle is stale: it was closed or terminated")]
    StaleHandle { kind: &'static str },
    #[error("an environment is already active in this store")]
    EnvironmentActive,
    #[error("{kind} handle belongs to a different store")]
    ForeignHandle { kind: &'static str },
}

/// Failure of a synchronous handle operation
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum HandleError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Engine(#[from] Error),
}

impl HandleError {
    /// Engine return code, if the engine reported the failure
    pub fn code(&self) -> Option<Status> {
        match self {
            HandleError::Engine(e) => Some(e.code),
            HandleError::Usage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert_eq!(0i32.into_result(), Ok(()));
    }

    #[test]
    fn nonzero_code_keeps_code_and_message() {
        let err = DB_NOTFOUND.into_result().unwrap_err();
        assert_eq!(err.code, -30988);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message, "DB_NOTFOUND: No matching key/data pair found");
    }

    #[test]
    fn unknown_codes_round_trip() {
        let err = Error::from_code(-12345);
        assert_eq!(err.kind(), ErrorKind::Other(-12345));
        assert_eq!(err.code, -12345);
        assert_eq!(err.to_string(), "Unknown error: -12345");
    }

    #[test]
    fn every_named_kind_maps_back_to_itself() {
        let kinds = [
            ErrorKind::BufferSmall,
            ErrorKind::KeyEmpty,
            ErrorKind::KeyExist,
            ErrorKind::LockDeadlock,
            ErrorKind::NotFound,
            ErrorKind::RunRecovery,
            ErrorKind::NoEntry,
            ErrorKind::Exists,
            ErrorKind::Invalid,
        ];
        for kind in kinds {
            assert_eq!(ErrorKind::from(kind.code()), kind);
        }
    }

    #[test]
    fn handle_error_exposes_engine_code() {
        let err: HandleError = Error::from(ErrorKind::Exists).into();
        assert_eq!(err.code(), Some(EEXIST));
        let err: HandleError = UsageError::EnvironmentActive.into();
        assert_eq!(err.code(), None);
    }
}
