use std::error::Error;
use std::io::{self, ErrorKind};

use http::StatusCode;

use crate::ls::LockError;

pub(crate) type DavResult<T> = Result<T, DavError>;

/// Error of a request. Every variant maps to one HTTP status code.
#[derive(Debug)]
pub enum DavError {
    InvalidPath,
    ForbiddenPath,
    UnknownDavMethod,
    AlreadyLocked,
    NotLocked,
    InvalidLockToken,
    LockFailed,
    Status(StatusCode),
    StatusClose(StatusCode),
    IoError(io::Error),
    XmlWriterError(xml::writer::Error),
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::IoError(e) => Some(e),
            DavError::XmlWriterError(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for DavError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DavError::IoError(_) => write!(f, "I/O error"),
            DavError::XmlWriterError(_) => write!(f, "XML write error"),
            DavError::Status(s) | DavError::StatusClose(s) => write!(f, "{s}"),
            DavError::AlreadyLocked => write!(f, "ALREADY_LOCKED"),
            DavError::NotLocked => write!(f, "NOT_LOCKED"),
            DavError::InvalidLockToken => write!(f, "INVALID_LOCK_TOKEN"),
            DavError::LockFailed => write!(f, "LOCK_FAILED"),
            _ => write!(f, "{self:?}"),
        }
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        DavError::IoError(e)
    }
}

impl From<StatusCode> for DavError {
    fn from(e: StatusCode) -> Self {
        DavError::Status(e)
    }
}

impl From<xml::writer::Error> for DavError {
    fn from(e: xml::writer::Error) -> Self {
        DavError::XmlWriterError(e)
    }
}

impl From<LockError> for DavError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::AlreadyLocked => DavError::AlreadyLocked,
            LockError::NotLocked => DavError::NotLocked,
            LockError::InvalidLockToken => DavError::InvalidLockToken,
        }
    }
}

fn ioerror_to_status(ioerror: &io::Error) -> StatusCode {
    match ioerror.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl DavError {
    pub(crate) fn statuscode(&self) -> StatusCode {
        match self {
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::ForbiddenPath => StatusCode::BAD_REQUEST,
            DavError::UnknownDavMethod => StatusCode::BAD_REQUEST,
            // an acquisition that yields no token means somebody else
            // holds the lock.
            DavError::LockFailed => StatusCode::LOCKED,
            DavError::AlreadyLocked
            | DavError::NotLocked
            | DavError::InvalidLockToken
            | DavError::XmlWriterError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::Status(e) => *e,
            DavError::StatusClose(e) => *e,
            DavError::IoError(e) => ioerror_to_status(e),
        }
    }

    pub(crate) fn must_close(&self) -> bool {
        !matches!(
            self,
            &DavError::Status(_)
                | &DavError::AlreadyLocked
                | &DavError::NotLocked
                | &DavError::InvalidLockToken
                | &DavError::LockFailed
        )
    }
}
