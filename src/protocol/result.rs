//! Operation results
//!
//! Expected failures (node down, key missing, CAS mismatch) are values, not
//! errors: every operation ends in an [`OperationResult`].

use std::fmt;

/// Status codes of the binary protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseStatus {
    NoError = 0x0000,
    KeyNotFound = 0x0001,
    KeyExists = 0x0002,
    ValueTooLarge = 0x0003,
    InvalidArguments = 0x0004,
    ItemNotStored = 0x0005,
    NonNumericValue = 0x0006,
    WrongVbucket = 0x0007,
    AuthenticationError = 0x0020,
    AuthenticationContinue = 0x0021,
    UnknownCommand = 0x0081,
    OutOfMemory = 0x0082,
    NotSupported = 0x0083,
    InternalError = 0x0084,
    Busy = 0x0085,
    TemporaryFailure = 0x0086,
}

impl ResponseStatus {
    pub fn from_code(code: u16) -> Option<Self> {
        let status = match code {
            0x0000 => ResponseStatus::NoError,
            0x0001 => ResponseStatus::KeyNotFound,
            0x0002 => ResponseStatus::KeyExists,
            0x0003 => ResponseStatus::ValueTooLarge,
            0x0004 => ResponseStatus::InvalidArguments,
            0x0005 => ResponseStatus::ItemNotStored,
            0x0006 => ResponseStatus::NonNumericValue,
            0x0007 => ResponseStatus::WrongVbucket,
            0x0020 => ResponseStatus::AuthenticationError,
            0x0021 => ResponseStatus::AuthenticationContinue,
            0x0081 => ResponseStatus::UnknownCommand,
            0x0082 => ResponseStatus::OutOfMemory,
            0x0083 => ResponseStatus::NotSupported,
            0x0084 => ResponseStatus::InternalError,
            0x0085 => ResponseStatus::Busy,
            0x0086 => ResponseStatus::TemporaryFailure,
            _ => return None,
        };
        Some(status)
    }
}

/// Outcome of one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,

    /// Failure reason (server message or client-side description)
    pub message: Option<String>,

    /// Binary status code, when a server answered
    pub status_code: Option<u16>,

    /// CAS value returned by the server
    pub cas: u64,

    /// The lower-level result this one was derived from
    pub inner: Option<Box<OperationResult>>,
}

impl OperationResult {
    pub fn pass() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Result from a server status; zero passes, anything else fails with `message`
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == ResponseStatus::NoError as u16 {
            Self {
                success: true,
                status_code: Some(status),
                ..Self::default()
            }
        } else {
            Self {
                success: false,
                message: Some(message.into()),
                status_code: Some(status),
                ..Self::default()
            }
        }
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    pub fn with_inner(mut self, inner: OperationResult) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    pub fn status(&self) -> Option<ResponseStatus> {
        self.status_code.and_then(ResponseStatus::from_code)
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "success")?;
        } else {
            write!(f, "failed")?;
        }
        if let Some(status) = self.status_code {
            write!(f, " (status 0x{:04x})", status)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Result of an operation that produces a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueResult<T> {
    pub result: OperationResult,
    pub value: Option<T>,
}

impl<T> ValueResult<T> {
    pub fn new(result: OperationResult, value: Option<T>) -> Self {
        Self { result, value }
    }

    pub fn failed(result: OperationResult) -> Self {
        Self {
            result,
            value: None,
        }
    }

    pub fn success(&self) -> bool {
        self.result.success
    }

    pub fn cas(&self) -> u64 {
        self.result.cas
    }
}
