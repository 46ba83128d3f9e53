// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Internal status/error types.
//!
//! `SchedError` signals that the scheduler itself cannot proceed: malformed
//! input, a missing required argument, a corrupt file. It is never used to
//! report that a job is over a limit; that outcome is a
//! [`SchdError`](crate::sched_error::SchdError) value.

use std::fmt;

/// Status codes for internal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum StatusCode {
    OK = 0,
    Invalid = 1,
    InvalidArgument = 2,
    IOError = 3,
    NotFound = 4,
    AlreadyExists = 5,
    CorruptFile = 6,
    Internal = 7,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OK => "OK",
            Self::Invalid => "Invalid",
            Self::InvalidArgument => "InvalidArgument",
            Self::IOError => "IOError",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::CorruptFile => "CorruptFile",
            Self::Internal => "Internal",
        }
    }

    /// Parse a status code from its string name.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(Self::OK),
            "Invalid" => Some(Self::Invalid),
            "InvalidArgument" => Some(Self::InvalidArgument),
            "IOError" => Some(Self::IOError),
            "NotFound" => Some(Self::NotFound),
            "AlreadyExists" => Some(Self::AlreadyExists),
            "CorruptFile" => Some(Self::CorruptFile),
            "Internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The internal error type of the scheduler core.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SchedError {
    pub code: StatusCode,
    pub message: String,
}

impl SchedError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::Invalid, msg)
    }
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, msg)
    }
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::IOError, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, msg)
    }
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, msg)
    }
    pub fn corrupt_file(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CorruptFile, msg)
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, msg)
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.code == StatusCode::InvalidArgument
    }
    pub fn is_not_found(&self) -> bool {
        self.code == StatusCode::NotFound
    }
    pub fn is_internal(&self) -> bool {
        self.code == StatusCode::Internal
    }
    pub fn is_corrupt_file(&self) -> bool {
        self.code == StatusCode::CorruptFile
    }
}

impl From<std::io::Error> for SchedError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

/// Convenience type alias: `Result<T, SchedError>`.
pub type SchedResult<T> = Result<T, SchedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_roundtrip() {
        let code = StatusCode::CorruptFile;
        assert_eq!(code.as_str(), "CorruptFile");
        assert_eq!(StatusCode::from_str_name("CorruptFile"), Some(code));
        assert_eq!(StatusCode::from_str_name("nope"), None);
    }

    #[test]
    fn test_sched_error_display() {
        let err = SchedError::internal("no counters for queue workq");
        assert_eq!(err.to_string(), "Internal: no counters for queue workq");
        assert!(err.is_internal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SchedError = io.into();
        assert_eq!(err.code, StatusCode::IOError);
    }
}
