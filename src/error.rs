use std::net::AddrParseError;

use thiserror::Error;
use tonic::{Code, Status};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A peer could not be reached or the transport failed mid-call.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A required request field is missing or malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("finger index {index} outside [1, {bits}]")]
    OutOfRange { index: usize, bits: usize },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Error::Connectivity(err.to_string())
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::InvalidArgument => Error::Validation(status.message().to_owned()),
            Code::NotFound => Error::NotFound(status.message().to_owned()),
            code => Error::Connectivity(format!("{}: {}", code, status.message())),
        }
    }
}

impl From<AddrParseError> for Error {
    fn from(err: AddrParseError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<std::array::TryFromSliceError> for Error {
    fn from(err: std::array::TryFromSliceError) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Validation(_) | Error::Parse(_) => Status::invalid_argument(message),
            Error::NotFound(_) => Status::not_found(message),
            Error::OutOfRange { .. } => Status::out_of_range(message),
            Error::Connectivity(_) => Status::unavailable(message),
            Error::Internal(_) => Status::internal(message),
        }
    }
}
