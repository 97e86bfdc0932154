#![allow(unreachable_pub)]

mod basic_auth;
mod command;
mod error;

pub use basic_auth::{BasicAuthCredentials, BasicAuthCredentialsParseError};
pub use command::Command;
pub use error::ErrorKind;

/// The pacer `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
