// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
This module implements the core error type used by Rubbl crates.

Format crates define their own error types and link to this one through a
`#[from]` variant, so that low-level problems found while decoding streams
propagate with `?`.

*/

use std::{io, string};
use thiserror::Error;

/// The core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A free-form error message.
    #[error("{0}")]
    Msg(String),

    /// An array did not have the expected dimensionality.
    #[error("expected {0}-dimensional array but found one that was {1}-dimensional")]
    DimensionMismatch(usize, usize),

    /// A length or array dimension read from a binary stream was negative.
    #[error("illegal negative length {0} in binary stream at byte offset {1}")]
    NegativeLength(i64, u64),

    /// An I/O-related error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// An error related to UTF-8 conversion.
    #[error(transparent)]
    Utf8(#[from] string::FromUtf8Error),
}

/// A `Result` whose error type is the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Format an error message.
///
/// This convenience macro expands into an `Err(Error::Msg(...))` value with a
/// message formatted using the standard `format!` machinery.
#[macro_export]
macro_rules! err_msg {
    ($( $fmt_args:expr ),*) => {
        Err($crate::errors::Error::Msg(format!($( $fmt_args ),*)))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, format!("{}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(what: &str) -> Result<()> {
        err_msg!("could not handle {}", what)
    }

    #[test]
    fn err_msg_formats() {
        let e = failing("widgets").unwrap_err();
        assert_eq!(format!("{}", e), "could not handle widgets");
    }

    #[test]
    fn io_conversion_preserves_kind() {
        let inner = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let e: io::Error = Error::from(inner).into();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);

        let e: io::Error = Error::DimensionMismatch(2, 3).into();
        assert_eq!(e.kind(), io::ErrorKind::Other);
    }
}
