// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Error types for ASDM table handling.

Errors raised while decoding a single row (malformed values, truncated
streams) do not know which table they belong to. The table layer wraps them
into `AsdmError::Conversion` values that name the table, using
`AsdmError::in_table`.

*/

use thiserror::Error;

/// An error arising while building, reading, or writing an ASDM table.
#[derive(Error, Debug)]
pub enum AsdmError {
    /// A row was inserted whose key equals that of a row already present.
    #[error("duplicate key in table {table}")]
    DuplicateKey { table: String },

    /// A structural problem with a persisted table, or a wrapped lower-level
    /// error with the name of the table added.
    #[error("error converting table {table}: {message}")]
    Conversion { table: String, message: String },

    /// Malformed field data: bad lengths, shapes, names, or numbers.
    #[error("malformed value: {0}")]
    TagFormat(String),

    /// A uniqueness rule of the container, other than key uniqueness, was
    /// broken during a bulk load. No table in this crate defines such a rule
    /// yet; the variant is reserved for tables that do, and bulk loads treat
    /// it like `DuplicateKey`.
    #[error("uniqueness violation in table {table}: {message}")]
    UniquenessViolation { table: String, message: String },

    /// A row could not be emitted because one of its attributes has no
    /// usable value.
    #[error("row of table {table} has no usable value for attribute \"{attribute}\"")]
    IncompleteRow { table: String, attribute: String },

    /// The XML parser failed.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    /// A low-level error from the binary stream layer.
    #[error(transparent)]
    Core(#[from] rubbl_core::Error),

    /// An I/O-related error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Non-UTF-8 data where text was expected.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

/// A `Result` whose error type is `AsdmError`.
pub type Result<T> = std::result::Result<T, AsdmError>;

impl AsdmError {
    /// Attach a table name to an error that lacks one.
    ///
    /// Errors that already name a table are returned unchanged; everything
    /// else becomes a `Conversion` error for *table*.
    pub fn in_table(self, table: &str) -> AsdmError {
        match self {
            e @ AsdmError::DuplicateKey { .. }
            | e @ AsdmError::Conversion { .. }
            | e @ AsdmError::UniquenessViolation { .. }
            | e @ AsdmError::IncompleteRow { .. } => e,
            other => AsdmError::Conversion {
                table: table.to_owned(),
                message: other.to_string(),
            },
        }
    }

    /// Turn any error into a `Conversion` error for *table*.
    ///
    /// Bulk loads report duplicate keys and uniqueness violations this way.
    pub fn into_conversion(self, table: &str) -> AsdmError {
        match self {
            e @ AsdmError::Conversion { .. } => e,
            other => AsdmError::Conversion {
                table: table.to_owned(),
                message: other.to_string(),
            },
        }
    }
}

/// Format a conversion error naming a table.
///
/// Expands into an `Err(AsdmError::Conversion { .. })` value:
///
/// ```rust,ignore
/// return conversion_err!(self.name(), "no <Entity> element in \"{}\"", path);
/// ```
#[macro_export]
macro_rules! conversion_err {
    ($table:expr, $( $fmt_args:expr ),*) => {
        Err($crate::errors::AsdmError::Conversion {
            table: ($table).to_string(),
            message: format!($( $fmt_args ),*),
        })
    }
}

/// Format a malformed-value error.
#[macro_export]
macro_rules! tagfmt_err {
    ($( $fmt_args:expr ),*) => {
        Err($crate::errors::AsdmError::TagFormat(format!($( $fmt_args ),*)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_table_wraps_only_anonymous_errors() {
        let e = AsdmError::TagFormat("bad".to_owned()).in_table("CalAtmosphere");
        match e {
            AsdmError::Conversion { table, message } => {
                assert_eq!(table, "CalAtmosphere");
                assert!(message.contains("bad"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let e = AsdmError::DuplicateKey {
            table: "X".to_owned(),
        }
        .in_table("CalAtmosphere");
        assert!(matches!(e, AsdmError::DuplicateKey { table } if table == "X"));
    }

    #[test]
    fn uniqueness_violations_keep_their_table() {
        let e = || AsdmError::UniquenessViolation {
            table: "CalAtmosphere".to_owned(),
            message: "two rows share a value".to_owned(),
        };

        assert!(matches!(
            e().in_table("Other"),
            AsdmError::UniquenessViolation { table, .. } if table == "CalAtmosphere"
        ));

        match e().into_conversion("CalAtmosphere") {
            AsdmError::Conversion { table, message } => {
                assert_eq!(table, "CalAtmosphere");
                assert!(message.contains("two rows share a value"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn conversion_macro_names_table() {
        fn fails() -> Result<()> {
            conversion_err!("CalAtmosphere", "missing {}", "Entity")
        }

        let msg = fails().unwrap_err().to_string();
        assert_eq!(msg, "error converting table CalAtmosphere: missing Entity");
    }
}
