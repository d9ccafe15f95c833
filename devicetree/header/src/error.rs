// Licensed under the Apache-2.0 license

use thiserror::Error;

/// Errors raised while reading a SoC header.
///
/// Only values that the rest of the pipeline cannot do without are errors.
/// Anything else that is absent is reported as `None` or a placeholder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// A required address or size macro is absent.
    #[error("{what} is missing. Expecting {expected}")]
    MissingMandatoryValue { what: String, expected: String },

    /// A macro that must hold an integer holds something else.
    #[error("value '{value}' of {symbol} is not a number")]
    InvalidNumber { symbol: String, value: String },

    /// The boot image would be loaded past the end of external memory.
    #[error("boot image load address {load:#x} is beyond the external memory size {size:#x}")]
    LoadAddressOutOfRange { load: u64, size: u64 },
}

impl HeaderError {
    pub(crate) fn missing(what: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MissingMandatoryValue {
            what: what.into(),
            expected: expected.into(),
        }
    }
}

/// Result type for header operations.
pub type Result<T> = std::result::Result<T, HeaderError>;
