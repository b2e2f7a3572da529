#![forbid(unsafe_code)]

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Everything that can stop a verification call short of a solver verdict.
///
/// Timeouts are not errors: they surface as [`crate::Outcome::Timeout`].
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyError {
    /// A caller-supplied value failed its precondition. Raised before any solver interaction.
    #[error("invalid parameter `{name}`: {message}")]
    #[diagnostic(code(tally::invalid_parameter))]
    InvalidParameter { name: String, message: String },

    /// The encoding itself is malformed (undeclared variable, sort or bit-width mismatch).
    #[error("encoding error: {message}")]
    #[diagnostic(
        code(tally::encoding),
        help("this is a defect in the property encoding, not a property violation")
    )]
    Encoding { message: String },

    /// The solving engine could not be initialised.
    #[error("solver backend `{backend}` unavailable: {message}")]
    #[diagnostic(
        code(tally::backend_unavailable),
        help("rebuild with `--features tally-verify/z3` and make sure libz3 is installed")
    )]
    BackendUnavailable { backend: String, message: String },

    /// The engine failed while solving or returned something unusable.
    #[error("solver backend `{backend}` failed: {message}")]
    #[diagnostic(code(tally::backend))]
    Backend { backend: String, message: String },
}

impl VerifyError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        VerifyError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        VerifyError::Encoding {
            message: message.into(),
        }
    }
}
