// vim: tw=80
//! Errors raised while executing or configuring a mock.

use std::error::Error as StdError;

use thiserror::Error;

/// An error configured with [`SetupBuilder::throws`](crate::SetupBuilder::throws)
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Everything that can go wrong inside the engine.
///
/// Verification failures are not represented here; they are reported through
/// [`VerificationFailure`](crate::VerificationFailure).
#[derive(Debug, Error)]
pub enum MockError {
    /// A member was invoked without a matching setup, and the mock was
    /// configured with
    /// [`with_throw_when_not_setup`](crate::MockBehavior::with_throw_when_not_setup).
    #[error("{signature} was invoked, but no setup matches it")]
    NotConfigured { signature: String },

    /// A value was requested as a different type than the one it holds.
    #[error("type mismatch in {context}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A setup was configured in a way that can never be honored.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The error produced by a `throws` behavior.
    #[error("{source}")]
    Thrown {
        #[source]
        source: BoxError,
    },
}

impl MockError {
    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        MockError::TypeMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MockError::InvalidConfiguration(msg.into())
    }

    /// Wrap an arbitrary error as if a `throws` behavior had produced it.
    pub fn thrown<E: Into<BoxError>>(e: E) -> Self {
        MockError::Thrown { source: e.into() }
    }

    /// Was this error raised by a strict mock that had no matching setup?
    pub fn is_not_configured(&self) -> bool {
        matches!(self, MockError::NotConfigured { .. })
    }

    /// If this error came from a `throws` behavior, return the original error
    /// as a concrete type.
    pub fn thrown_as<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            MockError::Thrown { source } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<downcast::TypeMismatch> for MockError {
    fn from(m: downcast::TypeMismatch) -> Self {
        MockError::type_mismatch("value", m.expected, m.found)
    }
}

/// Result type used throughout `imposter`
pub type Result<T> = std::result::Result<T, MockError>;
