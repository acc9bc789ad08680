//! # Errors
//!
//! This module defines the error taxonomy for the consent and presentation
//! flows. Prompt and authentication errors propagate to the presentation
//! caller unmodified; storage corruption is absorbed at store-load time and
//! never surfaces here.

use thiserror::Error;

/// Result type for all public flow and store operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the consent, pre-consent and presentation flows.
#[derive(Error, Debug)]
pub enum Error {
    /// The user declined a prompt (consent, passphrase, etc.). Always
    /// recoverable: the flow aborts cleanly with no state committed.
    #[error("user cancelled the prompt")]
    UserCancelled,

    /// Biometric or remote authentication failed. Recoverable by retrying
    /// the presentation if attempts remain.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The bounded passphrase retry count was exceeded. Fatal to this flow.
    #[error("maximum number of passphrase attempts reached")]
    AttemptsExhausted,

    /// A precondition was violated: an untrusted relying party in a
    /// pre-consent operation, a duplicate record id, etc. Always a caller
    /// or logic bug, never retried.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The credential is bound to a secure area the flow has no unlock
    /// handling for. Fatal, surfaced as-is with no silent fallback.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Filtering a selectively-disclosable credential down to the consented
    /// claims left no disclosures. The submission cannot be fulfilled and is
    /// cancelled before any bytes are produced.
    #[error("no disclosures remain for the requested claims")]
    DeficientSubmission,

    /// A wrapped encoding, storage or provider failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
