use thiserror::Error;

/// Errors surfaced by the authentication core. Every derivation step
/// propagates its error unwrapped; authentication is all-or-nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A cryptographic primitive failed (DES key setup, RC4 init). Fatal for
    /// the session.
    #[error("crypto primitive failure: {0}")]
    CryptoFailure(&'static str),

    /// Neither the NT nor the LM challenge response matched the expected
    /// value. The session must not be used for signing afterwards.
    #[error("could not authenticate")]
    AuthenticationFailed,

    /// A parsed input message is missing required fields or carries a
    /// payload the core cannot decode.
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    /// The requested operation is not implemented in this core.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(&'static str),

    /// An operation was attempted outside the session's linear
    /// `New -> Challenge -> Authenticated` lifecycle.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
