use thiserror::Error;

/// Failures raised by the runtime foundation itself.
///
/// Domain crates carry their own error enums; this one only covers the
/// concerns hosted here, so callers can match on the source of a fault
/// without pulling in every downstream crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The tracing pipeline could not be assembled or installed.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// An invariant inside the runtime was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
