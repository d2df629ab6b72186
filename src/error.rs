use thiserror::Error;

/// Errors produced while hashing a value.
///
/// A call either yields a complete digest or one of these; there are no
/// partial results and nothing here is worth retrying with the same input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HashError {
    /// The input has no defined canonical form.
    #[error("unsupported value: {0}")]
    UnsupportedValue(#[from] UnsupportedValue),

    /// The serializer could not produce a byte sequence.
    #[error("encoding failure: {0}")]
    Encoding(String),

    /// The digest provider is missing or reported an error.
    #[error("hash provider unavailable: {0}")]
    HashProviderUnavailable(String),
}

impl HashError {
    /// True when the failure is caused by the input rather than the
    /// environment.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedValue(_))
    }
}

/// The reason a value was rejected before hashing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnsupportedValue {
    /// NaN or an infinity.
    #[error("non-finite number {0} has no canonical representation")]
    NonFiniteNumber(f64),

    /// Nesting exceeded the configured ceiling, usually a reference cycle.
    #[error("nesting depth exceeds limit {limit} (cyclic or runaway structure?)")]
    DepthExceeded { limit: usize },

    /// A map key that does not serialize to a string.
    #[error("map key must be a string, got {0}")]
    NonStringKey(String),

    /// JSON text that could not be parsed.
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// Any other rejection raised while capturing a `Serialize` value.
    #[error("{0}")]
    Custom(String),
}

/// Errors from parsing a hex digest string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DigestParseError {
    #[error("invalid hex digest: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("digest must be {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}
