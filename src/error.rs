use thiserror::Error;

/// Errors raised for caller-contract violations.
///
/// Untrusted metadata never produces one of these: parsing degrades to an
/// empty record and auditing fails open. Only programming mistakes (asking for
/// an encoder that does not exist) and broken configuration (an unusable
/// wordlist) are reported.
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Unknown encoder target: {0}")]
    UnknownEncoderTarget(String),
    #[error("Invalid wordlist entry at index {index}: {reason}")]
    InvalidWordlist { index: usize, reason: String },
    #[error("Wordlist is not a JSON array of strings: {0}")]
    WordlistFormat(#[from] serde_json::Error),
    #[error("Failed to compile audit pattern: {0}")]
    Pattern(#[from] regex::Error),
}
