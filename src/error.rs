/// Errors produced by the protocol codec and the command builder.
///
/// Decode failures (`InvalidLength`, `InvalidFunction`) originate from
/// unsolicited device traffic and are only ever logged; encode failures
/// (`InvalidShape`, `Unsupported`) are surfaced to the command caller.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The response buffer does not have the profile's fixed length.
    #[error("invalid frame length {got}, expected {expected}")]
    InvalidLength { expected: usize, got: usize },

    /// The function-code byte does not match the profile.
    #[error("invalid function code {got:#04x}, expected {expected:#04x}")]
    InvalidFunction { expected: u8, got: u8 },

    /// The coil array does not have the profile's coil count.
    #[error("invalid coil count {got}, expected {expected}")]
    InvalidShape { expected: usize, got: usize },

    /// No canned frame and no generic encoding applies to the coil pattern.
    #[error("unsupported coil combination")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;
