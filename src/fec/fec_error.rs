use std::fmt;

/// Error kinds the FEC path can surface. `NeedMore` is not a failure: it is
/// the expected result while a block is still underdetermined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FecError {
    DecodeFailed,
    NeedMore { have: u16, need: u16 },
}

impl fmt::Display for FecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FecError::DecodeFailed => write!(f, "FEC decode failed: block unrecoverable"),
            FecError::NeedMore { have, need } => {
                write!(f, "FEC decode needs more symbols: have {have}, need {need}")
            }
        }
    }
}

impl std::error::Error for FecError {}
