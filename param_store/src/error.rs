use std::{error::Error, fmt, io};

/// Errors produced while creating or mapping a shared parameter region.
#[derive(Debug)]
pub enum StoreErr {
    /// Creating, sizing or mapping the backing file failed.
    Io(io::Error),
    /// The backing file does not hold the expected number of parameters.
    SizeMismatch { got: usize, expected: usize },
}

impl fmt::Display for StoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErr::Io(e) => write!(f, "shared region i/o error: {e}"),
            StoreErr::SizeMismatch { got, expected } => write!(
                f,
                "shared region holds {got} parameters, expected {expected}"
            ),
        }
    }
}

impl Error for StoreErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreErr::Io(e) => Some(e),
            StoreErr::SizeMismatch { .. } => None,
        }
    }
}

impl From<io::Error> for StoreErr {
    fn from(e: io::Error) -> Self {
        StoreErr::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, StoreErr>;
