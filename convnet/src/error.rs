use std::{error::Error, fmt, io, path::PathBuf};

use rand_distr::{NormalError, uniform::Error as UniformError};

/// Errors produced while building or feeding the network.
#[derive(Debug)]
pub enum MlErr {
    /// Underlying I/O failure while reading a dataset file.
    Io(io::Error),
    /// An IDX file did not look like the MNIST format.
    Idx { what: &'static str, path: PathBuf },
    /// A buffer had the wrong number of elements for its role.
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The parameter layout is internally inconsistent.
    Layout(&'static str),
    /// A random distribution could not be constructed.
    Rand(String),
}

impl fmt::Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::Io(e) => write!(f, "i/o error: {e}"),
            MlErr::Idx { what, path } => {
                write!(f, "invalid idx file {}: bad {what}", path.display())
            }
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "size mismatch for {what}: got {got}, expected {expected}")
            }
            MlErr::Layout(what) => write!(f, "invalid parameter layout: {what}"),
            MlErr::Rand(e) => write!(f, "random distribution error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(e: io::Error) -> Self {
        MlErr::Io(e)
    }
}

impl From<NormalError> for MlErr {
    fn from(e: NormalError) -> Self {
        MlErr::Rand(e.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(e: UniformError) -> Self {
        MlErr::Rand(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MlErr>;
