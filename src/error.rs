//! Fatal error taxonomy. Recoverable and inconclusive conditions are
//! logged in place and folded into their operation's return value
//! instead (see `EndianVerdict::tied`, `refine::RefineResult`); only
//! conditions that leave `Analysis::run` with nothing to report reach
//! here.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum BinbloomError {
    /// The firmware or symbols file could not be opened, mapped or
    /// read.
    Io(io::Error),
    /// The firmware image is smaller than one pointer for the chosen
    /// architecture.
    FileTooSmall { needed: usize, found: usize },
    /// `rayon`'s global thread pool could not be installed and no
    /// sequential fallback was possible.
    ThreadPoolUnavailable,
}

impl std::error::Error for BinbloomError {}

impl fmt::Display for BinbloomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinbloomError::Io(err) => write!(f, "Error: I/O failure: {err}"),
            BinbloomError::FileTooSmall { needed, found } => write!(
                f,
                "Error: firmware image too small (need at least {needed} bytes, found {found})."
            ),
            BinbloomError::ThreadPoolUnavailable => {
                write!(f, "Error: could not start the worker thread pool.")
            }
        }
    }
}

impl From<io::Error> for BinbloomError {
    fn from(err: io::Error) -> Self {
        BinbloomError::Io(err)
    }
}
